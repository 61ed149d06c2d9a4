//! Typed construction surface (§12). Configuration is code-level only: the
//! command-line surface and any file-based config loader are out of scope
//! (§1), so a `SingleIssuerConfig`/`AlbConfig` struct literal (or its
//! builder setters) is the entire public construction API.

use std::sync::Arc;

use crate::claims::CustomCheck;

/// Mirrors the shape of a token's own `aud` claim (§3): either a single
/// string or an ordered list. Kept as one type so construction and claim
/// assertion share a representation instead of normalizing back and forth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Audience::One(s) => vec![s.clone()],
            Audience::Many(list) => list.clone(),
        }
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Audience::One(value.to_string())
    }
}

impl From<String> for Audience {
    fn from(value: String) -> Self {
        Audience::One(value)
    }
}

impl From<Vec<String>> for Audience {
    fn from(value: Vec<String>) -> Self {
        Audience::Many(value)
    }
}

/// Configuration for a single identity provider (§6's "Configuration
/// fields"). `jwks_uri` defaults to `{issuer}/.well-known/jwks.json` when
/// absent, per §4.10.
#[derive(Clone)]
pub struct SingleIssuerConfig {
    pub issuer: String,
    pub jwks_uri: Option<String>,
    pub audience: Option<Audience>,
    pub scope: Option<String>,
    pub grace_seconds: u64,
    pub custom_check: Option<Arc<dyn CustomCheck>>,
}

impl SingleIssuerConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        SingleIssuerConfig {
            issuer: issuer.into(),
            jwks_uri: None,
            audience: None,
            scope: None,
            grace_seconds: 0,
            custom_check: None,
        }
    }

    #[must_use]
    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(jwks_uri.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn with_grace_seconds(mut self, grace_seconds: u64) -> Self {
        self.grace_seconds = grace_seconds;
        self
    }

    #[must_use]
    pub fn with_custom_check(mut self, check: Arc<dyn CustomCheck>) -> Self {
        self.custom_check = Some(check);
        self
    }

    /// Resolve the effective jwksUri per §6.
    pub fn resolved_jwks_uri(&self) -> String {
        self.jwks_uri
            .clone()
            .unwrap_or_else(|| format!("{}/.well-known/jwks.json", self.issuer.trim_end_matches('/')))
    }
}

/// Per-call overrides for [`crate::verifier::single::SingleIssuerVerifier::verify`]
/// (§4.10): unset fields fall back to what was fixed at construction.
#[derive(Clone, Default)]
pub struct VerifyProps {
    pub audience: Option<Audience>,
    pub scope: Option<String>,
    pub grace_seconds: Option<u64>,
}

/// Configuration for an AWS ALB-composed verifier (§4.12). `region` drives
/// the derived `jwksUri`: `https://public-keys.auth.elb.{region}.amazonaws.com`.
#[derive(Clone)]
pub struct AlbConfig {
    pub load_balancer_arn: String,
    pub region: String,
}

impl AlbConfig {
    /// Parse an ALB ARN of the form
    /// `arn:aws:elasticloadbalancing:{region}:{account}:loadbalancer/...`
    /// and derive the region from it (§4.12/§6).
    pub fn from_arn(arn: impl Into<String>) -> crate::error::VerifierResult<Self> {
        let arn = arn.into();
        let region = region_from_arn(&arn)?;
        Ok(AlbConfig {
            load_balancer_arn: arn,
            region,
        })
    }

    pub fn jwks_uri(&self) -> String {
        format!("https://public-keys.auth.elb.{}.amazonaws.com", self.region)
    }
}

fn region_from_arn(arn: &str) -> crate::error::VerifierResult<String> {
    // arn:partition:service:region:account-id:resource
    let fields: Vec<&str> = arn.split(':').collect();
    if fields.len() < 4 || fields[0] != "arn" || fields[2] != "elasticloadbalancing" {
        return Err(crate::error::VerifierError::AlbUriError(
            arn.to_string(),
            "not a well-formed elasticloadbalancing ARN".into(),
        ));
    }
    let region = fields[3];
    if region.is_empty() {
        return Err(crate::error::VerifierError::AlbUriError(
            arn.to_string(),
            "ARN has no region component".into(),
        ));
    }
    Ok(region.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_jwks_uri_from_issuer() {
        let config = SingleIssuerConfig::new("https://example.com");
        assert_eq!(
            config.resolved_jwks_uri(),
            "https://example.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn explicit_jwks_uri_wins() {
        let config = SingleIssuerConfig::new("https://example.com")
            .with_jwks_uri("https://example.com/custom-jwks.json");
        assert_eq!(config.resolved_jwks_uri(), "https://example.com/custom-jwks.json");
    }

    #[test]
    fn parses_region_from_alb_arn() {
        let config = AlbConfig::from_arn(
            "arn:aws:elasticloadbalancing:eu-west-1:123456789012:loadbalancer/app/my-lb/50dc6c495c0c9188",
        )
        .unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(
            config.jwks_uri(),
            "https://public-keys.auth.elb.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn rejects_malformed_arn() {
        assert!(AlbConfig::from_arn("not-an-arn").is_err());
    }
}
