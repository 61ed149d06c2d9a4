//! A verifier composed over AWS Application Load Balancer's OIDC headers
//! (§4.12): ALB signs its own token and identifies the signing key by a
//! UUID `kid` under a per-load-balancer PEM endpoint, not a JWKS document.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::AlbJwksCache;
use crate::claims::ClaimPolicy;
use crate::config::{AlbConfig, VerifyProps};
use crate::error::{VerifierError, VerifierResult};
use crate::fetch::{ByteFetcher, HttpFetcher};
use crate::jwt;
use crate::key_object_cache::KeyObjectCache;
use crate::verify;

use super::single::VerifiedClaims;

/// Verifies ALB-signed JWTs, trusting only the load balancer ARN(s) it was
/// configured with. A token's own `signer` claim is never used to pick a
/// fetch target until it has been matched against that configured set
/// (§4.12: an attacker-controlled `signer` must never drive an outbound
/// fetch to an arbitrary host).
pub struct AlbVerifier {
    known: HashMap<String, AlbConfig>,
    cache: AlbJwksCache,
    key_cache: KeyObjectCache,
    policy: ClaimPolicy,
}

impl AlbVerifier {
    /// Build a verifier trusting tokens signed by any of `arns`, over the
    /// default `reqwest`-backed fetcher.
    pub fn create(arns: Vec<String>) -> VerifierResult<Self> {
        Self::with_fetcher(arns, Arc::new(HttpFetcher::new()))
    }

    pub fn with_fetcher(arns: Vec<String>, fetcher: Arc<dyn ByteFetcher>) -> VerifierResult<Self> {
        if arns.is_empty() {
            return Err(VerifierError::ParameterValidationError(
                "at least one load balancer ARN must be configured".into(),
            ));
        }

        let mut known = HashMap::with_capacity(arns.len());
        for arn in arns {
            let config = AlbConfig::from_arn(arn.clone())?;
            if known.contains_key(&arn) {
                return Err(VerifierError::ParameterValidationError(format!(
                    "ARN '{arn}' is configured more than once"
                )));
            }
            known.insert(arn, config);
        }

        Ok(AlbVerifier {
            known,
            cache: AlbJwksCache::new(fetcher),
            key_cache: KeyObjectCache::new(),
            policy: ClaimPolicy {
                issuer: None,
                audience: None,
                scope: None,
                grace_seconds: 0,
                custom_check: None,
            },
        })
    }

    #[must_use]
    pub fn with_grace_seconds(mut self, grace_seconds: u64) -> Self {
        self.policy.grace_seconds = grace_seconds as i64;
        self
    }

    /// Verify an ALB-signed token: the header's `kid` selects the key, the
    /// payload's `signer` claim selects which configured ARN served it.
    pub async fn verify(&self, token: &str, props: Option<VerifyProps>) -> VerifierResult<VerifiedClaims> {
        let decomposed = jwt::decompose(token)?;
        let kid = decomposed.kid().ok_or(VerifierError::JwtWithoutValidKid)?;
        let alg = decomposed.alg().ok_or(VerifierError::MissingAlg)?;

        let signer = decomposed
            .payload
            .get("signer")
            .and_then(Value::as_str)
            .ok_or_else(|| VerifierError::ParameterValidationError("token has no 'signer' claim".into()))?;

        let config = self
            .known
            .get(signer)
            .ok_or_else(|| VerifierError::IssuerNotConfigured(signer.to_string()))?;

        let jwk = self.cache.get_jwk(&config.jwks_uri(), kid).await?;
        let key = self.key_cache.get_or_create(signer, kid, &jwk)?;
        verify::verify_signature(alg, &jwk, &key, &decomposed.signing_input, &decomposed.signature)?;

        let policy = self.effective_policy(props);
        policy
            .assert(&decomposed.header, &decomposed.payload, &jwk, super::now())
            .await?;

        Ok(decomposed.payload)
    }

    fn effective_policy(&self, props: Option<VerifyProps>) -> ClaimPolicy {
        let Some(props) = props else {
            return self.policy.clone();
        };
        let mut policy = self.policy.clone();
        if let Some(audience) = props.audience {
            policy.audience = Some(audience);
        }
        if let Some(scope) = props.scope {
            policy.scope = Some(scope);
        }
        if let Some(grace_seconds) = props.grace_seconds {
            policy.grace_seconds = grace_seconds as i64;
        }
        policy
    }
}
