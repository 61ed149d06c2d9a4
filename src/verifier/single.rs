//! A verifier bound to exactly one identity provider (§4.10): the common
//! case of "tokens come from this one issuer, at this one jwksUri".

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::GenericJwksCache;
use crate::claims::ClaimPolicy;
use crate::config::{SingleIssuerConfig, VerifyProps};
use crate::error::{VerifierError, VerifierResult};
use crate::fetch::{ByteFetcher, HttpFetcher};
use crate::jwk::Jwks;
use crate::jwt::{self, DecomposedJwt};
use crate::key_object_cache::KeyObjectCache;
use crate::verify;

/// The claims of a token that verified successfully.
pub type VerifiedClaims = Map<String, Value>;

/// Verifies JWTs issued by a single identity provider: one jwksUri, one
/// claim policy, shared key and JWKS caches across every call.
pub struct SingleIssuerVerifier {
    jwks_uri: String,
    issuer: String,
    policy: ClaimPolicy,
    jwks_cache: GenericJwksCache,
    key_cache: KeyObjectCache,
}

impl SingleIssuerVerifier {
    /// Build a verifier over the default `reqwest`-backed fetcher.
    pub fn create(config: SingleIssuerConfig) -> Self {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new()))
    }

    /// Build a verifier over a caller-supplied [`ByteFetcher`] (mock
    /// transports, connection-pool sharing, sandboxed environments).
    pub fn with_fetcher(config: SingleIssuerConfig, fetcher: Arc<dyn ByteFetcher>) -> Self {
        let jwks_uri = config.resolved_jwks_uri();
        SingleIssuerVerifier {
            jwks_uri,
            issuer: config.issuer.clone(),
            policy: ClaimPolicy {
                issuer: Some(config.issuer),
                audience: config.audience,
                scope: config.scope,
                grace_seconds: config.grace_seconds as i64,
                custom_check: config.custom_check,
            },
            jwks_cache: GenericJwksCache::new(fetcher),
            key_cache: KeyObjectCache::new(),
        }
    }

    /// Seed the JWKS cache with an already-fetched document (§3: "treated
    /// as already-fetched; no upstream request is made for them").
    pub fn cache_jwks(&self, jwks: Jwks) {
        self.jwks_cache.add_jwks(&self.jwks_uri, jwks);
    }

    /// Eagerly fetch and cache the JWKS, so the first real `verify` call
    /// doesn't pay the fetch latency.
    pub async fn hydrate(&self) -> VerifierResult<()> {
        self.jwks_cache.get_jwks(&self.jwks_uri).await?;
        Ok(())
    }

    /// Verify `token` against the configured issuer, refreshing the JWKS
    /// (subject to cache/penalty-box rules) on a cache miss.
    pub async fn verify(&self, token: &str, props: Option<VerifyProps>) -> VerifierResult<VerifiedClaims> {
        let decomposed = jwt::decompose(token)?;
        let jwk = self.jwks_cache.get_jwk(&self.jwks_uri, &decomposed).await?;
        self.finish(decomposed, jwk, props).await
    }

    /// Cache-only variant of [`Self::verify`]: never touches the network,
    /// failing with [`VerifierError::JwksNotAvailableInCache`] or
    /// [`VerifierError::KidNotFoundInJwks`] instead of fetching.
    pub fn verify_sync(&self, token: &str, props: Option<VerifyProps>) -> VerifierResult<VerifiedClaims> {
        let decomposed = jwt::decompose(token)?;
        let jwk = self.jwks_cache.get_cached_jwk(&self.jwks_uri, &decomposed)?;
        self.finish_sync(decomposed, jwk, props)
    }

    async fn finish(
        &self,
        decomposed: DecomposedJwt,
        jwk: crate::jwk::Jwk,
        props: Option<VerifyProps>,
    ) -> VerifierResult<VerifiedClaims> {
        let kid = decomposed.kid().ok_or(VerifierError::JwtWithoutValidKid)?.to_string();
        let alg = decomposed.alg().ok_or(VerifierError::MissingAlg)?;
        let key = self.key_cache.get_or_create(&self.issuer, &kid, &jwk)?;
        verify::verify_signature(alg, &jwk, &key, &decomposed.signing_input, &decomposed.signature)?;

        let policy = self.effective_policy(props);
        policy
            .assert(&decomposed.header, &decomposed.payload, &jwk, super::now())
            .await?;

        Ok(decomposed.payload)
    }

    fn finish_sync(
        &self,
        decomposed: DecomposedJwt,
        jwk: crate::jwk::Jwk,
        props: Option<VerifyProps>,
    ) -> VerifierResult<VerifiedClaims> {
        let kid = decomposed.kid().ok_or(VerifierError::JwtWithoutValidKid)?.to_string();
        let alg = decomposed.alg().ok_or(VerifierError::MissingAlg)?;
        let key = self.key_cache.get_or_create(&self.issuer, &kid, &jwk)?;
        verify::verify_signature(alg, &jwk, &key, &decomposed.signing_input, &decomposed.signature)?;

        let policy = self.effective_policy(props);
        policy.assert_sync(&decomposed.header, &decomposed.payload, &jwk, super::now())?;

        Ok(decomposed.payload)
    }

    /// Apply verify-time overrides atop the construct-time policy (§4.10:
    /// "verify-time overrides construct-time").
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
