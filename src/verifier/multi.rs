//! A verifier dispatching across several identity providers by the token's
//! own `iss` claim (§4.11).

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{SingleIssuerConfig, VerifyProps};
use crate::error::{VerifierError, VerifierResult};
use crate::fetch::ByteFetcher;
use crate::jwt;

use super::single::{SingleIssuerVerifier, VerifiedClaims};

/// Verifies JWTs from any of several configured issuers, picking the right
/// per-issuer verifier by reading the token's `iss` claim before ever
/// consulting a JWKS cache (§4.11: "the unverified `iss` claim selects
/// configuration; it is re-checked as a verified claim afterward").
pub struct MultiIssuerVerifier {
    verifiers: HashMap<String, SingleIssuerVerifier>,
}

impl MultiIssuerVerifier {
    /// Build a verifier over several issuer configs, each using its own
    /// default `reqwest`-backed fetcher. Fails with
    /// [`VerifierError::ParameterValidationError`] if two configs share an
    /// issuer (§4.11: issuers must be configured at most once).
    pub fn create(configs: Vec<SingleIssuerConfig>) -> VerifierResult<Self> {
        let mut verifiers = HashMap::with_capacity(configs.len());
        for config in configs {
            let issuer = config.issuer.clone();
            if verifiers.contains_key(&issuer) {
                return Err(VerifierError::ParameterValidationError(format!(
                    "issuer '{issuer}' is configured more than once"
                )));
            }
            verifiers.insert(issuer, SingleIssuerVerifier::create(config));
        }
        Ok(MultiIssuerVerifier { verifiers })
    }

    /// Build a verifier over several issuer configs sharing a single
    /// [`ByteFetcher`] (e.g. a shared connection pool or test mock).
    pub fn with_fetcher(configs: Vec<SingleIssuerConfig>, fetcher: Arc<dyn ByteFetcher>) -> VerifierResult<Self> {
        let mut verifiers = HashMap::with_capacity(configs.len());
        for config in configs {
            let issuer = config.issuer.clone();
            if verifiers.contains_key(&issuer) {
                return Err(VerifierError::ParameterValidationError(format!(
                    "issuer '{issuer}' is configured more than once"
                )));
            }
            verifiers.insert(issuer, SingleIssuerVerifier::with_fetcher(config, fetcher.clone()));
        }
        Ok(MultiIssuerVerifier { verifiers })
    }

    /// Verify `token`, dispatching to the verifier configured for its `iss`
    /// claim. Fails with [`VerifierError::IssuerNotConfigured`] when no
    /// verifier is registered for that issuer.
    pub async fn verify(&self, token: &str, props: Option<VerifyProps>) -> VerifierResult<VerifiedClaims> {
        let verifier = self.verifier_for(token)?;
        verifier.verify(token, props).await
    }

    /// Cache-only variant of [`Self::verify`].
    pub fn verify_sync(&self, token: &str, props: Option<VerifyProps>) -> VerifierResult<VerifiedClaims> {
        let verifier = self.verifier_for(token)?;
        verifier.verify_sync(token, props)
    }

    /// Eagerly hydrate every configured issuer's JWKS cache.
    pub async fn hydrate_all(&self) -> VerifierResult<()> {
        for verifier in self.verifiers.values() {
            verifier.hydrate().await?;
        }
        Ok(())
    }

    fn verifier_for(&self, token: &str) -> VerifierResult<&SingleIssuerVerifier> {
        let decomposed = jwt::decompose(token)?;
        let iss = decomposed.iss().ok_or(VerifierError::MissingIssuer)?;
        self.verifiers
            .get(iss)
            .ok_or_else(|| VerifierError::IssuerNotConfigured(iss.to_string()))
    }
}
