//! Claim assertions (§4.9): issuer, audience, expiry, not-before, scope and
//! a pluggable custom predicate, executed in that fixed order so the first
//! failure is always the one reported.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::Audience;
use crate::error::{VerifierError, VerifierResult};
use crate::jwk::Jwk;
use crate::jwt;

/// A pluggable, user-supplied final check over the fully decoded token and
/// the JWK that verified it (§4.9 step 6).
#[async_trait]
pub trait CustomCheck: Send + Sync {
    async fn check(
        &self,
        header: &Map<String, Value>,
        payload: &Map<String, Value>,
        jwk: &Jwk,
    ) -> VerifierResult<()>;

    /// A synchronous variant of [`Self::check`], used by the sync verifier
    /// surface (§4.10). Returning `None` means this check cannot run
    /// without suspending; the sync verifier then fails fast with
    /// `ParameterValidationError` rather than silently blocking on an
    /// async check. The default implementation returns `None`, matching a
    /// check that only has an async implementation.
    fn check_sync(
        &self,
        _header: &Map<String, Value>,
        _payload: &Map<String, Value>,
        _jwk: &Jwk,
    ) -> Option<VerifierResult<()>> {
        None
    }
}

/// The claim-level policy a verifier enforces, independent of signature
/// verification. Constructed from [`crate::config::SingleIssuerConfig`] and
/// optionally overridden per-call by `VerifyProps`.
#[derive(Clone)]
pub struct ClaimPolicy {
    pub issuer: Option<String>,
    pub audience: Option<Audience>,
    pub scope: Option<String>,
    pub grace_seconds: i64,
    pub custom_check: Option<Arc<dyn CustomCheck>>,
}

impl ClaimPolicy {
    /// Run every assertion in §4.9 order against `payload`, stopping at the
    /// first failure. `now` is the caller's clock, seconds since epoch.
    pub async fn assert(&self, header: &Map<String, Value>, payload: &Map<String, Value>, jwk: &Jwk, now: i64) -> VerifierResult<()> {
        self.assert_issuer(payload)?;
        self.assert_audience(payload)?;
        self.assert_expiry(payload, now)?;
        self.assert_not_before(payload, now)?;
        self.assert_scope(payload)?;

        if let Some(check) = &self.custom_check {
            check.check(header, payload, jwk).await?;
        }

        Ok(())
    }

    /// Synchronous subset of [`Self::assert`], for the sync verifier
    /// surface. If a custom check is configured and it cannot produce a
    /// synchronous result, this fails with `ParameterValidationError`
    /// rather than silently blocking on an async check.
    pub fn assert_sync(&self, header: &Map<String, Value>, payload: &Map<String, Value>, jwk: &Jwk, now: i64) -> VerifierResult<()> {
        self.assert_issuer(payload)?;
        self.assert_audience(payload)?;
        self.assert_expiry(payload, now)?;
        self.assert_not_before(payload, now)?;
        self.assert_scope(payload)?;

        if let Some(check) = &self.custom_check {
            match check.check_sync(header, payload, jwk) {
                Some(result) => result?,
                None => {
                    return Err(VerifierError::ParameterValidationError(
                        "custom check has no synchronous implementation".into(),
                    ))
                }
            }
        }

        Ok(())
    }

    fn assert_issuer(&self, payload: &Map<String, Value>) -> VerifierResult<()> {
        let Some(expected) = &self.issuer else {
            return Ok(());
        };
        let actual = payload
            .get("iss")
            .and_then(Value::as_str)
            .ok_or(VerifierError::MissingIssuer)?;
        if actual != expected {
            return Err(VerifierError::IssuerNotAllowed {
                expected: expected.clone(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    fn assert_audience(&self, payload: &Map<String, Value>) -> VerifierResult<()> {
        let Some(expected) = &self.audience else {
            return Ok(());
        };
        let expected_list = expected.as_list();
        let actual_list = jwt::audience_claim(payload).ok_or(VerifierError::MissingAudience)?;

        if expected_list.iter().any(|e| actual_list.contains(e)) {
            Ok(())
        } else {
            Err(VerifierError::AudienceNotAllowed {
                expected: expected_list,
                actual: actual_list,
            })
        }
    }

    fn assert_expiry(&self, payload: &Map<String, Value>, now: i64) -> VerifierResult<()> {
        let exp = payload
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| VerifierError::ParseError("token has no 'exp' claim".into()))?;
        if exp > now - self.grace_seconds {
            Ok(())
        } else {
            Err(VerifierError::JwtExpired {
                exp,
                now,
                grace: self.grace_seconds,
            })
        }
    }

    fn assert_not_before(&self, payload: &Map<String, Value>, now: i64) -> VerifierResult<()> {
        let Some(nbf) = payload.get("nbf").and_then(Value::as_i64) else {
            return Ok(());
        };
        if nbf <= now + self.grace_seconds {
            Ok(())
        } else {
            Err(VerifierError::JwtNotBefore {
                nbf,
                now,
                grace: self.grace_seconds,
            })
        }
    }

    fn assert_scope(&self, payload: &Map<String, Value>) -> VerifierResult<()> {
        let Some(expected) = &self.scope else {
            return Ok(());
        };
        if expected.is_empty() {
            return Ok(());
        }
        let expected_list: Vec<String> = expected.split_whitespace().map(str::to_owned).collect();

        let actual_scope = payload
            .get("scope")
            .and_then(Value::as_str)
            .ok_or(VerifierError::MissingScope)?;
        let actual_list: Vec<String> = actual_scope.split_whitespace().map(str::to_owned).collect();

        if expected_list.iter().any(|e| actual_list.contains(e)) {
            Ok(())
        } else {
            Err(VerifierError::ScopeNotAllowed {
                expected: expected_list,
                actual: actual_list,
            })
        }
    }
}
