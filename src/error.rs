//! The closed taxonomy of ways a token verification can fail.
//!
//! Every fallible operation in this crate returns [`VerifierError`]. Variants
//! carry enough context (uri, kid, expected/actual) to explain a rejection
//! without a debugger attached, following the pattern of the JWKS clients
//! retrieved alongside this crate.

use std::time::Duration;

/// The single error type returned by every public operation in this crate.
///
/// `Clone` is derived so a single fetch failure can be handed back to every
/// coalesced waiter (§4.4/§5) without re-running the fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerifierError {
    // --- Parse ---
    #[error("malformed JWT: {0}")]
    ParseError(String),

    #[error("JWT header is missing a usable 'kid' claim")]
    JwtWithoutValidKid,

    #[error("JWKS document at {uri} failed validation: {reason}")]
    JwksValidationError { uri: String, reason: String },

    #[error("JWK failed validation: {0}")]
    JwkValidationError(String),

    // --- Network ---
    #[error("fetch of {uri} failed (retryable): {reason}")]
    FetchError { uri: String, reason: String },

    #[error("fetch of {uri} failed (not retryable): {reason}")]
    NonRetryableFetchError { uri: String, reason: String },

    // --- Cache ---
    #[error("JWKS for {uri} is not available in cache")]
    JwksNotAvailableInCache { uri: String },

    #[error("no JWK with kid '{kid}' found in JWKS at {uri}")]
    KidNotFoundInJwks { uri: String, kid: String },

    #[error("{uri}/{kid} is in the penalty box for another {remaining:?}")]
    WaitPeriodNotYetEnded {
        uri: String,
        kid: String,
        remaining: Duration,
    },

    // --- Crypto ---
    #[error("signature verification failed")]
    InvalidSignature,

    #[error("JWK 'use' is '{0}', expected 'sig' or absent")]
    JwkInvalidUse(String),

    #[error("JWK 'kty' is '{actual}', expected '{expected}' for alg '{alg}'")]
    JwkInvalidKty {
        expected: &'static str,
        actual: String,
        alg: String,
    },

    #[error("unsupported or mismatched signature algorithm: {0}")]
    JwtInvalidSignatureAlgorithm(String),

    #[error("header is missing the 'alg' claim")]
    MissingAlg,

    #[error("JWK declares alg '{jwk_alg}' but header declares '{header_alg}'")]
    AlgNotAllowed {
        jwk_alg: String,
        header_alg: String,
    },

    // --- Claims ---
    #[error("token has no 'iss' claim")]
    MissingIssuer,

    #[error("token issuer '{actual}' does not match expected '{expected}'")]
    IssuerNotAllowed { expected: String, actual: String },

    #[error("token has no 'aud' claim")]
    MissingAudience,

    #[error("token audience {actual:?} does not intersect expected {expected:?}")]
    AudienceNotAllowed {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("token expired at {exp} (now={now}, graceSeconds={grace})")]
    JwtExpired { exp: i64, now: i64, grace: i64 },

    #[error("token not valid until {nbf} (now={now}, graceSeconds={grace})")]
    JwtNotBefore { nbf: i64, now: i64, grace: i64 },

    #[error("token has no 'scope' claim")]
    MissingScope,

    #[error("token scopes {actual:?} do not intersect expected {expected:?}")]
    ScopeNotAllowed {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("custom claim check rejected the token: {0}")]
    CustomCheckFailed(String),

    // --- Config ---
    #[error("parameter validation failed: {0}")]
    ParameterValidationError(String),

    #[error("no configuration registered for issuer '{0}'")]
    IssuerNotConfigured(String),

    #[error("invalid ALB ARN '{0}': {1}")]
    AlbUriError(String, String),
}

impl From<serde_json::Error> for VerifierError {
    fn from(err: serde_json::Error) -> Self {
        VerifierError::ParseError(err.to_string())
    }
}

impl From<base64::DecodeError> for VerifierError {
    fn from(err: base64::DecodeError) -> Self {
        VerifierError::ParseError(err.to_string())
    }
}

impl From<openssl::error::ErrorStack> for VerifierError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        VerifierError::JwkValidationError(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type VerifierResult<T> = Result<T, VerifierError>;
