//! Verifier compositions (§4.10-§4.12): the public surfaces that combine
//! JWKS caching, key materialization and claim assertion into a single
//! `verify(token)` call.

pub mod alb;
pub mod multi;
pub mod single;

pub use alb::AlbVerifier;
pub use multi::MultiIssuerVerifier;
pub use single::SingleIssuerVerifier;

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, the clock every verifier checks claims
/// against. Not configurable: callers that need a fixed clock for testing
/// should assert directly against [`crate::claims::ClaimPolicy`].
pub(crate) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}
