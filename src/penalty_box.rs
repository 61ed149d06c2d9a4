//! Per-(jwksUri, kid) cool-down preventing a kid-rotation storm from
//! flooding an upstream JWKS/ALB endpoint with one fetch per attacker-forged
//! kid (§4.6).
//!
//! No timer task is spawned: an expiry `Instant` is stored and compared
//! against the clock on each `wait`, so an idle penalty box never keeps a
//! process alive (§5, "un-referenced timer").

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::warn;

use crate::error::{VerifierError, VerifierResult};

const DEFAULT_WAIT_SECONDS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PenaltyKey {
    uri: String,
    kid: String,
}

/// A per-endpoint, per-kid cool-down tracker.
pub struct PenaltyBox {
    wait: Duration,
    entries: DashMap<PenaltyKey, Instant>,
}

impl PenaltyBox {
    pub fn new() -> Self {
        PenaltyBox::with_wait_seconds(DEFAULT_WAIT_SECONDS)
    }

    pub fn with_wait_seconds(wait_seconds: u64) -> Self {
        PenaltyBox {
            wait: Duration::from_secs(wait_seconds),
            entries: DashMap::new(),
        }
    }

    /// Fail immediately with [`VerifierError::WaitPeriodNotYetEnded`] if
    /// `(uri, kid)` is still within its cool-down window. The spec models
    /// this as an awaited operation, but there is nothing to suspend on: no
    /// timer fires early, so this resolves synchronously.
    pub async fn wait(&self, uri: &str, kid: &str) -> VerifierResult<()> {
        let key = PenaltyKey {
            uri: uri.to_string(),
            kid: kid.to_string(),
        };
        if let Some(expiry) = self.entries.get(&key) {
            let now = Instant::now();
            if *expiry > now {
                let remaining = *expiry - now;
                warn!(uri, kid, ?remaining, "kid is in the penalty box");
                return Err(VerifierError::WaitPeriodNotYetEnded {
                    uri: uri.to_string(),
                    kid: kid.to_string(),
                    remaining,
                });
            }
        }
        Ok(())
    }

    /// Record a failed kid lookup, arming (or rearming) the cool-down.
    pub fn register_failed_attempt(&self, uri: &str, kid: &str) {
        let key = PenaltyKey {
            uri: uri.to_string(),
            kid: kid.to_string(),
        };
        self.entries.insert(key, Instant::now() + self.wait);
    }

    /// Clear the cool-down for `(uri, kid)` following a successful lookup.
    pub fn register_successful_attempt(&self, uri: &str, kid: &str) {
        let key = PenaltyKey {
            uri: uri.to_string(),
            kid: kid.to_string(),
        };
        self.entries.remove(&key);
    }

    /// Clear every cool-down entry for `uri`, regardless of kid.
    pub fn release(&self, uri: &str) {
        self.entries.retain(|key, _| key.uri != uri);
    }
}

impl Default for PenaltyBox {
    fn default() -> Self {
        Self::new()
    }
}
