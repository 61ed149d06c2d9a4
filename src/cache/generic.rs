//! The generic per-jwksUri JWKS cache (§4.4): a permanent map from jwksUri
//! to the last successfully fetched JWKS, with concurrent fetches for the
//! same URI coalesced onto one shared future.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};

use crate::error::{VerifierError, VerifierResult};
use crate::fetch::{ByteFetcher, FetchOptions};
use crate::jwk::{Jwk, Jwks};
use crate::jwt::DecomposedJwt;
use crate::penalty_box::PenaltyBox;

type SharedFetch = Shared<BoxFuture<'static, VerifierResult<Jwks>>>;

/// Caches JWKS documents per jwksUri, coalescing concurrent fetches and
/// coordinating with a [`PenaltyBox`] to avoid hammering a provider that
/// just failed to produce a requested `kid`.
pub struct GenericJwksCache {
    fetcher: Arc<dyn ByteFetcher>,
    jwks: DashMap<String, Jwks>,
    in_flight: DashMap<String, SharedFetch>,
    penalty_box: PenaltyBox,
}

impl GenericJwksCache {
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        GenericJwksCache {
            fetcher,
            jwks: DashMap::new(),
            in_flight: DashMap::new(),
            penalty_box: PenaltyBox::new(),
        }
    }

    /// Seed the cache with an already-fetched JWKS (§3: "treated as
    /// already-fetched; no upstream request is made for them").
    pub fn add_jwks(&self, uri: &str, jwks: Jwks) {
        self.jwks.insert(uri.to_string(), jwks);
    }

    /// Return the cached JWKS for `uri`, fetching (and coalescing
    /// concurrent fetches) on a miss.
    pub async fn get_jwks(&self, uri: &str) -> VerifierResult<Jwks> {
        if let Some(cached) = self.jwks.get(uri) {
            debug!(uri, "JWKS cache hit");
            return Ok(cached.clone());
        }
        self.fetch_coalesced(uri).await
    }

    /// Synchronous cache-only lookup. Fails with
    /// [`VerifierError::JwksNotAvailableInCache`] rather than fetching.
    pub fn get_cached_jwks(&self, uri: &str) -> VerifierResult<Jwks> {
        self.jwks
            .get(uri)
            .map(|entry| entry.clone())
            .ok_or_else(|| VerifierError::JwksNotAvailableInCache {
                uri: uri.to_string(),
            })
    }

    /// Resolve the JWK matching `jwt`'s header `kid` for `uri`, per the
    /// algorithm in §4.4: cache hit bypasses the penalty box entirely;
    /// a miss awaits the penalty box before fetching.
    pub async fn get_jwk(&self, uri: &str, jwt: &DecomposedJwt) -> VerifierResult<Jwk> {
        let kid = jwt.kid().ok_or(VerifierError::JwtWithoutValidKid)?;

        if let Some(jwks) = self.jwks.get(uri) {
            if let Some(jwk) = jwks.find(kid) {
                return Ok(jwk.clone());
            }
        }

        self.penalty_box.wait(uri, kid).await?;

        let jwks = self.fetch_coalesced(uri).await.map_err(|e| {
            // §4.4 step 6: fetch failure propagates without touching the
            // penalty box; the in-flight handle is already gone by the
            // time fetch_coalesced returns.
            e
        })?;

        match jwks.find(kid) {
            Some(jwk) => {
                self.penalty_box.register_successful_attempt(uri, kid);
                Ok(jwk.clone())
            }
            None => {
                self.penalty_box.register_failed_attempt(uri, kid);
                Err(VerifierError::KidNotFoundInJwks {
                    uri: uri.to_string(),
                    kid: kid.to_string(),
                })
            }
        }
    }

    /// Synchronous, cache-only variant of [`Self::get_jwk`].
    pub fn get_cached_jwk(&self, uri: &str, jwt: &DecomposedJwt) -> VerifierResult<Jwk> {
        let kid = jwt.kid().ok_or(VerifierError::JwtWithoutValidKid)?;
        let jwks = self.get_cached_jwks(uri)?;
        jwks.find(kid).cloned().ok_or_else(|| VerifierError::KidNotFoundInJwks {
            uri: uri.to_string(),
            kid: kid.to_string(),
        })
    }

    async fn fetch_coalesced(&self, uri: &str) -> VerifierResult<Jwks> {
        let shared = match self.in_flight.entry(uri.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => {
                let fetcher = self.fetcher.clone();
                let owned_uri = uri.to_string();
                let fut: BoxFuture<'static, VerifierResult<Jwks>> = async move {
                    let bytes = fetcher.fetch(&owned_uri, FetchOptions::json()).await?;
                    Jwks::parse(&bytes)
                }
                .boxed();
                let shared = fut.shared();
                vacant.insert(shared.clone());
                shared
            }
        };

        let result = shared.await;
        // Regardless of outcome, the in-flight handle for this URI is
        // retired: a later call either hits the permanent cache (success)
        // or starts a fresh fetch (failure).
        self.in_flight.remove(uri);

        if let Ok(jwks) = &result {
            info!(uri, keys = jwks.keys.len(), "JWKS fetched and cached");
            self.jwks.insert(uri.to_string(), jwks.clone());
        }

        result
    }
}
