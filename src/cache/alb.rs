//! The ALB (AWS Application Load Balancer) JWKS cache (§4.5): ALB has no
//! JWKS document, only one PEM per `kid` at `{base}/{kid}`. This cache is
//! therefore LRU-bounded (default capacity 2) rather than unbounded, and
//! rejects non-UUID kids before ever touching the network — a forged kid
//! would otherwise cause one outbound fetch per guess.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use openssl::bn::BigNumContext;
use openssl::ec::EcKey;
use tracing::debug;

use crate::error::{VerifierError, VerifierResult};
use crate::fetch::{ByteFetcher, FetchOptions};
use crate::jwk::{Jwk, KeyType};

const DEFAULT_CAPACITY: usize = 2;

type SharedFetch = Shared<BoxFuture<'static, VerifierResult<Jwk>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AlbKey {
    base_uri: String,
    kid: String,
}

/// Kid-parameterized JWKS cache for ALB's per-key PEM endpoint.
pub struct AlbJwksCache {
    fetcher: Arc<dyn ByteFetcher>,
    entries: Mutex<LruCache<AlbKey, Jwk>>,
    in_flight: DashMap<AlbKey, SharedFetch>,
}

impl AlbJwksCache {
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self::with_capacity(fetcher, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(fetcher: Arc<dyn ByteFetcher>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        AlbJwksCache {
            fetcher,
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: DashMap::new(),
        }
    }

    /// Resolve the JWK for `kid` at `base_uri`, fetching the PEM on a
    /// cache miss. Rejects malformed kids before any network access.
    pub async fn get_jwk(&self, base_uri: &str, kid: &str) -> VerifierResult<Jwk> {
        if !is_uuid_v4_lexical(kid) {
            return Err(VerifierError::JwtWithoutValidKid);
        }

        let key = AlbKey {
            base_uri: base_uri.to_string(),
            kid: kid.to_string(),
        };

        if let Some(jwk) = self.entries.lock().unwrap().get(&key).cloned() {
            debug!(base_uri, kid, "ALB cache hit");
            return Ok(jwk);
        }

        let jwk = self.fetch_coalesced(&key).await?;

        let mut entries = self.entries.lock().unwrap();
        if let Some((evicted_key, _)) = entries.push(key, jwk.clone()) {
            debug!(
                evicted_base_uri = %evicted_key.base_uri,
                evicted_kid = %evicted_key.kid,
                capacity = entries.cap().get(),
                "evicted ALB cache entry"
            );
        }

        Ok(jwk)
    }

    async fn fetch_coalesced(&self, key: &AlbKey) -> VerifierResult<Jwk> {
        let shared = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => {
                let fetcher = self.fetcher.clone();
                let uri = format!("{}/{}", key.base_uri, key.kid);
                let kid = key.kid.clone();
                let fut: BoxFuture<'static, VerifierResult<Jwk>> = async move {
                    let pem = fetcher.fetch(&uri, FetchOptions::text()).await?;
                    jwk_from_pem(&pem, &kid)
                }
                .boxed();
                let shared = fut.shared();
                vacant.insert(shared.clone());
                shared
            }
        };

        let result = shared.await;
        self.in_flight.remove(key);
        result
    }
}

/// Validate that `kid` is lexically a UUID (any version marker is
/// accepted; ALB's own kids are v4, but the check here is purely the
/// `8-4-4-4-12` hex shape per §4.5, not a version/variant check).
fn is_uuid_v4_lexical(kid: &str) -> bool {
    let groups: Vec<&str> = kid.split('-').collect();
    let expected_lengths = [8, 4, 4, 4, 12];
    if groups.len() != expected_lengths.len() {
        return false;
    }
    groups
        .iter()
        .zip(expected_lengths)
        .all(|(group, len)| group.len() == len && group.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Convert an SPKI PEM (as ALB's per-kid endpoint returns) into a JWK with
/// `kty="EC"`, `use="sig"`, `alg="ES256"` and the supplied kid (§4.5).
fn jwk_from_pem(pem: &[u8], kid: &str) -> VerifierResult<Jwk> {
    let ec_key = EcKey::public_key_from_pem(pem).map_err(|e| VerifierError::JwkValidationError(format!(
        "ALB key for kid '{kid}' is not a valid EC public key PEM: {e}"
    )))?;

    let group = ec_key.group();
    let mut ctx = BigNumContext::new()?;
    let mut x = openssl::bn::BigNum::new()?;
    let mut y = openssl::bn::BigNum::new()?;
    ec_key.public_key().affine_coordinates_gfp(group, &mut x, &mut y, &mut ctx)?;

    Ok(Jwk {
        kty: KeyType::EC,
        use_: Some("sig".into()),
        alg: Some("ES256".into()),
        kid: Some(kid.to_string()),
        n: None,
        e: None,
        crv: Some("P-256".into()),
        x: Some(URL_SAFE_NO_PAD.encode(x.to_vec())),
        y: Some(URL_SAFE_NO_PAD.encode(y.to_vec())),
    })
}
