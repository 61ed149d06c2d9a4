//! Memoizes the (possibly expensive) conversion of a JWK's public material
//! into a native `openssl` verification key, at most once per
//! (issuer, kid, jwk-fingerprint) triple (§4.7).

use std::sync::Arc;

use dashmap::DashMap;
use openssl::pkey::{PKey, Public};

use crate::jwk::Jwk;
use crate::verify::key_from_jwk;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyCacheKey {
    issuer: String,
    kid: String,
    fingerprint: String,
}

/// Cache of materialized `PKey<Public>` verification keys.
#[derive(Default)]
pub struct KeyObjectCache {
    entries: DashMap<KeyCacheKey, Arc<PKey<Public>>>,
}

impl KeyObjectCache {
    pub fn new() -> Self {
        KeyObjectCache {
            entries: DashMap::new(),
        }
    }

    /// Return the cached key object for `(issuer, kid, jwk)` if present,
    /// otherwise materialize it from `jwk`, cache it, and return it.
    pub fn get_or_create(
        &self,
        issuer: &str,
        kid: &str,
        jwk: &Jwk,
    ) -> crate::error::VerifierResult<Arc<PKey<Public>>> {
        let key = KeyCacheKey {
            issuer: issuer.to_string(),
            kid: kid.to_string(),
            fingerprint: jwk.fingerprint(),
        };

        if let Some(existing) = self.entries.get(&key) {
            return Ok(existing.clone());
        }

        let native_key = Arc::new(key_from_jwk(jwk)?);
        self.entries.insert(key, native_key.clone());
        Ok(native_key)
    }

    /// Drop every entry belonging to `issuer`. Called when the upstream
    /// JWKS for that issuer is refetched and a previously known kid may now
    /// carry different material.
    pub fn clear_cache(&self, issuer: &str) {
        self.entries.retain(|key, _| key.issuer != issuer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::KeyType;
    use openssl::rsa::Rsa;

    fn rsa_jwk_from_keypair(kid: &str) -> Jwk {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
        let rsa = Rsa::generate(2048).unwrap();
        Jwk {
            kty: KeyType::RSA,
            use_: Some("sig".into()),
            alg: Some("RS256".into()),
            kid: Some(kid.into()),
            n: Some(URL_SAFE_NO_PAD.encode(rsa.n().to_vec())),
            e: Some(URL_SAFE_NO_PAD.encode(rsa.e().to_vec())),
            crv: None,
            x: None,
            y: None,
        }
    }

    #[test]
    fn caches_by_issuer_kid_and_fingerprint() {
        let cache = KeyObjectCache::new();
        let jwk = rsa_jwk_from_keypair("k1");

        let first = cache.get_or_create("https://issuer.example.com", "k1", &jwk).unwrap();
        let second = cache.get_or_create("https://issuer.example.com", "k1", &jwk).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_issuers_sharing_a_kid_get_distinct_entries() {
        let cache = KeyObjectCache::new();
        let jwk_a = rsa_jwk_from_keypair("shared-kid");
        let jwk_b = rsa_jwk_from_keypair("shared-kid");

        let a = cache.get_or_create("https://issuer-a.example.com", "shared-kid", &jwk_a).unwrap();
        let b = cache.get_or_create("https://issuer-b.example.com", "shared-kid", &jwk_b).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn clear_cache_drops_only_that_issuer() {
        let cache = KeyObjectCache::new();
        let jwk = rsa_jwk_from_keypair("k1");

        let before = cache.get_or_create("https://issuer.example.com", "k1", &jwk).unwrap();
        cache.clear_cache("https://issuer.example.com");
        let after = cache.get_or_create("https://issuer.example.com", "k1", &jwk).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
    }
}
