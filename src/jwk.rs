//! Types and shape invariants for JWK/JWKS (RFC 7517), generalizing the
//! teacher's RSA-only `JWK`/`JWKS` structs to the RSA/EC/OKP families this
//! crate verifies.

use serde::{Deserialize, Serialize};

use crate::error::{VerifierError, VerifierResult};

/// `kty` values this crate understands. Anything else is rejected at
/// deserialization time rather than carried around as a free string, per
/// the "union over algorithm families" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum KeyType {
    RSA,
    EC,
    OKP,
}

/// A single JSON Web Key. Only the fields this crate consumes are modeled;
/// unrecognized fields are ignored rather than rejected, since JWKS
/// documents legitimately carry x5c/x5t and similar fields we don't need.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Jwk {
    pub kty: KeyType,

    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    // RSA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // EC / OKP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    /// Validate the shape invariants of §3/§4.3 that apply regardless of
    /// which algorithm ultimately uses this key: `use` must be absent or
    /// "sig", and key-type-specific material must be present.
    pub fn validate_shape(&self) -> VerifierResult<()> {
        if let Some(use_) = &self.use_ {
            if use_ != "sig" {
                return Err(VerifierError::JwkInvalidUse(use_.clone()));
            }
        }

        match self.kty {
            KeyType::RSA => {
                if self.n.is_none() || self.e.is_none() {
                    return Err(VerifierError::JwkValidationError(
                        "RSA JWK is missing 'n' or 'e'".into(),
                    ));
                }
            }
            KeyType::EC => {
                if self.crv.is_none() || self.x.is_none() || self.y.is_none() {
                    return Err(VerifierError::JwkValidationError(
                        "EC JWK is missing 'crv', 'x' or 'y'".into(),
                    ));
                }
            }
            KeyType::OKP => {
                if self.crv.is_none() || self.x.is_none() {
                    return Err(VerifierError::JwkValidationError(
                        "OKP JWK is missing 'crv' or 'x'".into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Stable identifier derived from this key's public material, used to
    /// key the key-object cache so two issuers that happen to reuse the
    /// same `kid` never share a materialized key object.
    pub fn fingerprint(&self) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.kty.hash_into(&mut hasher);
        self.n.hash(&mut hasher);
        self.e.hash(&mut hasher);
        self.crv.hash(&mut hasher);
        self.x.hash(&mut hasher);
        self.y.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl KeyType {
    fn hash_into<H: std::hash::Hasher>(self, hasher: &mut H) {
        use std::hash::Hash;
        (self as u8).hash(hasher);
    }
}

/// A JSON Web Key Set: `{ "keys": [ ... ] }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn parse(bytes: &[u8]) -> VerifierResult<Jwks> {
        let jwks: Jwks = serde_json::from_slice(bytes)
            .map_err(|e| VerifierError::ParseError(format!("invalid JWKS document: {e}")))?;
        for jwk in &jwks.keys {
            // Shape validation here is advisory: a JWKS may legitimately
            // contain keys this crate's verifier will never use (e.g. an
            // `enc`-use key alongside `sig`-use keys). Key-use-time checks
            // in `validate_shape` are re-run when a key is actually
            // selected for verification.
            let _ = jwk.validate_shape();
        }
        Ok(jwks)
    }

    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: KeyType::RSA,
            use_: Some("sig".into()),
            alg: Some("RS256".into()),
            kid: Some(kid.into()),
            n: Some("n-value".into()),
            e: Some("AQAB".into()),
            crv: None,
            x: None,
            y: None,
        }
    }

    #[test]
    fn finds_jwk_by_kid() {
        let jwks = Jwks {
            keys: vec![rsa_jwk("one"), rsa_jwk("two")],
        };
        assert!(jwks.find("two").is_some());
        assert!(jwks.find("three").is_none());
    }

    #[test]
    fn rejects_use_other_than_sig() {
        let mut jwk = rsa_jwk("x");
        jwk.use_ = Some("enc".into());
        assert!(matches!(
            jwk.validate_shape(),
            Err(VerifierError::JwkInvalidUse(_))
        ));
    }

    #[test]
    fn rejects_rsa_key_missing_material() {
        let mut jwk = rsa_jwk("x");
        jwk.n = None;
        assert!(jwk.validate_shape().is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_distinguishes_keys() {
        let a = rsa_jwk("shared-kid");
        let mut b = rsa_jwk("shared-kid");
        b.n = Some("different-n".into());

        assert_eq!(a.fingerprint(), a.fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn parses_jwks_document() {
        let json = br#"{"keys":[{"kty":"RSA","kid":"k1","n":"abc","e":"AQAB"}]}"#;
        let jwks = Jwks::parse(json).unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.find("k1").unwrap().kty, KeyType::RSA);
    }
}
