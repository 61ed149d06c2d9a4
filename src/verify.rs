//! Algorithm negotiation and signature verification (§4.8).
//!
//! `alg` is modeled as a tagged enum rather than carried around as a free
//! string, per the "union over algorithm families" design note: the table
//! below is the single place a new algorithm gets wired in.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Public};
use openssl::rsa::Rsa;
use openssl::sign::Verifier;

use crate::error::{VerifierError, VerifierResult};
use crate::jwk::{Jwk, KeyType};

/// A signature algorithm recognized by this crate, per the table in §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    Es512,
    EdDsa,
}

impl Algorithm {
    /// Parse a JOSE `alg` string into a recognized [`Algorithm`].
    pub fn parse(alg: &str) -> VerifierResult<Algorithm> {
        match alg {
            "RS256" => Ok(Algorithm::Rs256),
            "RS384" => Ok(Algorithm::Rs384),
            "RS512" => Ok(Algorithm::Rs512),
            "ES256" => Ok(Algorithm::Es256),
            "ES384" => Ok(Algorithm::Es384),
            "ES512" => Ok(Algorithm::Es512),
            "EdDSA" => Ok(Algorithm::EdDsa),
            other => Err(VerifierError::JwtInvalidSignatureAlgorithm(other.to_string())),
        }
    }

    fn message_digest(self) -> MessageDigest {
        match self {
            Algorithm::Rs256 | Algorithm::Es256 => MessageDigest::sha256(),
            Algorithm::Rs384 | Algorithm::Es384 => MessageDigest::sha384(),
            Algorithm::Rs512 | Algorithm::Es512 => MessageDigest::sha512(),
            Algorithm::EdDsa => MessageDigest::null(),
        }
    }

    fn key_family(self) -> KeyType {
        match self {
            Algorithm::Rs256 | Algorithm::Rs384 | Algorithm::Rs512 => KeyType::RSA,
            Algorithm::Es256 | Algorithm::Es384 | Algorithm::Es512 => KeyType::EC,
            Algorithm::EdDsa => KeyType::OKP,
        }
    }

    /// Field width in bytes of the `r` and `s` integers for an ECDSA curve,
    /// needed to split a fixed-width r||s signature.
    fn ecdsa_field_width(self) -> Option<usize> {
        match self {
            Algorithm::Es256 => Some(32),
            Algorithm::Es384 => Some(48),
            Algorithm::Es512 => Some(66),
            _ => None,
        }
    }
}

/// Materialize a native `openssl` public key from a JWK's public material
/// (§4.7's "native verification key").
pub fn key_from_jwk(jwk: &Jwk) -> VerifierResult<PKey<Public>> {
    match jwk.kty {
        KeyType::RSA => {
            let n = decode_bignum(jwk.n.as_deref())?;
            let e = decode_bignum(jwk.e.as_deref())?;
            let rsa = Rsa::from_public_components(n, e)?;
            Ok(PKey::from_rsa(rsa)?)
        }
        KeyType::EC => {
            let crv = jwk.crv.as_deref().ok_or_else(|| {
                VerifierError::JwkValidationError("EC JWK missing 'crv'".into())
            })?;
            let nid = ec_nid_for_curve(crv)?;
            let group = EcGroup::from_curve_name(nid)?;
            let x = decode_bignum(jwk.x.as_deref())?;
            let y = decode_bignum(jwk.y.as_deref())?;
            let ec_key = EcKey::from_public_key_affine_coordinates(&group, &x, &y)?;
            Ok(PKey::from_ec_key(ec_key)?)
        }
        KeyType::OKP => {
            let crv = jwk.crv.as_deref().ok_or_else(|| {
                VerifierError::JwkValidationError("OKP JWK missing 'crv'".into())
            })?;
            let id = match crv {
                "Ed25519" => Id::ED25519,
                "Ed448" => Id::ED448,
                other => {
                    return Err(VerifierError::JwkValidationError(format!(
                        "unsupported OKP curve '{other}'"
                    )))
                }
            };
            let x = jwk
                .x
                .as_deref()
                .ok_or_else(|| VerifierError::JwkValidationError("OKP JWK missing 'x'".into()))?;
            let raw = URL_SAFE_NO_PAD
                .decode(x)
                .map_err(|e| VerifierError::JwkValidationError(format!("invalid 'x': {e}")))?;
            Ok(PKey::public_key_from_raw_bytes(&raw, id)?)
        }
    }
}

fn ec_nid_for_curve(crv: &str) -> VerifierResult<Nid> {
    match crv {
        "P-256" => Ok(Nid::X9_62_PRIME256V1),
        "P-384" => Ok(Nid::SECP384R1),
        "P-521" => Ok(Nid::SECP521R1),
        other => Err(VerifierError::JwkValidationError(format!(
            "unsupported EC curve '{other}'"
        ))),
    }
}

fn decode_bignum(field: Option<&str>) -> VerifierResult<BigNum> {
    let field = field.ok_or_else(|| VerifierError::JwkValidationError("missing key material".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(field)
        .map_err(|e| VerifierError::JwkValidationError(format!("invalid base64url in key material: {e}")))?;
    Ok(BigNum::from_slice(&bytes)?)
}

/// Verify `signature` over `signing_input` using `key`, per the algorithm
/// table in §4.8. Enforces header/JWK algorithm agreement and key-type
/// family matching before ever invoking the crypto primitive.
pub fn verify_signature(
    header_alg: &str,
    jwk: &Jwk,
    key: &PKey<Public>,
    signing_input: &[u8],
    signature: &[u8],
) -> VerifierResult<()> {
    if let Some(jwk_alg) = &jwk.alg {
        if jwk_alg != header_alg {
            return Err(VerifierError::AlgNotAllowed {
                jwk_alg: jwk_alg.clone(),
                header_alg: header_alg.to_string(),
            });
        }
    }

    let algorithm = Algorithm::parse(header_alg)?;

    if algorithm.key_family() != jwk.kty {
        return Err(VerifierError::JwkInvalidKty {
            expected: key_family_name(algorithm.key_family()),
            actual: key_type_name(jwk.kty).to_string(),
            alg: header_alg.to_string(),
        });
    }

    if let Some(use_) = &jwk.use_ {
        if use_ != "sig" {
            return Err(VerifierError::JwkInvalidUse(use_.clone()));
        }
    }

    let verified = match algorithm {
        Algorithm::Rs256 | Algorithm::Rs384 | Algorithm::Rs512 => {
            verify_rsa(algorithm, key, signing_input, signature)?
        }
        Algorithm::Es256 | Algorithm::Es384 | Algorithm::Es512 => {
            verify_ecdsa_p1363(algorithm, key, signing_input, signature)?
        }
        Algorithm::EdDsa => verify_eddsa(key, signing_input, signature)?,
    };

    if verified {
        Ok(())
    } else {
        Err(VerifierError::InvalidSignature)
    }
}

fn verify_rsa(
    algorithm: Algorithm,
    key: &PKey<Public>,
    signing_input: &[u8],
    signature: &[u8],
) -> VerifierResult<bool> {
    let mut verifier = Verifier::new(algorithm.message_digest(), key)?;
    verifier.update(signing_input)?;
    Ok(verifier.verify(signature)?)
}

/// ECDSA verification over a fixed-width r||s (IEEE P1363) signature. DER
/// signatures are rejected implicitly: anything that isn't exactly
/// `2 * field_width` bytes fails to split and is reported as an invalid
/// signature rather than silently reinterpreted.
fn verify_ecdsa_p1363(
    algorithm: Algorithm,
    key: &PKey<Public>,
    signing_input: &[u8],
    signature: &[u8],
) -> VerifierResult<bool> {
    let width = algorithm
        .ecdsa_field_width()
        .expect("ECDSA algorithm always has a field width");

    if signature.len() != width * 2 {
        return Ok(false);
    }

    let r = BigNum::from_slice(&signature[..width])?;
    let s = BigNum::from_slice(&signature[width..])?;
    let der_sig = EcdsaSig::from_private_components(r, s)?.to_der()?;

    let ec_key = key.ec_key()?;
    let digest = hash(algorithm.message_digest(), signing_input)?;
    Ok(EcdsaSig::from_der(&der_sig)?.verify(&digest, &ec_key)?)
}

fn verify_eddsa(key: &PKey<Public>, signing_input: &[u8], signature: &[u8]) -> VerifierResult<bool> {
    let mut verifier = Verifier::new_without_digest(key)?;
    Ok(verifier.verify_oneshot(signature, signing_input)?)
}

fn hash(digest: MessageDigest, data: &[u8]) -> VerifierResult<Vec<u8>> {
    Ok(openssl::hash::hash(digest, data)?.to_vec())
}

fn key_family_name(kty: KeyType) -> &'static str {
    match kty {
        KeyType::RSA => "RSA",
        KeyType::EC => "EC",
        KeyType::OKP => "OKP",
    }
}

fn key_type_name(kty: KeyType) -> &'static str {
    key_family_name(kty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn rs256_round_trip_succeeds() {
        let (jwk, private) = testutil::rsa_keypair("k1", "RS256");
        let key = key_from_jwk(&jwk).unwrap();
        let signing_input = b"header.payload";
        let signature = testutil::sign_rsa(&private, Algorithm::Rs256, signing_input);

        assert!(verify_signature("RS256", &jwk, &key, signing_input, &signature).is_ok());
    }

    #[test]
    fn es256_p1363_round_trip_succeeds() {
        let (jwk, private) = testutil::ec_keypair("k1", "P-256", "ES256");
        let key = key_from_jwk(&jwk).unwrap();
        let signing_input = b"header.payload";
        let signature = testutil::sign_ecdsa_p1363(&private, Algorithm::Es256, signing_input);

        assert!(verify_signature("ES256", &jwk, &key, signing_input, &signature).is_ok());
    }

    #[test]
    fn es256_der_signature_is_rejected() {
        let (jwk, private) = testutil::ec_keypair("k1", "P-256", "ES256");
        let key = key_from_jwk(&jwk).unwrap();
        let signing_input = b"header.payload";
        let der_signature = testutil::sign_ecdsa_der(&private, Algorithm::Es256, signing_input);

        let err = verify_signature("ES256", &jwk, &key, signing_input, &der_signature).unwrap_err();
        assert!(matches!(err, VerifierError::InvalidSignature));
    }

    #[test]
    fn mismatched_header_and_jwk_alg_is_rejected_before_crypto() {
        let (mut jwk, _private) = testutil::rsa_keypair("k1", "RS256");
        jwk.alg = Some("RS256".into());
        let key = key_from_jwk(&jwk).unwrap();

        let err = verify_signature("RS384", &jwk, &key, b"x", b"not-even-decoded").unwrap_err();
        assert!(matches!(err, VerifierError::AlgNotAllowed { .. }));
    }

    #[test]
    fn mismatched_key_family_is_rejected() {
        let (jwk, _private) = testutil::ec_keypair("k1", "P-256", "ES256");
        let key = key_from_jwk(&jwk).unwrap();

        let err = verify_signature("RS256", &jwk, &key, b"x", b"y").unwrap_err();
        assert!(matches!(err, VerifierError::JwkInvalidKty { .. }));
    }

    #[test]
    fn eddsa_round_trip_succeeds() {
        let (jwk, private) = testutil::ed25519_keypair("k1");
        let key = key_from_jwk(&jwk).unwrap();
        let signing_input = b"header.payload";
        let signature = testutil::sign_eddsa(&private, signing_input);

        assert!(verify_signature("EdDSA", &jwk, &key, signing_input, &signature).is_ok());
    }
}
