//! In-process key generation and token signing used exclusively by this
//! crate's own test suite (§13). Not part of the public API: the "in-tree
//! test key generation" collaborator is explicitly out of scope (§1) as a
//! shippable surface, but a verifier crate cannot test itself without
//! producing real signed tokens, so this module builds just enough of it,
//! gated entirely behind `#[cfg(test)]`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use openssl::bn::BigNumContext;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use serde_json::{json, Value};

use crate::jwk::{Jwk, KeyType};
use crate::verify::Algorithm;

pub fn rsa_keypair(kid: &str, alg: &str) -> (Jwk, Rsa<Private>) {
    let rsa = Rsa::generate(2048).expect("rsa keygen");
    let jwk = Jwk {
        kty: KeyType::RSA,
        use_: Some("sig".into()),
        alg: Some(alg.into()),
        kid: Some(kid.into()),
        n: Some(URL_SAFE_NO_PAD.encode(rsa.n().to_vec())),
        e: Some(URL_SAFE_NO_PAD.encode(rsa.e().to_vec())),
        crv: None,
        x: None,
        y: None,
    };
    (jwk, rsa)
}

fn nid_for_curve(crv: &str) -> Nid {
    match crv {
        "P-256" => Nid::X9_62_PRIME256V1,
        "P-384" => Nid::SECP384R1,
        "P-521" => Nid::SECP521R1,
        other => panic!("unsupported test curve {other}"),
    }
}

pub fn ec_keypair(kid: &str, crv: &str, alg: &str) -> (Jwk, EcKey<Private>) {
    let group = EcGroup::from_curve_name(nid_for_curve(crv)).unwrap();
    let ec_key = EcKey::generate(&group).expect("ec keygen");

    let mut ctx = BigNumContext::new().unwrap();
    let mut x = openssl::bn::BigNum::new().unwrap();
    let mut y = openssl::bn::BigNum::new().unwrap();
    ec_key
        .public_key()
        .affine_coordinates_gfp(&group, &mut x, &mut y, &mut ctx)
        .unwrap();

    let jwk = Jwk {
        kty: KeyType::EC,
        use_: Some("sig".into()),
        alg: Some(alg.into()),
        kid: Some(kid.into()),
        n: None,
        e: None,
        crv: Some(crv.into()),
        x: Some(URL_SAFE_NO_PAD.encode(x.to_vec())),
        y: Some(URL_SAFE_NO_PAD.encode(y.to_vec())),
    };
    (jwk, ec_key)
}

pub fn ed25519_keypair(kid: &str) -> (Jwk, PKey<Private>) {
    let private = PKey::generate_ed25519().expect("ed25519 keygen");
    let raw = private.raw_public_key().expect("raw public key");

    let jwk = Jwk {
        kty: KeyType::OKP,
        use_: Some("sig".into()),
        alg: Some("EdDSA".into()),
        kid: Some(kid.into()),
        n: None,
        e: None,
        crv: Some("Ed25519".into()),
        x: Some(URL_SAFE_NO_PAD.encode(raw)),
        y: None,
    };
    (jwk, private)
}

pub fn sign_rsa(private: &Rsa<Private>, algorithm: Algorithm, data: &[u8]) -> Vec<u8> {
    let digest = match algorithm {
        Algorithm::Rs256 => MessageDigest::sha256(),
        Algorithm::Rs384 => MessageDigest::sha384(),
        Algorithm::Rs512 => MessageDigest::sha512(),
        other => panic!("not an RSA algorithm: {other:?}"),
    };
    let pkey = PKey::from_rsa(private.clone()).unwrap();
    let mut signer = Signer::new(digest, &pkey).unwrap();
    signer.update(data).unwrap();
    signer.sign_to_vec().unwrap()
}

fn ecdsa_digest(algorithm: Algorithm, data: &[u8]) -> Vec<u8> {
    let digest = match algorithm {
        Algorithm::Es256 => MessageDigest::sha256(),
        Algorithm::Es384 => MessageDigest::sha384(),
        Algorithm::Es512 => MessageDigest::sha512(),
        other => panic!("not an ECDSA algorithm: {other:?}"),
    };
    hash(digest, data).unwrap().to_vec()
}

fn field_width(algorithm: Algorithm) -> usize {
    match algorithm {
        Algorithm::Es256 => 32,
        Algorithm::Es384 => 48,
        Algorithm::Es512 => 66,
        other => panic!("not an ECDSA algorithm: {other:?}"),
    }
}

/// Sign with ECDSA and return the fixed-width r||s encoding JWS requires.
pub fn sign_ecdsa_p1363(private: &EcKey<Private>, algorithm: Algorithm, data: &[u8]) -> Vec<u8> {
    let digest = ecdsa_digest(algorithm, data);
    let sig = EcdsaSig::sign(&digest, private).unwrap();
    let width = field_width(algorithm);

    let mut out = vec![0u8; width * 2];
    let r_bytes = sig.r().to_vec();
    let s_bytes = sig.s().to_vec();
    out[width - r_bytes.len()..width].copy_from_slice(&r_bytes);
    out[2 * width - s_bytes.len()..2 * width].copy_from_slice(&s_bytes);
    out
}

/// Sign with ECDSA and return the DER encoding, used only to prove the
/// verifier rejects it.
pub fn sign_ecdsa_der(private: &EcKey<Private>, algorithm: Algorithm, data: &[u8]) -> Vec<u8> {
    let digest = ecdsa_digest(algorithm, data);
    let sig = EcdsaSig::sign(&digest, private).unwrap();
    sig.to_der().unwrap()
}

pub fn sign_eddsa(private: &PKey<Private>, data: &[u8]) -> Vec<u8> {
    let mut signer = Signer::new_without_digest(private).unwrap();
    signer.sign_oneshot_to_vec(data).unwrap()
}

/// Build a compact JWS string from header/payload JSON values, signing with
/// the supplied closure over `header_b64.payload_b64`.
pub fn sign_compact(header: &Value, payload: &Value, sign: impl FnOnce(&[u8]) -> Vec<u8>) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap());
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = sign(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);
    format!("{signing_input}.{signature_b64}")
}

/// A minimal EC public key PEM (SPKI), used to exercise the ALB PEM→JWK
/// conversion without a real ALB endpoint.
pub fn ec_public_key_pem(ec_key: &EcKey<Private>) -> String {
    let public_only = EcKey::from_public_key(&ec_key.group(), ec_key.public_key()).unwrap();
    let pkey = PKey::from_ec_key(public_only).unwrap();
    String::from_utf8(pkey.public_key_to_pem().unwrap()).unwrap()
}

pub fn header_with(alg: &str, kid: &str) -> Value {
    json!({"alg": alg, "kid": kid, "typ": "JWT"})
}
