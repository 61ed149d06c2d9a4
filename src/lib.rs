//! Verification of JWTs signed by identity providers that publish a JWKS.
//!
//! This crate decomposes a compact JWS, resolves the signing key from a
//! JWKS document (fetching and caching it as needed, with single-flight
//! coalescing of concurrent fetches and a penalty box around kids that
//! don't resolve), verifies the signature for RSA, ECDSA (fixed-width
//! r||s, not DER) and EdDSA algorithms, and asserts the common registered
//! claims (`iss`, `aud`, `exp`, `nbf`, `scope`) plus an optional custom
//! check.
//!
//! Three verifier compositions are provided for the common shapes this
//! takes in practice:
//!
//! - [`verifier::single::SingleIssuerVerifier`] — one identity provider.
//! - [`verifier::multi::MultiIssuerVerifier`] — several, dispatched by the
//!   token's own `iss` claim.
//! - [`verifier::alb::AlbVerifier`] — AWS Application Load Balancer's
//!   kid-templated PEM endpoint, which has no JWKS document at all.
//!
//! ## Usage example
//!
//! ```no_run
//! use jwks_verify::config::SingleIssuerConfig;
//! use jwks_verify::verifier::single::SingleIssuerVerifier;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SingleIssuerConfig::new("https://issuer.example.com")
//!     .with_audience("my-api");
//! let verifier = SingleIssuerVerifier::create(config);
//!
//! let token = "...";
//! let claims = verifier.verify(token, None).await?;
//! println!("{claims:?}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod fetch;
pub mod jwk;
pub mod jwt;
pub mod key_object_cache;
pub mod verifier;
pub mod verify;

mod json;
mod penalty_box;

#[cfg(test)]
mod testutil;

pub use claims::{ClaimPolicy, CustomCheck};
pub use config::{AlbConfig, Audience, SingleIssuerConfig, VerifyProps};
pub use error::{VerifierError, VerifierResult};
pub use fetch::{ByteFetcher, FetchKind, FetchOptions, HttpFetcher};
pub use jwk::{Jwk, Jwks, KeyType};
pub use jwt::DecomposedJwt;
pub use verifier::{AlbVerifier, MultiIssuerVerifier, SingleIssuerVerifier};
