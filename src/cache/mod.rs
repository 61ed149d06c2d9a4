//! JWKS caching: the generic per-issuer cache (§4.4) and the ALB
//! kid-templated variant (§4.5).

pub mod alb;
pub mod generic;

pub use alb::AlbJwksCache;
pub use generic::GenericJwksCache;
