//! Bearer-token verification

mod verifier;

pub use verifier::{Claims, Identity, TokenVerifier};
