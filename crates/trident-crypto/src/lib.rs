//! Trident Crypto
//!
//! Secrets, hashlocks and the canonical hashlock encoding shared by
//! every settlement rail. Chain-agnostic on purpose: the same 32-byte
//! digests lock all three legs of a swap.

pub mod encoding;
pub mod error;
pub mod hashing;
pub mod secrets;

pub use encoding::{hashlock_bytes, triple_bytes};
pub use error::CryptoError;
pub use hashing::{keccak256, sha256, Digest32};
pub use secrets::{Hashlock, HashlockTriple, Secret, SecretManager, SecretTriple};
