use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// 32-byte digest.
pub type Digest32 = [u8; 32];

/// SHA-256, the hashlock digest function on all three chains.
pub fn sha256(data: &[u8]) -> Digest32 {
    Sha256::digest(data).into()
}

/// Keccak-256, used for EVM-side contract identifiers.
pub fn keccak256(data: &[u8]) -> Digest32 {
    Keccak256::digest(data).into()
}
