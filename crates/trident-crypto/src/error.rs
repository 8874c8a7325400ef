/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("hashlock already bound to another swap: {0}")]
    HashlockReused(String),

    #[error("invalid digest length: expected 32, got {0}")]
    InvalidDigestLength(usize),

    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}
