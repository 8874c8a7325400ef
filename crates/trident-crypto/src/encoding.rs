//! Canonical on-chain encoding of hashlocks.
//!
//! Every chain encoder (BTC script, M1 ledger transaction, EVM id
//! preimage) must embed hashlocks through these functions. The contract
//! is: raw 32-byte SHA-256 digest, digest byte order, no per-chain
//! reversal, and the triple always laid out (user, lp1, lp2). A chain
//! that flips the byte order fails only at claim time, on-chain, so the
//! single codec is enforced here rather than re-derived per adapter.

use crate::secrets::{Hashlock, HashlockTriple};

/// The canonical on-chain bytes of one hashlock.
pub fn hashlock_bytes(hashlock: &Hashlock) -> [u8; 32] {
    *hashlock.as_bytes()
}

/// The canonical concatenation of a swap's three hashlocks:
/// `H_user ‖ H_lp1 ‖ H_lp2`, 96 bytes.
pub fn triple_bytes(triple: &HashlockTriple) -> [u8; 96] {
    let mut out = [0u8; 96];
    out[..32].copy_from_slice(triple.user.as_bytes());
    out[32..64].copy_from_slice(triple.lp1.as_bytes());
    out[64..].copy_from_slice(triple.lp2.as_bytes());
    out
}
