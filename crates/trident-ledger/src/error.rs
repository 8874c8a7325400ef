use trident_core::error::ErrorKind;
use trident_core::types::{Address, BlockHeight, UnixSeconds};

use crate::burn::BurnStatus;
use crate::types::Outpoint;

/// Settlement ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("zero hashlock rejected")]
    ZeroHashlock,

    #[error("timelock {timelock} is not in the future (chain time {now})")]
    TimelockNotFuture {
        timelock: UnixSeconds,
        now: UnixSeconds,
    },

    #[error("malformed burn claim: {0}")]
    MalformedBurnClaim(String),

    #[error("insufficient balance for {address}: available {available}, required {required}")]
    InsufficientBalance {
        address: Address,
        available: u64,
        required: u64,
    },

    #[error("receipt not found: {0}")]
    ReceiptNotFound(Outpoint),

    #[error("receipt already exists: {0}")]
    ReceiptExists(Outpoint),

    #[error("receipt {0} is not HTLC-locked")]
    ReceiptNotLocked(Outpoint),

    #[error("receipt {0} is already HTLC-locked")]
    ReceiptAlreadyLocked(Outpoint),

    #[error("receipt {0} exceeded the fee-exempt settlement ops allowed per block")]
    SettlementRateLimited(Outpoint),

    #[error("receipt {0} value does not cover the unlock fee")]
    FeeExceedsValue(Outpoint),

    #[error("duplicate burn claim for btc txid {0}")]
    DuplicateBurnClaim(String),

    #[error("burn claim not found: {0}")]
    BurnClaimNotFound(String),

    #[error("burn claim {txid} is not mintable in status {status}")]
    NotMintable { txid: String, status: BurnStatus },

    #[error("burn claim {0} already minted")]
    AlreadyMinted(String),

    #[error("ledger halted pending reconciliation")]
    Halted,

    #[error("preimage mismatch for receipt {0}")]
    PreimageMismatch(Outpoint),

    #[error("htlc on receipt {0} has expired")]
    HtlcExpired(Outpoint),

    #[error("htlc on receipt {0} has not expired yet")]
    HtlcNotExpired(Outpoint),

    #[error("consensus invariant violated at height {height}: {invariant} (expected {expected}, actual {actual})")]
    ConsensusInvariantViolation {
        invariant: &'static str,
        height: BlockHeight,
        expected: u64,
        actual: u64,
    },

    #[error("arithmetic overflow in ledger accounting")]
    Overflow,
}

impl LedgerError {
    /// The coarse failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NonPositiveAmount
            | Self::ZeroHashlock
            | Self::TimelockNotFuture { .. }
            | Self::MalformedBurnClaim(_)
            | Self::FeeExceedsValue(_)
            | Self::Overflow => ErrorKind::Validation,

            Self::InsufficientBalance { .. }
            | Self::ReceiptNotFound(_)
            | Self::ReceiptExists(_)
            | Self::ReceiptNotLocked(_)
            | Self::ReceiptAlreadyLocked(_)
            | Self::SettlementRateLimited(_)
            | Self::DuplicateBurnClaim(_)
            | Self::BurnClaimNotFound(_)
            | Self::NotMintable { .. }
            | Self::AlreadyMinted(_)
            | Self::Halted => ErrorKind::StateConflict,

            Self::PreimageMismatch(_) => ErrorKind::ProofInvalid,

            Self::HtlcExpired(_) | Self::HtlcNotExpired(_) => ErrorKind::Timing,

            Self::ConsensusInvariantViolation { .. } => ErrorKind::ConsensusViolation,
        }
    }
}
