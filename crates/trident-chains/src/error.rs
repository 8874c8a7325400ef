use trident_core::error::ErrorKind;
use trident_core::types::{ChainId, LegId, UnixSeconds};
use trident_ledger::LedgerError;

use crate::types::LegStatus;

/// Chain adapter errors, shared by all three rails.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("zero hashlock rejected")]
    ZeroHashlock,

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("timelock {timelock} is not in the future (chain time {now})")]
    TimelockNotFuture {
        timelock: UnixSeconds,
        now: UnixSeconds,
    },

    #[error("htlc id collision: {0}")]
    IdCollision(String),

    #[error("no adapter registered for chain {0}")]
    AdapterNotRegistered(ChainId),

    #[error("leg not found: {0}")]
    LegNotFound(LegId),

    #[error("leg {leg} already settled as {status}")]
    AlreadySettled { leg: LegId, status: LegStatus },

    #[error("invalid leg state transition: {0}")]
    InvalidLegState(String),

    #[error("leg {0} is not funded")]
    NotFunded(LegId),

    #[error("secret for {role} does not match its hashlock on leg {leg}")]
    PreimageMismatch { leg: LegId, role: &'static str },

    #[error("claim window for leg {0} has closed")]
    TimelockExpired(LegId),

    #[error("refund for leg {0} is locked until its timelock passes")]
    TimelockNotExpired(LegId),

    #[error("leg {0} has no revealed secrets yet")]
    NothingRevealed(LegId),

    #[error("malformed claim artifact: {0}")]
    MalformedArtifact(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("transport: {0}")]
    Transport(String),
}

impl ChainError {
    /// The coarse failure class of this error. Only `Transport` is
    /// worth retrying; everything else is a protocol answer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroHashlock | Self::NonPositiveAmount | Self::TimelockNotFuture { .. } => {
                ErrorKind::Validation
            }

            Self::IdCollision(_)
            | Self::AdapterNotRegistered(_)
            | Self::LegNotFound(_)
            | Self::AlreadySettled { .. }
            | Self::InvalidLegState(_)
            | Self::NotFunded(_)
            | Self::NothingRevealed(_) => ErrorKind::StateConflict,

            Self::PreimageMismatch { .. } | Self::MalformedArtifact(_) => ErrorKind::ProofInvalid,

            Self::TimelockExpired(_) | Self::TimelockNotExpired(_) => ErrorKind::Timing,

            Self::Ledger(inner) => inner.kind(),

            Self::Transport(_) => ErrorKind::Transport,
        }
    }
}
