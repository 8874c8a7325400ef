//! Error types for swap planning and orchestration.

use thiserror::Error;

use trident_chains::ChainError;
use trident_core::error::{CoreError, ErrorKind};
use trident_core::types::{LegIndex, SwapId, UnixSeconds};
use trident_crypto::CryptoError;

/// Errors surfaced by the planner and the orchestrator.
#[derive(Debug, Error)]
pub enum SwapError {
    /// Leg timelocks must be strictly increasing in canonical leg order.
    #[error("timelocks must satisfy leg1 < leg2 < leg3, got {leg1}, {leg2}, {leg3}")]
    TimelockOrdering {
        leg1: UnixSeconds,
        leg2: UnixSeconds,
        leg3: UnixSeconds,
    },

    /// A leg was drafted with a zero amount.
    #[error("leg {0} amount must be positive")]
    NonPositiveAmount(LegIndex),

    /// A leg timelock is not in the future at plan time.
    #[error("leg {leg} timelock {timelock} is not after plan time {now}")]
    TimelockNotFuture {
        leg: LegIndex,
        timelock: UnixSeconds,
        now: UnixSeconds,
    },

    /// No swap with this id is tracked by the orchestrator.
    #[error("swap {0} not found")]
    SwapNotFound(SwapId),

    /// A leg the current phase depends on was never opened on its rail.
    #[error("leg {index} of swap {swap} has not been opened")]
    LegNotOpened { swap: SwapId, index: LegIndex },

    #[error(transparent)]
    Phase(#[from] CoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl SwapError {
    /// Coarse classification used by logs and by callers deciding
    /// whether an operation is worth retrying.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TimelockOrdering { .. }
            | Self::NonPositiveAmount(_)
            | Self::TimelockNotFuture { .. } => ErrorKind::Validation,
            Self::SwapNotFound(_) | Self::LegNotOpened { .. } => ErrorKind::StateConflict,
            Self::Phase(_) => ErrorKind::StateConflict,
            Self::Crypto(CryptoError::HashlockReused(_)) => ErrorKind::StateConflict,
            Self::Crypto(_) => ErrorKind::Validation,
            Self::Chain(inner) => inner.kind(),
        }
    }
}
