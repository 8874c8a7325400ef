use crate::state_machine::{PhaseEvent, SwapPhase};

/// Coarse classes of failure shared by the ledger and the chain
/// adapters. Drives retry policy: only Transport failures are safe to
/// retry, everything else is a protocol verdict that will not change
/// on a second attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any state change.
    Validation,
    /// The operation conflicts with settled state; no side effect.
    StateConflict,
    /// A secret or inclusion proof failed verification.
    ProofInvalid,
    /// Too early or too late relative to a timelock.
    Timing,
    /// A monetary invariant does not hold. Fatal until reconciled.
    ConsensusViolation,
    /// The chain could not be reached; retry with backoff.
    Transport,
}

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid swap phase transition from {from} on {event}")]
    InvalidPhaseTransition { from: SwapPhase, event: PhaseEvent },

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}
