use std::fmt;

use crate::error::CoreError;
use crate::types::LegIndex;

/// The phases of a three-leg atomic swap.
///
/// Legs are committed strictly in order, so the phase always names the
/// leg currently in flight. Once all three legs are funded the swap can
/// no longer abort; it can only move forward through the claim chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwapPhase {
    /// Plan agreed, secrets generated, nothing on any chain yet.
    Init,
    /// The named leg exists on-chain and is waiting for its funder.
    AwaitingFund(LegIndex),
    /// The named leg is funded; the next leg has not been opened yet.
    Funded(LegIndex),
    /// All three legs are funded. The swap is now committed.
    AllFunded,
    /// Legs up to and including the named one have been claimed.
    Claimed(LegIndex),
    /// All three legs claimed; the swap is final.
    Completed,
    /// The plan expired before all legs were funded. Any already-funded
    /// leg is refundable after its own timelock. Final state.
    ExpiredAborted,
}

impl SwapPhase {
    /// Whether this is a final (terminal) phase.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::ExpiredAborted)
    }

    /// Whether the swap may still expire-abort. True strictly before
    /// AllFunded; afterwards the only exits are the claim chain or
    /// per-leg refunds after their timelocks.
    pub fn is_abortable(&self) -> bool {
        matches!(self, Self::Init | Self::AwaitingFund(_) | Self::Funded(_))
    }
}

impl fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::AwaitingFund(leg) => write!(f, "AwaitingFund({})", leg),
            Self::Funded(leg) => write!(f, "Funded({})", leg),
            Self::AllFunded => write!(f, "AllFunded"),
            Self::Claimed(leg) => write!(f, "Claimed({})", leg),
            Self::Completed => write!(f, "Completed"),
            Self::ExpiredAborted => write!(f, "ExpiredAborted"),
        }
    }
}

/// Observed events that drive phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The named leg was created on its chain.
    LegOpened(LegIndex),
    /// The named leg's funding transaction was observed.
    LegFunded(LegIndex),
    /// The named leg's claim transaction was observed.
    LegClaimed(LegIndex),
    /// All claims confirmed; the swap is done.
    Completed,
    /// `plan_expires_at` passed before all legs were funded.
    PlanExpired,
}

impl fmt::Display for PhaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LegOpened(leg) => write!(f, "LegOpened({})", leg),
            Self::LegFunded(leg) => write!(f, "LegFunded({})", leg),
            Self::LegClaimed(leg) => write!(f, "LegClaimed({})", leg),
            Self::Completed => write!(f, "Completed"),
            Self::PlanExpired => write!(f, "PlanExpired"),
        }
    }
}

/// Manages swap phase transitions.
///
/// Valid transitions:
/// - Init → AwaitingFund(leg1) (LegOpened(leg1))
/// - AwaitingFund(leg1|leg2) → Funded(same leg) (LegFunded)
/// - AwaitingFund(leg3) → AllFunded (LegFunded(leg3))
/// - Funded(leg1|leg2) → AwaitingFund(next leg) (LegOpened(next leg))
/// - AllFunded → Claimed(leg1) (LegClaimed(leg1))
/// - Claimed(leg1|leg2) → Claimed(next leg) (LegClaimed(next leg))
/// - Claimed(leg3) → Completed (Completed)
/// - Init | AwaitingFund(_) | Funded(_) → ExpiredAborted (PlanExpired)
pub struct SwapStateMachine;

impl SwapStateMachine {
    /// Attempt a phase transition based on an event.
    /// Returns the new phase on success, or an error for invalid transitions.
    pub fn transition(current: SwapPhase, event: PhaseEvent) -> Result<SwapPhase, CoreError> {
        let new_phase = match (current, event) {
            // Opening legs, strictly in order
            (SwapPhase::Init, PhaseEvent::LegOpened(LegIndex::Leg1)) => {
                SwapPhase::AwaitingFund(LegIndex::Leg1)
            }
            (SwapPhase::Funded(done), PhaseEvent::LegOpened(next))
                if done.next() == Some(next) =>
            {
                SwapPhase::AwaitingFund(next)
            }

            // Funding; the third leg completes the commitment
            (SwapPhase::AwaitingFund(LegIndex::Leg3), PhaseEvent::LegFunded(LegIndex::Leg3)) => {
                SwapPhase::AllFunded
            }
            (SwapPhase::AwaitingFund(open), PhaseEvent::LegFunded(funded)) if open == funded => {
                SwapPhase::Funded(open)
            }

            // Claim chain: leg1 first, then downstream in order
            (SwapPhase::AllFunded, PhaseEvent::LegClaimed(LegIndex::Leg1)) => {
                SwapPhase::Claimed(LegIndex::Leg1)
            }
            (SwapPhase::Claimed(done), PhaseEvent::LegClaimed(next))
                if done.next() == Some(next) =>
            {
                SwapPhase::Claimed(next)
            }
            (SwapPhase::Claimed(LegIndex::Leg3), PhaseEvent::Completed) => SwapPhase::Completed,

            // Plan expiry, only while the swap is still abortable
            (phase, PhaseEvent::PlanExpired) if phase.is_abortable() => SwapPhase::ExpiredAborted,

            // All other transitions are invalid
            _ => {
                return Err(CoreError::InvalidPhaseTransition {
                    from: current,
                    event,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_phase,
            event = %event,
            "swap phase transition"
        );

        Ok(new_phase)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: SwapPhase, event: PhaseEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
