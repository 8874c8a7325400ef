//! Observer events emitted as a swap progresses.
//!
//! Events are the orchestrator's audit trail: one entry per observed
//! transition, in order. Secrets appear only in `LegClaimed`, after
//! the chain itself has already made them public.

use serde::{Deserialize, Serialize};

use trident_chains::LegRef;
use trident_core::types::{LegIndex, SwapId, TxId, UnixSeconds};
use trident_crypto::SecretTriple;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwapEvent {
    /// A plan passed validation and the swap started tracking.
    PlanCreated {
        swap: SwapId,
        plan_expires_at: UnixSeconds,
    },
    /// A leg contract was created on its rail.
    LegOpened {
        swap: SwapId,
        index: LegIndex,
        leg: LegRef,
    },
    /// A leg's funding was observed on-chain.
    LegFunded {
        swap: SwapId,
        index: LegIndex,
        txid: TxId,
    },
    /// All three legs are funded; claims can begin.
    AllLegsFunded { swap: SwapId },
    /// A leg claim was observed, revealing the secret triple.
    LegClaimed {
        swap: SwapId,
        index: LegIndex,
        txid: TxId,
        revealed: SecretTriple,
    },
    /// Every leg was claimed.
    SwapCompleted { swap: SwapId },
    /// The plan's funding window closed before all legs were funded.
    PlanExpired { swap: SwapId },
    /// A funded leg's timelock passed without a claim.
    LegExpired { swap: SwapId, index: LegIndex },
    /// An expired leg was refunded to its funder.
    LegRefunded {
        swap: SwapId,
        index: LegIndex,
        txid: TxId,
    },
}

impl SwapEvent {
    /// The swap this event belongs to.
    pub fn swap_id(&self) -> SwapId {
        match self {
            Self::PlanCreated { swap, .. }
            | Self::LegOpened { swap, .. }
            | Self::LegFunded { swap, .. }
            | Self::AllLegsFunded { swap }
            | Self::LegClaimed { swap, .. }
            | Self::SwapCompleted { swap }
            | Self::PlanExpired { swap }
            | Self::LegExpired { swap, .. }
            | Self::LegRefunded { swap, .. } => *swap,
        }
    }
}
