use serde::{Deserialize, Serialize};
use std::fmt;

use trident_core::types::{Address, Amount, ChainId, LegId, UnixSeconds};
use trident_crypto::HashlockTriple;

/// Observable lifecycle of one HTLC leg.
///
/// `Pending` means created but not funded; `Active` means value is
/// locked on chain. `Claimed` and `Refunded` are terminal. `Expired`
/// marks an active leg whose timelock has passed: the claim window is
/// closed but the funds still sit in the contract until refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
    Pending,
    Active,
    Claimed,
    Refunded,
    Expired,
}

impl LegStatus {
    /// Whether value can still move out of this leg via a claim.
    pub fn claimable(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the leg has settled for good.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Claimed | Self::Refunded)
    }
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// Everything an adapter needs to create one HTLC leg.
///
/// `claimant` is the party expected to claim; `claim_address` is where
/// claimed value lands and `refund_address` where refunded value
/// returns. On the EVM rail the claim itself is permissionless, which
/// is why the recipient address is fixed here at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegSpec {
    pub chain: ChainId,
    pub funder: Address,
    pub claimant: Address,
    pub amount: Amount,
    pub hashlocks: HashlockTriple,
    /// Absolute expiry in seconds since the Unix epoch.
    pub timelock: UnixSeconds,
    pub claim_address: Address,
    pub refund_address: Address,
}

/// Handle to a created leg.
///
/// `chain_ref` is the rail-native identifier: the P2WSH address on
/// BTC, the receipt outpoint on M1, the hex htlc id on EVM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegRef {
    pub chain: ChainId,
    pub id: LegId,
    pub chain_ref: String,
}

impl fmt::Display for LegRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.id)
    }
}
