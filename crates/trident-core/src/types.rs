use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// Absolute time in seconds since the Unix epoch. All timelocks and
/// expiries are expressed in this unit on every chain.
pub type UnixSeconds = u64;

/// Block height on any of the three chains.
pub type BlockHeight = u64;

/// The three chains a swap spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainId {
    /// Bitcoin-style UTXO chain.
    Btc,
    /// The settlement ledger carrying the M0/M1 money supply.
    M1,
    /// EVM-compatible chain.
    Evm,
}

impl ChainId {
    /// Short lowercase code used in logs and serialized forms.
    pub fn code(&self) -> &str {
        match self {
            Self::Btc => "btc",
            Self::M1 => "m1",
            Self::Evm => "evm",
        }
    }

    /// Parse from a short code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "btc" => Some(Self::Btc),
            "m1" => Some(Self::M1),
            "evm" => Some(Self::Evm),
            _ => None,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Assets that can sit on one leg of a swap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// Native bitcoin, denominated in satoshis.
    Btc,
    /// Liquid base money on the settlement ledger.
    M0,
    /// Locked-receipt money on the settlement ledger.
    M1,
    /// ERC-20 token identified by its contract address.
    Erc20(String),
}

impl Asset {
    /// Display code for logs.
    pub fn code(&self) -> &str {
        match self {
            Self::Btc => "BTC",
            Self::M0 => "M0",
            Self::M1 => "M1",
            Self::Erc20(addr) => addr,
        }
    }

    /// The chain this asset natively lives on.
    pub fn chain(&self) -> ChainId {
        match self {
            Self::Btc => ChainId::Btc,
            Self::M0 | Self::M1 => ChainId::M1,
            Self::Erc20(_) => ChainId::Evm,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Value in atomic units (satoshis, ledger base units, token base units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Value in the smallest unit of the asset.
    pub value: u64,
    /// The asset of this amount.
    pub asset: Asset,
}

impl Amount {
    /// Create a new amount.
    pub fn new(value: u64, asset: Asset) -> Self {
        Self { value, asset }
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.asset)
    }
}

/// Chain-scoped account or destination address, kept opaque here.
/// Wallet-side derivation and checksum rules live outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create a new address from its string form.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction reference on any chain (hex txid, ledger tx hash, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
    /// Create a new transaction id from its string form.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapId(pub Uuid);

impl SwapId {
    /// Create a new random swap ID (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SwapId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one leg of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegId(pub Uuid);

impl LegId {
    /// Create a new random leg ID (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LegId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a leg inside a swap. Legs are always created, funded and
/// claimed in this order; the same order carries the timelock ordering
/// `timelock(leg1) < timelock(leg2) < timelock(leg3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LegIndex {
    Leg1,
    Leg2,
    Leg3,
}

impl LegIndex {
    /// All leg positions in canonical order.
    pub const ALL: [LegIndex; 3] = [Self::Leg1, Self::Leg2, Self::Leg3];

    /// 1-based position of this leg.
    pub fn position(&self) -> u8 {
        match self {
            Self::Leg1 => 1,
            Self::Leg2 => 2,
            Self::Leg3 => 3,
        }
    }

    /// Parse from a 1-based position.
    pub fn from_position(position: u8) -> Result<Self, CoreError> {
        match position {
            1 => Ok(Self::Leg1),
            2 => Ok(Self::Leg2),
            3 => Ok(Self::Leg3),
            other => Err(CoreError::ValidationError(format!(
                "invalid leg position: {}",
                other
            ))),
        }
    }

    /// The leg after this one, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Leg1 => Some(Self::Leg2),
            Self::Leg2 => Some(Self::Leg3),
            Self::Leg3 => None,
        }
    }
}

impl fmt::Display for LegIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leg{}", self.position())
    }
}
