use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use trident_core::types::{Address, BlockHeight, UnixSeconds};
use trident_crypto::{HashlockTriple, SecretTriple};

/// Identifier of one M1 receipt.
///
/// Chosen by the submitter, not the ledger, so a Lock and a follow-up
/// HTLC create can reference the same receipt before either has been
/// applied in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint(pub Uuid);

impl Outpoint {
    /// Create a new random outpoint (UUID v7, time-ordered).
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

impl Default for Outpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HTLC extension attached to a receipt by HTLC_CREATE_3S.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptHtlc {
    /// The three hashlocks in canonical order (user, lp1, lp2).
    pub hashlocks: HashlockTriple,
    /// Absolute expiry in seconds since the Unix epoch.
    pub timelock: UnixSeconds,
    /// Receipt owner after a successful claim.
    pub claim_to: Address,
    /// Receipt owner after a post-expiry refund.
    pub refund_to: Address,
}

/// One unit of M1: a locked receipt redeemable 1:1 for M0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Receipt identifier.
    pub outpoint: Outpoint,
    /// Face value in base units.
    pub amount: u64,
    /// Current owner.
    pub owner: Address,
    /// Whether the receipt can be unlocked back to M0. False while an
    /// HTLC extension holds it.
    pub unlockable: bool,
    /// Optional HTLC extension.
    pub htlc: Option<ReceiptHtlc>,
}

/// Settlement ledger transaction types. Applied only at block connect,
/// in submission order, through the ledger's single apply path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LedgerTx {
    /// Plain M0 transfer. Pays the standard fee on top of `amount`.
    Transfer {
        from: Address,
        to: Address,
        amount: u64,
    },
    /// Destroy M0 and mint one unlockable M1 receipt of equal amount.
    /// The fee is paid from M0 on top of the locked amount.
    Lock {
        owner: Address,
        amount: u64,
        outpoint: Outpoint,
    },
    /// Destroy an unlockable receipt and credit its amount minus the
    /// fee back to the owner as M0.
    Unlock { outpoint: Outpoint },
    /// Lock a receipt behind three hashlocks. Fee-exempt settlement op:
    /// it moves no value, it only constrains a receipt.
    HtlcCreate3s {
        outpoint: Outpoint,
        hashlocks: HashlockTriple,
        timelock: UnixSeconds,
        claim_to: Address,
        refund_to: Address,
    },
    /// Consume an HTLC-locked receipt by revealing all three preimages;
    /// mints a fresh unlockable receipt to the claim address. The
    /// preimages ride in the transaction itself and are readable by any
    /// observer once the block connects. Fee-exempt.
    HtlcClaim3s {
        outpoint: Outpoint,
        new_outpoint: Outpoint,
        secrets: SecretTriple,
    },
    /// Return an expired HTLC-locked receipt to its refund address as a
    /// fresh unlockable receipt. Fee-exempt.
    HtlcRefund3s {
        outpoint: Outpoint,
        new_outpoint: Outpoint,
    },
    /// Proof that `burned_sats` were provably destroyed on the BTC
    /// chain at `btc_height`, crediting `dest` once the claim reaches
    /// finality.
    BurnClaim {
        btc_txid: String,
        btc_height: BlockHeight,
        dest: Address,
        burned_sats: u64,
    },
    /// Explicitly mint M0 for a burn claim that reached finality.
    /// Normally the finality sweep mints on its own; this path exists
    /// for re-driving a mint after a reconciled halt.
    MintM0Btc { btc_txid: String },
}

impl LedgerTx {
    /// Whether this is a fee-exempt settlement operation.
    pub fn is_settlement_op(&self) -> bool {
        matches!(
            self,
            Self::HtlcCreate3s { .. } | Self::HtlcClaim3s { .. } | Self::HtlcRefund3s { .. }
        )
    }

    /// Receipts touched by a settlement op, consumed and created alike.
    /// Used by the per-receipt-per-block rate limit on fee-exempt ops.
    pub fn touched_outpoints(&self) -> Vec<Outpoint> {
        match self {
            Self::HtlcCreate3s { outpoint, .. } => vec![*outpoint],
            Self::HtlcClaim3s {
                outpoint,
                new_outpoint,
                ..
            }
            | Self::HtlcRefund3s {
                outpoint,
                new_outpoint,
            } => vec![*outpoint, *new_outpoint],
            _ => Vec::new(),
        }
    }

    /// Short tag for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Lock { .. } => "lock",
            Self::Unlock { .. } => "unlock",
            Self::HtlcCreate3s { .. } => "htlc_create_3s",
            Self::HtlcClaim3s { .. } => "htlc_claim_3s",
            Self::HtlcRefund3s { .. } => "htlc_refund_3s",
            Self::BurnClaim { .. } => "burn_claim",
            Self::MintM0Btc { .. } => "mint_m0btc",
        }
    }
}

/// Result of one transaction inside a connected block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutcome {
    /// Applied and now part of ledger state.
    Applied,
    /// Rejected at apply time; ledger state untouched by this tx.
    Rejected(String),
}

impl TxOutcome {
    /// Whether the transaction was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}
