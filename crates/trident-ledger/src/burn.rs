use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use trident_core::config::FinalityConfig;
use trident_core::types::{Address, BlockHeight};

use crate::error::LedgerError;

/// Lifecycle of a burn claim as BTC confirmations accrue.
///
/// Status only moves forward: detected → pending → final → minted. A
/// claim that reached `Final` stays final even if the observed BTC tip
/// later reports fewer confirmations, and `Minted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BurnStatus {
    /// Claim submitted, below the confirmation depth.
    Detected,
    /// Past the confirmation depth, below the finality depth.
    Pending,
    /// Past the finality depth; eligible for exactly one mint.
    Final,
    /// The one mint this claim is worth has been taken.
    Minted,
}

impl fmt::Display for BurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Detected => "detected",
            Self::Pending => "pending",
            Self::Final => "final",
            Self::Minted => "minted",
        };
        write!(f, "{s}")
    }
}

/// One burn claim tracked by the pipeline, keyed by BTC txid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnRecord {
    /// Txid of the burning BTC transaction.
    pub btc_txid: String,
    /// BTC block height the burn confirmed at.
    pub btc_height: BlockHeight,
    /// Account credited when the burn mints.
    pub dest: Address,
    /// Provably destroyed amount in satoshis.
    pub burned_sats: u64,
    /// Current lifecycle status.
    pub status: BurnStatus,
}

/// Permission to mint, handed out once per finalized burn.
#[derive(Debug, Clone)]
pub struct MintAuthorization {
    pub btc_txid: String,
    pub dest: Address,
    pub sats: u64,
}

/// Tracks burn claims from submission to the one mint each is worth.
///
/// The pipeline is the issuance side of the consensus audit: the sum of
/// its finalized burns is what the ledger's total M0 must equal. It
/// never touches balances itself; the block-connect layer exchanges
/// [`MintAuthorization`]s for actual mints. Mint eligibility is read
/// from the one status field and flipped in the one [`BurnPipeline::mint`]
/// transition, so no second code path can conclude a claim is mintable.
#[derive(Debug, Clone)]
pub struct BurnPipeline {
    records: HashMap<String, BurnRecord>,
    confirm_depth: u64,
    final_depth: u64,
}

impl BurnPipeline {
    pub fn new(config: &FinalityConfig) -> Self {
        Self {
            records: HashMap::new(),
            confirm_depth: config.confirm_depth,
            final_depth: config.final_depth,
        }
    }

    /// Register a burn claim. One claim per BTC txid, ever; resubmission
    /// is rejected regardless of the payload or the claim's progress.
    pub fn submit(
        &mut self,
        btc_txid: &str,
        btc_height: BlockHeight,
        dest: Address,
        burned_sats: u64,
    ) -> Result<(), LedgerError> {
        if btc_txid.is_empty() {
            return Err(LedgerError::MalformedBurnClaim("empty btc txid".into()));
        }
        if burned_sats == 0 {
            return Err(LedgerError::MalformedBurnClaim("zero burn amount".into()));
        }
        if self.records.contains_key(btc_txid) {
            return Err(LedgerError::DuplicateBurnClaim(btc_txid.to_string()));
        }

        self.records.insert(
            btc_txid.to_string(),
            BurnRecord {
                btc_txid: btc_txid.to_string(),
                btc_height,
                dest: dest.clone(),
                burned_sats,
                status: BurnStatus::Detected,
            },
        );
        tracing::info!(btc_txid, btc_height, dest = %dest, burned_sats, "burn claim submitted");
        Ok(())
    }

    /// Promote claim statuses against the observed BTC tip. Statuses
    /// never regress; a stale or reorged tip promotes nothing, and
    /// minted claims are left alone.
    pub fn advance(&mut self, btc_tip: BlockHeight) {
        for record in self.records.values_mut() {
            let confirmations = btc_tip
                .checked_sub(record.btc_height)
                .map(|d| d + 1)
                .unwrap_or(0);
            let target = if confirmations >= self.final_depth {
                BurnStatus::Final
            } else if confirmations >= self.confirm_depth {
                BurnStatus::Pending
            } else {
                BurnStatus::Detected
            };
            if target > record.status {
                tracing::info!(
                    btc_txid = %record.btc_txid,
                    from = %record.status,
                    to = %target,
                    confirmations,
                    "burn claim advanced"
                );
                record.status = target;
            }
        }
    }

    /// Finalized claims whose mint has not been taken yet.
    pub fn mintable(&self) -> Vec<String> {
        let mut txids: Vec<String> = self
            .records
            .values()
            .filter(|r| r.status == BurnStatus::Final)
            .map(|r| r.btc_txid.clone())
            .collect();
        // Deterministic mint order across nodes.
        txids.sort();
        txids
    }

    /// Take the one mint a finalized claim is worth. The status flips
    /// to minted here and nowhere else, so a second call can only fail.
    pub fn mint(&mut self, btc_txid: &str) -> Result<MintAuthorization, LedgerError> {
        let record = self
            .records
            .get_mut(btc_txid)
            .ok_or_else(|| LedgerError::BurnClaimNotFound(btc_txid.to_string()))?;
        match record.status {
            BurnStatus::Minted => return Err(LedgerError::AlreadyMinted(btc_txid.to_string())),
            BurnStatus::Detected | BurnStatus::Pending => {
                return Err(LedgerError::NotMintable {
                    txid: btc_txid.to_string(),
                    status: record.status,
                })
            }
            BurnStatus::Final => {}
        }
        record.status = BurnStatus::Minted;
        tracing::info!(btc_txid, sats = record.burned_sats, "burn claim minted");
        Ok(MintAuthorization {
            btc_txid: record.btc_txid.clone(),
            dest: record.dest.clone(),
            sats: record.burned_sats,
        })
    }

    /// Total satoshis across claims at or past finality. This is the
    /// issuance ceiling the ledger's total M0 is audited against.
    pub fn finalized_burn_total(&self) -> u64 {
        self.records
            .values()
            .filter(|r| r.status >= BurnStatus::Final)
            .map(|r| r.burned_sats)
            .sum()
    }

    /// Look up one claim.
    pub fn record(&self, btc_txid: &str) -> Option<&BurnRecord> {
        self.records.get(btc_txid)
    }

    /// Number of claims ever submitted.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}
