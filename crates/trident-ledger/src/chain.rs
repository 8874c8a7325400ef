//! In-process M1 chain: mempool, block connect, burn sweep, audit.

use std::collections::HashMap;
use std::sync::RwLock;

use trident_core::config::TridentConfig;
use trident_core::types::{Address, BlockHeight, TxId, UnixSeconds};
use trident_crypto::SecretTriple;
use uuid::Uuid;

use crate::burn::{BurnPipeline, BurnRecord, BurnStatus};
use crate::error::LedgerError;
use crate::invariants::{InvariantChecker, LedgerAudit};
use crate::ledger::SettlementLedger;
use crate::types::{LedgerTx, Outpoint, Receipt, TxOutcome};

/// A claim that connected, with the three preimages it revealed.
///
/// Preimages in a claim are public the moment the block connects; the
/// chain keeps them in an append-only log so any watcher can pick them
/// up and reuse them on the other legs.
#[derive(Debug, Clone)]
pub struct ClaimRecord {
    pub outpoint: Outpoint,
    pub new_outpoint: Outpoint,
    pub secrets: SecretTriple,
    pub height: BlockHeight,
}

/// What one connected block did.
#[derive(Debug, Clone)]
pub struct BlockSummary {
    pub height: BlockHeight,
    pub outcomes: Vec<(TxId, TxOutcome)>,
    pub minted_sats: u64,
    pub halted: bool,
}

impl BlockSummary {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_applied()).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.applied()
    }
}

struct ChainState {
    ledger: SettlementLedger,
    /// Committed ledger plus the admitted mempool, so chained
    /// operations (Lock then HTLC create on the same receipt) admit
    /// within one block. Rebuilt from the committed ledger at every
    /// connect.
    speculative: SettlementLedger,
    pipeline: BurnPipeline,
    mempool: Vec<(TxId, LedgerTx)>,
    outcomes: HashMap<TxId, TxOutcome>,
    claim_log: Vec<ClaimRecord>,
    height: BlockHeight,
    time: UnixSeconds,
    btc_tip: BlockHeight,
}

/// The M1 settlement chain.
///
/// Submission admits transactions against the speculative mempool view;
/// connect is the single sequential writer that applies the mempool in
/// order, sweeps finalized burns into mints, and audits the monetary
/// invariants. Admission is best-effort only: an admitted transaction
/// can still fail at connect (the clock moved, a burn claim raced) and
/// is then recorded as rejected, leaving committed state untouched.
///
/// Chain time starts at zero and moves only through
/// [`M1Chain::advance_time`], so timelock behavior is deterministic
/// under test.
pub struct M1Chain {
    state: RwLock<ChainState>,
}

impl M1Chain {
    pub fn new(config: &TridentConfig) -> Self {
        let ledger = SettlementLedger::new(&config.ledger);
        Self {
            state: RwLock::new(ChainState {
                speculative: ledger.clone(),
                ledger,
                pipeline: BurnPipeline::new(&config.finality),
                mempool: Vec::new(),
                outcomes: HashMap::new(),
                claim_log: Vec::new(),
                height: 0,
                time: 0,
                btc_tip: 0,
            }),
        }
    }

    /// Admit a transaction into the mempool. Ledger transactions are
    /// validated against the speculative view so they can chain within
    /// a block; burn transactions are checked against the committed
    /// pipeline. Connect-time re-validation is authoritative.
    pub fn submit(&self, tx: LedgerTx) -> Result<TxId, LedgerError> {
        let mut state = self.state.write().unwrap();
        let next_height = state.height + 1;
        let now = state.time;
        match &tx {
            LedgerTx::BurnClaim {
                btc_txid,
                burned_sats,
                ..
            } => Self::admit_burn_claim(&state.pipeline, btc_txid, *burned_sats)?,
            LedgerTx::MintM0Btc { btc_txid } => {
                Self::admit_mint(&state.ledger, &state.pipeline, btc_txid)?
            }
            other => state.speculative.apply_tx(other, next_height, now)?,
        }

        let txid = TxId::new(format!("m1-{}", Uuid::now_v7()));
        tracing::debug!(txid = %txid, tag = tx.tag(), "transaction admitted to mempool");
        state.mempool.push((txid.clone(), tx));
        Ok(txid)
    }

    fn admit_burn_claim(
        pipeline: &BurnPipeline,
        btc_txid: &str,
        burned_sats: u64,
    ) -> Result<(), LedgerError> {
        if btc_txid.is_empty() {
            return Err(LedgerError::MalformedBurnClaim("empty btc txid".into()));
        }
        if burned_sats == 0 {
            return Err(LedgerError::MalformedBurnClaim("zero burn amount".into()));
        }
        if pipeline.record(btc_txid).is_some() {
            return Err(LedgerError::DuplicateBurnClaim(btc_txid.to_string()));
        }
        Ok(())
    }

    fn admit_mint(
        ledger: &SettlementLedger,
        pipeline: &BurnPipeline,
        btc_txid: &str,
    ) -> Result<(), LedgerError> {
        if ledger.is_halted() {
            return Err(LedgerError::Halted);
        }
        let record = pipeline
            .record(btc_txid)
            .ok_or_else(|| LedgerError::BurnClaimNotFound(btc_txid.to_string()))?;
        if record.status == BurnStatus::Minted {
            return Err(LedgerError::AlreadyMinted(btc_txid.to_string()));
        }
        Ok(())
    }

    /// Connect the next block: apply the mempool in submission order,
    /// advance burn claims against the observed BTC tip, mint for
    /// newly finalized burns, then audit.
    ///
    /// An invariant violation halts issuance (Lock and mint) from the
    /// next operation onward; already-applied transactions stand.
    pub fn connect_block(&self) -> Result<BlockSummary, LedgerError> {
        let mut state = self.state.write().unwrap();
        state.height += 1;
        let height = state.height;
        let now = state.time;

        let mempool = std::mem::take(&mut state.mempool);
        let mut outcomes = Vec::with_capacity(mempool.len());
        for (txid, tx) in mempool {
            let result = match &tx {
                LedgerTx::BurnClaim {
                    btc_txid,
                    btc_height,
                    dest,
                    burned_sats,
                } => state
                    .pipeline
                    .submit(btc_txid, *btc_height, dest.clone(), *burned_sats),
                LedgerTx::MintM0Btc { btc_txid } => {
                    Self::apply_explicit_mint(&mut state, btc_txid)
                }
                other => state.ledger.apply_tx(other, height, now),
            };

            let outcome = match result {
                Ok(()) => {
                    if let LedgerTx::HtlcClaim3s {
                        outpoint,
                        new_outpoint,
                        secrets,
                    } = &tx
                    {
                        state.claim_log.push(ClaimRecord {
                            outpoint: *outpoint,
                            new_outpoint: *new_outpoint,
                            secrets: secrets.clone(),
                            height,
                        });
                    }
                    TxOutcome::Applied
                }
                Err(err) => {
                    tracing::warn!(
                        txid = %txid,
                        tag = tx.tag(),
                        error = %err,
                        "transaction rejected at connect"
                    );
                    TxOutcome::Rejected(err.to_string())
                }
            };
            state.outcomes.insert(txid.clone(), outcome.clone());
            outcomes.push((txid, outcome));
        }

        let btc_tip = state.btc_tip;
        state.pipeline.advance(btc_tip);
        let minted_sats = if state.ledger.is_halted() {
            0
        } else {
            Self::sweep_mints(&mut state)?
        };

        let audit = LedgerAudit::capture(&state.ledger, &state.pipeline, height);
        let violations = InvariantChecker::check(&audit);
        if !violations.is_empty() {
            for violation in &violations {
                tracing::error!(height, error = %violation, "consensus invariant violated");
            }
            state.ledger.halt();
        }

        state.speculative = state.ledger.clone();

        let halted = state.ledger.is_halted();
        tracing::info!(
            height,
            applied = outcomes.iter().filter(|(_, o)| o.is_applied()).count(),
            rejected = outcomes.iter().filter(|(_, o)| !o.is_applied()).count(),
            minted_sats,
            halted,
            "block connected"
        );
        Ok(BlockSummary {
            height,
            outcomes,
            minted_sats,
            halted,
        })
    }

    fn apply_explicit_mint(state: &mut ChainState, btc_txid: &str) -> Result<(), LedgerError> {
        if state.ledger.is_halted() {
            return Err(LedgerError::Halted);
        }
        let auth = state.pipeline.mint(btc_txid)?;
        state.ledger.mint_m0(&auth.dest, auth.sats)
    }

    fn sweep_mints(state: &mut ChainState) -> Result<u64, LedgerError> {
        let mut minted = 0u64;
        for btc_txid in state.pipeline.mintable() {
            let auth = state.pipeline.mint(&btc_txid)?;
            state.ledger.mint_m0(&auth.dest, auth.sats)?;
            minted += auth.sats;
        }
        Ok(minted)
    }

    /// Re-drive missed mints and re-run the audit; clears the halt if
    /// the ledger comes back clean. Returns whether it is healthy now.
    pub fn reconcile(&self) -> Result<bool, LedgerError> {
        let mut state = self.state.write().unwrap();
        state.ledger.clear_halt();
        let minted_sats = Self::sweep_mints(&mut state)?;

        let height = state.height;
        let audit = LedgerAudit::capture(&state.ledger, &state.pipeline, height);
        let healthy = InvariantChecker::check(&audit).is_empty();
        if !healthy {
            state.ledger.halt();
        }
        state.speculative = state.ledger.clone();
        tracing::info!(height, minted_sats, healthy, "ledger reconciliation run");
        Ok(healthy)
    }

    /// Record the observed BTC chain tip used to confirm burns.
    pub fn observe_btc_tip(&self, height: BlockHeight) {
        let mut state = self.state.write().unwrap();
        if height > state.btc_tip {
            state.btc_tip = height;
        }
    }

    /// Move chain time forward.
    pub fn advance_time(&self, secs: u64) {
        self.state.write().unwrap().time += secs;
    }

    pub fn now(&self) -> UnixSeconds {
        self.state.read().unwrap().time
    }

    pub fn height(&self) -> BlockHeight {
        self.state.read().unwrap().height
    }

    pub fn btc_tip(&self) -> BlockHeight {
        self.state.read().unwrap().btc_tip
    }

    pub fn is_halted(&self) -> bool {
        self.state.read().unwrap().ledger.is_halted()
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.state.read().unwrap().ledger.balance(address)
    }

    pub fn receipt(&self, outpoint: &Outpoint) -> Option<Receipt> {
        self.state.read().unwrap().ledger.receipt(outpoint)
    }

    pub fn outcome(&self, txid: &TxId) -> Option<TxOutcome> {
        self.state.read().unwrap().outcomes.get(txid).cloned()
    }

    pub fn burn_record(&self, btc_txid: &str) -> Option<BurnRecord> {
        self.state.read().unwrap().pipeline.record(btc_txid).cloned()
    }

    /// Claims connected at or above `from_height`, oldest first.
    pub fn claims_since(&self, from_height: BlockHeight) -> Vec<ClaimRecord> {
        self.state
            .read()
            .unwrap()
            .claim_log
            .iter()
            .filter(|c| c.height >= from_height)
            .cloned()
            .collect()
    }

    /// Audit snapshot of the committed state.
    pub fn audit(&self) -> LedgerAudit {
        let state = self.state.read().unwrap();
        LedgerAudit::capture(&state.ledger, &state.pipeline, state.height)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_vault(&self, vaulted: u64) {
        let mut state = self.state.write().unwrap();
        state.ledger.force_vaulted(vaulted);
        state.speculative = state.ledger.clone();
    }
}
