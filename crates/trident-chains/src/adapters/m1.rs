//! M1 rail: HTLC legs carried by settlement-ledger receipts.
//!
//! Funding chains a `Lock` and an `HtlcCreate3s` into one mempool; the
//! pair applies together at the next block connect. Claims and refunds
//! are ledger transactions too, validated against the speculative
//! ledger at submission, so a wrong preimage or an early refund fails
//! here and never reaches a block. Reveal reads the chain's claim log,
//! which records the preimages of every applied claim.

use std::sync::Arc;

use dashmap::DashMap;

use async_trait::async_trait;
use trident_core::types::{ChainId, LegId, TxId};
use trident_crypto::SecretTriple;
use trident_ledger::{LedgerTx, M1Chain, Outpoint};

use crate::adapters::validate_spec;
use crate::error::ChainError;
use crate::traits::ChainAdapter;
use crate::types::{LegRef, LegSpec, LegStatus};

#[derive(Debug, Clone)]
struct M1Leg {
    spec: LegSpec,
    outpoint: Outpoint,
    create_txid: Option<TxId>,
    status: LegStatus,
}

/// M1 adapter over the settlement chain.
///
/// Thread-safe: uses `DashMap` for concurrent access.
pub struct M1Adapter {
    chain: Arc<M1Chain>,
    legs: DashMap<LegId, M1Leg>,
}

impl M1Adapter {
    pub fn new(chain: Arc<M1Chain>) -> Self {
        Self {
            chain,
            legs: DashMap::new(),
        }
    }

    fn leg(&self, id: LegId) -> Result<M1Leg, ChainError> {
        self.legs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ChainError::LegNotFound(id))
    }

    /// Recorded claim for the leg's receipt, by anyone. Claims are
    /// permissionless at the ledger level, so the adapter watches the
    /// chain rather than trusting its own bookkeeping.
    fn claim_of(&self, outpoint: Outpoint) -> Option<trident_ledger::ClaimRecord> {
        self.chain
            .claims_since(0)
            .into_iter()
            .find(|claim| claim.outpoint == outpoint)
    }

    /// Status as the connected chain shows it.
    fn observed_status(&self, record: &M1Leg) -> LegStatus {
        if record.status.is_settled() {
            return record.status;
        }
        if self.claim_of(record.outpoint).is_some() {
            return LegStatus::Claimed;
        }
        let funded = record
            .create_txid
            .as_ref()
            .and_then(|txid| self.chain.outcome(txid))
            .is_some_and(|outcome| outcome.is_applied());
        if !funded {
            return LegStatus::Pending;
        }
        match self.chain.receipt(&record.outpoint) {
            // Receipt consumed without a claim record: refunded.
            None => LegStatus::Refunded,
            Some(_) if record.status == LegStatus::Expired => LegStatus::Expired,
            Some(_) => LegStatus::Active,
        }
    }
}

#[async_trait]
impl ChainAdapter for M1Adapter {
    fn chain_id(&self) -> ChainId {
        ChainId::M1
    }

    async fn create(&self, spec: LegSpec) -> Result<LegRef, ChainError> {
        if spec.chain != ChainId::M1 {
            return Err(ChainError::InvalidLegState(format!(
                "spec for {} handed to the m1 adapter",
                spec.chain
            )));
        }
        validate_spec(&spec, self.chain.now())?;

        let outpoint = Outpoint::new();
        let id = LegId::new();
        self.legs.insert(
            id,
            M1Leg {
                spec,
                outpoint,
                create_txid: None,
                status: LegStatus::Pending,
            },
        );
        tracing::info!(leg_id = %id, %outpoint, "m1 leg created");
        Ok(LegRef {
            chain: ChainId::M1,
            id,
            chain_ref: outpoint.to_string(),
        })
    }

    async fn fund(&self, leg: &LegRef) -> Result<TxId, ChainError> {
        let record = self.leg(leg.id)?;
        if record.create_txid.is_some() {
            return Err(ChainError::InvalidLegState(format!(
                "leg {} already has a funding submission",
                leg.id
            )));
        }

        let lock_txid = self.chain.submit(LedgerTx::Lock {
            owner: record.spec.funder.clone(),
            amount: record.spec.amount.value,
            outpoint: record.outpoint,
        })?;
        let create_txid = self.chain.submit(LedgerTx::HtlcCreate3s {
            outpoint: record.outpoint,
            hashlocks: record.spec.hashlocks,
            timelock: record.spec.timelock,
            claim_to: record.spec.claim_address.clone(),
            refund_to: record.spec.refund_address.clone(),
        })?;

        if let Some(mut entry) = self.legs.get_mut(&leg.id) {
            entry.create_txid = Some(create_txid.clone());
        }
        tracing::info!(
            leg_id = %leg.id,
            outpoint = %record.outpoint,
            lock_txid = %lock_txid,
            create_txid = %create_txid,
            "m1 leg funding submitted"
        );
        Ok(create_txid)
    }

    async fn status(&self, leg: &LegRef) -> Result<LegStatus, ChainError> {
        let record = self.leg(leg.id)?;
        let observed = self.observed_status(&record);
        if observed != record.status {
            if let Some(mut entry) = self.legs.get_mut(&leg.id) {
                entry.status = observed;
            }
        }
        Ok(observed)
    }

    async fn claim(&self, leg: &LegRef, secrets: &SecretTriple) -> Result<TxId, ChainError> {
        let record = self.leg(leg.id)?;
        match record.status {
            LegStatus::Expired => return Err(ChainError::TimelockExpired(leg.id)),
            status if status.is_settled() => {
                return Err(ChainError::AlreadySettled { leg: leg.id, status })
            }
            _ if record.create_txid.is_none() => return Err(ChainError::NotFunded(leg.id)),
            _ => {}
        }

        // The ledger re-verifies preimages and timelock at admission.
        let new_outpoint = Outpoint::new();
        let txid = self.chain.submit(LedgerTx::HtlcClaim3s {
            outpoint: record.outpoint,
            new_outpoint,
            secrets: secrets.clone(),
        })?;
        tracing::info!(
            leg_id = %leg.id,
            outpoint = %record.outpoint,
            %new_outpoint,
            txid = %txid,
            "m1 claim submitted"
        );
        Ok(txid)
    }

    async fn refund(&self, leg: &LegRef) -> Result<TxId, ChainError> {
        let record = self.leg(leg.id)?;
        if record.status.is_settled() {
            return Err(ChainError::AlreadySettled {
                leg: leg.id,
                status: record.status,
            });
        }
        if record.create_txid.is_none() {
            return Err(ChainError::NotFunded(leg.id));
        }

        let new_outpoint = Outpoint::new();
        let txid = self.chain.submit(LedgerTx::HtlcRefund3s {
            outpoint: record.outpoint,
            new_outpoint,
        })?;
        tracing::info!(
            leg_id = %leg.id,
            outpoint = %record.outpoint,
            %new_outpoint,
            txid = %txid,
            "m1 refund submitted"
        );
        Ok(txid)
    }

    async fn reveal(&self, leg: &LegRef) -> Result<SecretTriple, ChainError> {
        let record = self.leg(leg.id)?;
        self.claim_of(record.outpoint)
            .map(|claim| claim.secrets)
            .ok_or(ChainError::NothingRevealed(leg.id))
    }

    async fn check_expiry(&self) -> Result<Vec<LegId>, ChainError> {
        let now = self.chain.now();
        let mut expired = Vec::new();
        for mut entry in self.legs.iter_mut() {
            // Refresh from the chain first: a leg whose funding connected
            // in some earlier block is expirable even if nobody polled it
            // in between.
            let observed = self.observed_status(entry.value());
            entry.status = observed;
            if observed == LegStatus::Active && now >= entry.spec.timelock {
                entry.status = LegStatus::Expired;
                expired.push(*entry.key());
            }
        }
        for id in &expired {
            tracing::info!(leg_id = %id, "m1 leg expired unclaimed");
        }
        Ok(expired)
    }
}
