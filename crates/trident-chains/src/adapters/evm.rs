//! EVM rail: HTLC entries in a hashed-timelock contract.
//!
//! The contract surface is `create / fund / claim / refund / get_htlc`,
//! keyed by `htlc_id = keccak256(sender ‖ recipient ‖ token ‖ amount ‖
//! H_user ‖ H_lp1 ‖ H_lp2 ‖ timelock ‖ created_at)` with the hashlocks
//! laid out through the canonical codec. Claiming is permissionless:
//! any caller may present the three preimages, value always moves to
//! the recipient fixed at creation. Claim calldata is rebuilt from the
//! chain for `reveal`, so observers learn secrets the same way the
//! counterparties do.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use trident_core::types::{ChainId, LegId, TxId, UnixSeconds};
use trident_crypto::{keccak256, triple_bytes, Secret, SecretTriple};

use crate::adapters::validate_spec;
use crate::error::ChainError;
use crate::traits::{ChainAdapter, ChainBackend};
use crate::types::{LegRef, LegSpec, LegStatus};

/// First four bytes of the Keccak-256 of an ABI signature.
fn selector(signature: &[u8]) -> [u8; 4] {
    let digest = keccak256(signature);
    [digest[0], digest[1], digest[2], digest[3]]
}

fn fund_selector() -> [u8; 4] {
    selector(b"fund(bytes32)")
}

fn claim_selector() -> [u8; 4] {
    selector(b"claim(bytes32,bytes32,bytes32,bytes32)")
}

fn refund_selector() -> [u8; 4] {
    selector(b"refund(bytes32)")
}

/// Contract id of one HTLC entry.
///
/// Binds every parameter of the leg plus the creation timestamp, so
/// re-creating the same leg in a later second yields a fresh id while
/// an exact duplicate collides and is rejected.
pub fn htlc_id(spec: &LegSpec, created_at: UnixSeconds) -> [u8; 32] {
    let mut preimage = Vec::new();
    preimage.extend_from_slice(spec.funder.as_str().as_bytes());
    preimage.extend_from_slice(spec.claim_address.as_str().as_bytes());
    preimage.extend_from_slice(spec.amount.asset.code().as_bytes());
    preimage.extend_from_slice(&spec.amount.value.to_be_bytes());
    preimage.extend_from_slice(&triple_bytes(&spec.hashlocks));
    preimage.extend_from_slice(&spec.timelock.to_be_bytes());
    preimage.extend_from_slice(&created_at.to_be_bytes());
    keccak256(&preimage)
}

/// `claim` calldata: selector ‖ htlc_id ‖ S_user ‖ S_lp1 ‖ S_lp2.
pub fn claim_calldata(id: &[u8; 32], secrets: &SecretTriple) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * 4);
    data.extend_from_slice(&claim_selector());
    data.extend_from_slice(id);
    data.extend_from_slice(secrets.user.as_bytes());
    data.extend_from_slice(secrets.lp1.as_bytes());
    data.extend_from_slice(secrets.lp2.as_bytes());
    data
}

fn parse_claim_calldata(leg: LegId, data: &[u8]) -> Result<SecretTriple, ChainError> {
    if data.len() != 4 + 32 * 4 {
        return Err(ChainError::MalformedArtifact(format!(
            "claim calldata is {} bytes, expected 132",
            data.len()
        )));
    }
    if data[..4] != claim_selector() {
        return Err(ChainError::MalformedArtifact(format!(
            "calldata for leg {leg} is not a claim call"
        )));
    }
    let secret_at = |offset: usize| -> Result<Secret, ChainError> {
        let bytes: [u8; 32] = data[offset..offset + 32]
            .try_into()
            .map_err(|_| ChainError::MalformedArtifact("truncated claim calldata".into()))?;
        Ok(Secret::from_bytes(bytes))
    };
    Ok(SecretTriple {
        user: secret_at(36)?,
        lp1: secret_at(68)?,
        lp2: secret_at(100)?,
    })
}

#[derive(Debug, Clone)]
struct EvmLeg {
    spec: LegSpec,
    htlc_id: [u8; 32],
    status: LegStatus,
    claim_txid: Option<TxId>,
}

/// EVM adapter over a [`ChainBackend`].
///
/// Thread-safe: uses `DashMap` for concurrent access.
pub struct EvmAdapter {
    backend: Arc<dyn ChainBackend>,
    legs: DashMap<LegId, EvmLeg>,
    ids: DashMap<[u8; 32], LegId>,
}

impl EvmAdapter {
    pub fn new(backend: Arc<dyn ChainBackend>) -> Self {
        Self {
            backend,
            legs: DashMap::new(),
            ids: DashMap::new(),
        }
    }

    /// Contract-style lookup by htlc id.
    pub fn get_htlc(&self, htlc_id: &[u8; 32]) -> Option<(LegId, LegStatus)> {
        let leg_id = *self.ids.get(htlc_id)?;
        let status = self.legs.get(&leg_id)?.status;
        Some((leg_id, status))
    }

    fn leg(&self, id: LegId) -> Result<EvmLeg, ChainError> {
        self.legs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ChainError::LegNotFound(id))
    }

    fn set_status(&self, id: LegId, status: LegStatus) {
        if let Some(mut entry) = self.legs.get_mut(&id) {
            entry.status = status;
        }
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain_id(&self) -> ChainId {
        ChainId::Evm
    }

    async fn create(&self, spec: LegSpec) -> Result<LegRef, ChainError> {
        if spec.chain != ChainId::Evm {
            return Err(ChainError::InvalidLegState(format!(
                "spec for {} handed to the evm adapter",
                spec.chain
            )));
        }
        let now = self.backend.time().await?;
        validate_spec(&spec, now)?;

        let id_bytes = htlc_id(&spec, now);
        let leg_id = LegId::new();
        match self.ids.entry(id_bytes) {
            Entry::Occupied(_) => {
                return Err(ChainError::IdCollision(hex::encode(id_bytes)));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(leg_id);
            }
        }
        let chain_ref = hex::encode(id_bytes);
        self.legs.insert(
            leg_id,
            EvmLeg {
                spec,
                htlc_id: id_bytes,
                status: LegStatus::Pending,
                claim_txid: None,
            },
        );
        tracing::info!(leg_id = %leg_id, htlc_id = %chain_ref, "evm htlc created");
        Ok(LegRef {
            chain: ChainId::Evm,
            id: leg_id,
            chain_ref,
        })
    }

    async fn fund(&self, leg: &LegRef) -> Result<TxId, ChainError> {
        let record = self.leg(leg.id)?;
        if record.status != LegStatus::Pending {
            return Err(ChainError::InvalidLegState(format!(
                "cannot fund leg {} in status {}",
                leg.id, record.status
            )));
        }

        let mut calldata = Vec::with_capacity(4 + 32);
        calldata.extend_from_slice(&fund_selector());
        calldata.extend_from_slice(&record.htlc_id);
        let txid = self.backend.broadcast(calldata).await?;
        self.set_status(leg.id, LegStatus::Active);
        tracing::info!(
            leg_id = %leg.id,
            txid = %txid,
            amount = record.spec.amount.value,
            token = %record.spec.amount.asset,
            "evm htlc funded"
        );
        Ok(txid)
    }

    async fn status(&self, leg: &LegRef) -> Result<LegStatus, ChainError> {
        Ok(self.leg(leg.id)?.status)
    }

    async fn claim(&self, leg: &LegRef, secrets: &SecretTriple) -> Result<TxId, ChainError> {
        let record = self.leg(leg.id)?;
        match record.status {
            LegStatus::Active => {}
            LegStatus::Pending => return Err(ChainError::NotFunded(leg.id)),
            LegStatus::Expired => return Err(ChainError::TimelockExpired(leg.id)),
            status => return Err(ChainError::AlreadySettled { leg: leg.id, status }),
        }

        let now = self.backend.time().await?;
        if now >= record.spec.timelock {
            self.set_status(leg.id, LegStatus::Expired);
            return Err(ChainError::TimelockExpired(leg.id));
        }
        if let Some(role) = record.spec.hashlocks.first_mismatch(secrets) {
            return Err(ChainError::PreimageMismatch { leg: leg.id, role });
        }

        // Caller identity is irrelevant; value moves to the recipient
        // fixed at creation.
        let txid = self
            .backend
            .broadcast(claim_calldata(&record.htlc_id, secrets))
            .await?;
        if let Some(mut entry) = self.legs.get_mut(&leg.id) {
            entry.status = LegStatus::Claimed;
            entry.claim_txid = Some(txid.clone());
        }
        tracing::info!(
            leg_id = %leg.id,
            txid = %txid,
            recipient = %record.spec.claim_address,
            "evm htlc claimed"
        );
        Ok(txid)
    }

    async fn refund(&self, leg: &LegRef) -> Result<TxId, ChainError> {
        let record = self.leg(leg.id)?;
        match record.status {
            LegStatus::Active | LegStatus::Expired => {}
            LegStatus::Pending => return Err(ChainError::NotFunded(leg.id)),
            status => return Err(ChainError::AlreadySettled { leg: leg.id, status }),
        }

        let now = self.backend.time().await?;
        if now < record.spec.timelock {
            return Err(ChainError::TimelockNotExpired(leg.id));
        }

        let mut calldata = Vec::with_capacity(4 + 32);
        calldata.extend_from_slice(&refund_selector());
        calldata.extend_from_slice(&record.htlc_id);
        let txid = self.backend.broadcast(calldata).await?;
        self.set_status(leg.id, LegStatus::Refunded);
        tracing::info!(leg_id = %leg.id, txid = %txid, "evm htlc refunded");
        Ok(txid)
    }

    async fn reveal(&self, leg: &LegRef) -> Result<SecretTriple, ChainError> {
        let record = self.leg(leg.id)?;
        let claim_txid = record
            .claim_txid
            .ok_or(ChainError::NothingRevealed(leg.id))?;
        let calldata = self
            .backend
            .raw_tx(&claim_txid)
            .await?
            .ok_or_else(|| ChainError::Transport(format!("claim tx {claim_txid} not on chain")))?;
        parse_claim_calldata(leg.id, &calldata)
    }

    async fn check_expiry(&self) -> Result<Vec<LegId>, ChainError> {
        let now = self.backend.time().await?;
        let mut expired = Vec::new();
        for mut entry in self.legs.iter_mut() {
            if entry.status == LegStatus::Active && now >= entry.spec.timelock {
                entry.status = LegStatus::Expired;
                expired.push(*entry.key());
            }
        }
        for id in &expired {
            tracing::info!(leg_id = %id, "evm htlc expired unclaimed");
        }
        Ok(expired)
    }
}
