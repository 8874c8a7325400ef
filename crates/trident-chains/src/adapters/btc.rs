//! BTC rail: P2WSH HTLC legs locked behind all three hashlocks.
//!
//! The redeem script carries the three SHA-256 hashlocks in canonical
//! order plus a CLTV refund branch. Claim and refund transactions are
//! assembled and consensus-serialized here; input selection, change and
//! signing belong to the wallet layer, so the signature slot carries a
//! fixed-size filler and the funding input is left null.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{deserialize, serialize};
use bitcoin::hashes::Hash as _;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_IF, OP_SHA256,
};
use bitcoin::script::Builder;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount as BtcAmount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, WScriptHash,
    Witness,
};
use dashmap::DashMap;

use trident_core::types::{Address, ChainId, LegId, TxId};
use trident_crypto::{hashlock_bytes, sha256, Secret, SecretTriple};

use crate::adapters::validate_spec;
use crate::error::ChainError;
use crate::traits::{ChainAdapter, ChainBackend};
use crate::types::{LegRef, LegSpec, LegStatus};

/// Fills the witness signature slot. Key custody and signing live in
/// the wallet layer; the simulated backend does not execute scripts.
const SIG_STANDIN: [u8; 64] = [0u8; 64];

/// Builds the three-hashlock HTLC redeem script.
///
/// ```text
/// OP_IF
///     OP_SHA256 <H_user> OP_EQUALVERIFY
///     OP_SHA256 <H_lp1>  OP_EQUALVERIFY
///     OP_SHA256 <H_lp2>  OP_EQUALVERIFY
///     <claimant_pk> OP_CHECKSIG
/// OP_ELSE
///     <timelock> OP_CLTV OP_DROP
///     <funder_pk> OP_CHECKSIG
/// OP_ENDIF
/// ```
///
/// Secrets come off the witness stack top first, so the script checks
/// `H_user` first while the claim witness pushes `S_lp2` first. Each
/// hashlock is verified independently; a party can check its own
/// digest is in place without knowing the other two preimages.
pub fn redeem_script(spec: &LegSpec) -> ScriptBuf {
    let mut builder = Builder::new().push_opcode(OP_IF);
    for hashlock in spec.hashlocks.as_array() {
        builder = builder
            .push_opcode(OP_SHA256)
            .push_slice(hashlock_bytes(&hashlock))
            .push_opcode(OP_EQUALVERIFY);
    }
    builder
        .push_slice(key_slot(&spec.claimant))
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_int(spec.timelock as i64)
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_slice(key_slot(&spec.funder))
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// Claim witness stack: `[sig, S_lp2, S_lp1, S_user, 0x01, script]`.
pub fn claim_witness(script: &ScriptBuf, secrets: &SecretTriple) -> Witness {
    let mut witness = Witness::new();
    witness.push(SIG_STANDIN);
    witness.push(secrets.lp2.as_bytes());
    witness.push(secrets.lp1.as_bytes());
    witness.push(secrets.user.as_bytes());
    witness.push([0x01]); // IF branch
    witness.push(script.as_bytes());
    witness
}

/// Refund witness stack: `[sig, <empty>, script]`.
pub fn refund_witness(script: &ScriptBuf) -> Witness {
    let mut witness = Witness::new();
    witness.push(SIG_STANDIN);
    witness.push([]); // ELSE branch
    witness.push(script.as_bytes());
    witness
}

/// 33-byte compressed-key slot for a party. The wallet layer owns real
/// keys; deriving the slot from the address keeps scripts deterministic.
fn key_slot(address: &Address) -> [u8; 33] {
    let digest = sha256(address.as_str().as_bytes());
    let mut slot = [0u8; 33];
    slot[0] = 0x02;
    slot[1..].copy_from_slice(&digest);
    slot
}

/// BIP-141 script commitment: `OP_0 <sha256(witness_script)>`.
fn p2wsh_script_pubkey(script: &ScriptBuf) -> ScriptBuf {
    ScriptBuf::new_p2wsh(&WScriptHash::from_byte_array(sha256(script.as_bytes())))
}

/// Transaction paying the leg's P2WSH output. Inputs are the funder
/// wallet's concern and stay empty on the simulated backend.
fn funding_tx(script: &ScriptBuf, sats: u64) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![],
        output: vec![TxOut {
            value: BtcAmount::from_sat(sats),
            script_pubkey: p2wsh_script_pubkey(script),
        }],
    }
}

/// Transaction spending the leg output with the given witness. The
/// wallet tracks the real funding outpoint; the input here is null.
fn spend_tx(witness: Witness, lock_time: LockTime) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_LOCKTIME_NO_RBF,
            witness,
        }],
        output: vec![],
    }
}

fn parse_claim_witness(leg: LegId, elements: &[Vec<u8>]) -> Result<SecretTriple, ChainError> {
    if elements.len() != 6 {
        return Err(ChainError::MalformedArtifact(format!(
            "claim witness has {} elements, expected 6",
            elements.len()
        )));
    }
    if elements[4] != [0x01] {
        return Err(ChainError::MalformedArtifact(format!(
            "spend of leg {leg} took the refund branch"
        )));
    }
    let secret_at = |index: usize, role: &str| -> Result<Secret, ChainError> {
        let bytes: [u8; 32] = elements[index].as_slice().try_into().map_err(|_| {
            ChainError::MalformedArtifact(format!(
                "{role} preimage is {} bytes, expected 32",
                elements[index].len()
            ))
        })?;
        Ok(Secret::from_bytes(bytes))
    };
    Ok(SecretTriple {
        user: secret_at(3, "user")?,
        lp1: secret_at(2, "lp1")?,
        lp2: secret_at(1, "lp2")?,
    })
}

#[derive(Debug, Clone)]
struct BtcLeg {
    spec: LegSpec,
    script: ScriptBuf,
    status: LegStatus,
    claim_txid: Option<TxId>,
}

/// BTC adapter over a [`ChainBackend`].
///
/// Thread-safe: uses `DashMap` for concurrent access.
pub struct BtcAdapter {
    backend: Arc<dyn ChainBackend>,
    legs: DashMap<LegId, BtcLeg>,
}

impl BtcAdapter {
    pub fn new(backend: Arc<dyn ChainBackend>) -> Self {
        Self {
            backend,
            legs: DashMap::new(),
        }
    }

    fn leg(&self, id: LegId) -> Result<BtcLeg, ChainError> {
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
impl ChainAdapter for BtcAdapter {
    fn chain_id(&self) -> ChainId {
        ChainId::Btc
    }

    async fn create(&self, spec: LegSpec) -> Result<LegRef, ChainError> {
        if spec.chain != ChainId::Btc {
            return Err(ChainError::InvalidLegState(format!(
                "spec for {} handed to the btc adapter",
                spec.chain
            )));
        }
        let now = self.backend.time().await?;
        validate_spec(&spec, now)?;

        let script = redeem_script(&spec);
        let chain_ref = hex::encode(sha256(script.as_bytes()));
        let id = LegId::new();
        self.legs.insert(
            id,
            BtcLeg {
                spec,
                script,
                status: LegStatus::Pending,
                claim_txid: None,
            },
        );
        tracing::info!(leg_id = %id, script_hash = %chain_ref, "btc leg created");
        Ok(LegRef {
            chain: ChainId::Btc,
            id,
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

        let tx = funding_tx(&record.script, record.spec.amount.value);
        let txid = self.backend.broadcast(serialize(&tx)).await?;
        if !self.backend.tx_included(&txid).await? {
            return Err(ChainError::Transport(format!(
                "funding tx {txid} not seen on chain"
            )));
        }
        self.set_status(leg.id, LegStatus::Active);
        tracing::info!(leg_id = %leg.id, txid = %txid, sats = record.spec.amount.value, "btc leg funded");
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

        let witness = claim_witness(&record.script, secrets);
        let tx = spend_tx(witness, LockTime::ZERO);
        let txid = self.backend.broadcast(serialize(&tx)).await?;
        if let Some(mut entry) = self.legs.get_mut(&leg.id) {
            entry.status = LegStatus::Claimed;
            entry.claim_txid = Some(txid.clone());
        }
        tracing::info!(leg_id = %leg.id, txid = %txid, "btc leg claimed");
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

        let witness = refund_witness(&record.script);
        let lock_time = LockTime::from_consensus(record.spec.timelock as u32);
        let txid = self.backend.broadcast(serialize(&spend_tx(witness, lock_time))).await?;
        self.set_status(leg.id, LegStatus::Refunded);
        tracing::info!(leg_id = %leg.id, txid = %txid, "btc leg refunded");
        Ok(txid)
    }

    async fn reveal(&self, leg: &LegRef) -> Result<SecretTriple, ChainError> {
        let record = self.leg(leg.id)?;
        let claim_txid = record
            .claim_txid
            .ok_or(ChainError::NothingRevealed(leg.id))?;
        let raw = self
            .backend
            .raw_tx(&claim_txid)
            .await?
            .ok_or_else(|| ChainError::Transport(format!("claim tx {claim_txid} not on chain")))?;

        let tx: Transaction = deserialize(&raw)
            .map_err(|e| ChainError::MalformedArtifact(format!("claim tx decode: {e}")))?;
        let input = tx
            .input
            .first()
            .ok_or_else(|| ChainError::MalformedArtifact("claim tx has no inputs".into()))?;
        parse_claim_witness(leg.id, &input.witness.to_vec())
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
            tracing::info!(leg_id = %id, "btc leg expired unclaimed");
        }
        Ok(expired)
    }
}
