use async_trait::async_trait;

use trident_core::types::{BlockHeight, ChainId, LegId, TxId, UnixSeconds};
use trident_crypto::SecretTriple;

use crate::error::ChainError;
use crate::types::{LegRef, LegSpec, LegStatus};

/// One settlement rail behind a uniform async interface.
///
/// Three implementations exist: the BTC P2WSH adapter, the M1 ledger
/// adapter and the EVM adapter. The orchestrator never sees anything
/// rail-specific; secrets go in as a [`SecretTriple`] and come back
/// out of claim artifacts through `reveal`.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Which chain this adapter drives.
    fn chain_id(&self) -> ChainId;

    /// Validate the leg spec and create the leg contract. Fails on
    /// zero hashlock, non-positive amount, non-future timelock or id
    /// collision; nothing is funded yet.
    async fn create(&self, spec: LegSpec) -> Result<LegRef, ChainError>;

    /// Lock the leg's value on chain. The leg becomes `Active` once
    /// the rail reports the funding as landed.
    async fn fund(&self, leg: &LegRef) -> Result<TxId, ChainError>;

    /// Observed status of the leg.
    async fn status(&self, leg: &LegRef) -> Result<LegStatus, ChainError>;

    /// Claim the leg by presenting all three preimages. Fails if the
    /// leg is already settled, the timelock has passed, or any secret
    /// fails its hash check.
    async fn claim(&self, leg: &LegRef, secrets: &SecretTriple) -> Result<TxId, ChainError>;

    /// Refund the leg to its refund address. Fails if already settled
    /// or the timelock has not passed yet.
    async fn refund(&self, leg: &LegRef) -> Result<TxId, ChainError>;

    /// Extract the revealed preimages from the leg's claim artifact
    /// (BTC witness, M1 claim payload, EVM calldata).
    async fn reveal(&self, leg: &LegRef) -> Result<SecretTriple, ChainError>;

    /// Mark active legs whose timelock has passed as expired and
    /// return their ids.
    async fn check_expiry(&self) -> Result<Vec<LegId>, ChainError>;
}

/// Read-side node capability: the part of a chain RPC the adapters
/// observe. Transport lives behind this seam.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn height(&self) -> Result<BlockHeight, ChainError>;
    async fn time(&self) -> Result<UnixSeconds, ChainError>;
    async fn tx_included(&self, txid: &TxId) -> Result<bool, ChainError>;

    /// Raw bytes of an included transaction, if the node still has
    /// them. Claim artifacts are re-parsed from here, not from local
    /// copies, so `reveal` sees exactly what the chain saw.
    async fn raw_tx(&self, txid: &TxId) -> Result<Option<Vec<u8>>, ChainError>;
}

/// Write-side node capability: raw transaction submission.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    async fn broadcast(&self, raw: Vec<u8>) -> Result<TxId, ChainError>;
}

/// Full node capability, read and write.
pub trait ChainBackend: ChainReader + ChainWriter {}

impl<T: ChainReader + ChainWriter> ChainBackend for T {}
