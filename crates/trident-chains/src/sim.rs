//! In-process chain backend for the BTC and EVM rails.
//!
//! `SimChain` stands in for a node RPC: it holds a block height, a
//! chain clock and the raw bytes of every broadcast transaction.
//! Broadcasts are included immediately at the current tip; block
//! production and reorgs are out of scope, tests drive the clocks by
//! hand.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use trident_core::types::{BlockHeight, ChainId, TxId, UnixSeconds};

use crate::error::ChainError;
use crate::traits::{ChainReader, ChainWriter};

/// Simulated node for one chain.
pub struct SimChain {
    chain: ChainId,
    height: AtomicU64,
    time: AtomicU64,
    txs: DashMap<TxId, Vec<u8>>,
}

impl SimChain {
    /// New chain at height 0, clock 0.
    pub fn new(chain: ChainId) -> Self {
        Self::with_clock(chain, 0, 0)
    }

    /// New chain with an explicit starting height and clock.
    pub fn with_clock(chain: ChainId, height: BlockHeight, time: UnixSeconds) -> Self {
        Self {
            chain,
            height: AtomicU64::new(height),
            time: AtomicU64::new(time),
            txs: DashMap::new(),
        }
    }

    /// Which chain this node simulates.
    pub fn chain(&self) -> ChainId {
        self.chain
    }

    /// Mine `n` empty blocks; returns the new tip.
    pub fn advance_blocks(&self, n: u64) -> BlockHeight {
        let tip = self.height.fetch_add(n, Ordering::SeqCst) + n;
        tracing::debug!(chain = %self.chain, tip, "sim chain advanced");
        tip
    }

    /// Move the chain clock forward; returns the new time.
    pub fn advance_time(&self, secs: u64) -> UnixSeconds {
        self.time.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

#[async_trait]
impl ChainReader for SimChain {
    async fn height(&self) -> Result<BlockHeight, ChainError> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn time(&self) -> Result<UnixSeconds, ChainError> {
        Ok(self.time.load(Ordering::SeqCst))
    }

    async fn tx_included(&self, txid: &TxId) -> Result<bool, ChainError> {
        Ok(self.txs.contains_key(txid))
    }

    async fn raw_tx(&self, txid: &TxId) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.txs.get(txid).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ChainWriter for SimChain {
    async fn broadcast(&self, raw: Vec<u8>) -> Result<TxId, ChainError> {
        let txid = TxId::new(format!("{}-{}", self.chain.code(), Uuid::now_v7()));
        self.txs.insert(txid.clone(), raw);
        tracing::debug!(chain = %self.chain, txid = %txid, "tx broadcast and included");
        Ok(txid)
    }
}
