use std::collections::HashMap;
use std::sync::Arc;

use trident_core::types::{ChainId, LegId, TxId};
use trident_crypto::SecretTriple;

use crate::error::ChainError;
use crate::traits::ChainAdapter;
use crate::types::{LegRef, LegSpec, LegStatus};

/// Central registry that dispatches leg operations to rail adapters.
///
/// Adapters are keyed by their `chain_id()`; a swap plan only needs a
/// `LegRef` to route any operation to the right rail.
pub struct AdapterRegistry {
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    /// Create a new registry with no adapters registered.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register a rail adapter, keyed by its `chain_id()`.
    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) {
        let chain = adapter.chain_id();
        tracing::info!(chain = %chain, "registering chain adapter");
        self.adapters.insert(chain, adapter);
    }

    /// Get the adapter for a chain.
    pub fn get(&self, chain: ChainId) -> Result<Arc<dyn ChainAdapter>, ChainError> {
        self.adapters
            .get(&chain)
            .cloned()
            .ok_or(ChainError::AdapterNotRegistered(chain))
    }

    /// All registered chains, in stable order.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self.adapters.keys().copied().collect();
        chains.sort_by_key(|chain| chain.code().to_string());
        chains
    }

    /// Create a leg on the rail its spec names.
    pub async fn create(&self, spec: LegSpec) -> Result<LegRef, ChainError> {
        self.get(spec.chain)?.create(spec).await
    }

    /// Fund a leg through its rail.
    pub async fn fund(&self, leg: &LegRef) -> Result<TxId, ChainError> {
        self.get(leg.chain)?.fund(leg).await
    }

    /// Observed status of a leg.
    pub async fn status(&self, leg: &LegRef) -> Result<LegStatus, ChainError> {
        self.get(leg.chain)?.status(leg).await
    }

    /// Claim a leg with all three preimages.
    pub async fn claim(&self, leg: &LegRef, secrets: &SecretTriple) -> Result<TxId, ChainError> {
        self.get(leg.chain)?.claim(leg, secrets).await
    }

    /// Refund a leg after its timelock.
    pub async fn refund(&self, leg: &LegRef) -> Result<TxId, ChainError> {
        self.get(leg.chain)?.refund(leg).await
    }

    /// Extract revealed preimages from a leg's claim artifact.
    pub async fn reveal(&self, leg: &LegRef) -> Result<SecretTriple, ChainError> {
        self.get(leg.chain)?.reveal(leg).await
    }

    /// Run the expiry sweep on every registered rail.
    pub async fn check_expiry_all(&self) -> Result<Vec<(ChainId, LegId)>, ChainError> {
        let mut expired = Vec::new();
        for chain in self.chains() {
            let adapter = self.get(chain)?;
            for leg_id in adapter.check_expiry().await? {
                expired.push((chain, leg_id));
            }
        }
        Ok(expired)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
