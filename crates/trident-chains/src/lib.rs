//! Trident Chains
//!
//! The three settlement rails behind one async [`ChainAdapter`] trait:
//! BTC P2WSH scripts, M1 ledger receipts and EVM contract entries. All
//! rails verify the same canonical triple of SHA-256 hashlocks; claim
//! artifacts are parsed back off each chain so revealed preimages can
//! be propagated leg to leg. Transport faults are retried with capped
//! exponential backoff; protocol answers never are.

pub mod adapters;
pub mod error;
pub mod registry;
pub mod retry;
pub mod sim;
pub mod traits;
pub mod types;

pub use adapters::{BtcAdapter, EvmAdapter, M1Adapter};
pub use error::ChainError;
pub use registry::AdapterRegistry;
pub use retry::retry_transport;
pub use sim::SimChain;
pub use traits::{ChainAdapter, ChainBackend, ChainReader, ChainWriter};
pub use types::{LegRef, LegSpec, LegStatus};
