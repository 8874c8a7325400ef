//! Trident Core
//!
//! Shared types, configuration, error taxonomy and the swap phase
//! machine used by every other Trident crate.

pub mod config;
pub mod error;
pub mod state_machine;
pub mod types;

pub use config::TridentConfig;
pub use error::{CoreError, ErrorKind};
pub use state_machine::{PhaseEvent, SwapPhase, SwapStateMachine};
pub use types::{
    Address, Amount, Asset, BlockHeight, ChainId, LegId, LegIndex, SwapId, TxId, UnixSeconds,
};
