//! The three rail adapters behind [`ChainAdapter`](crate::ChainAdapter).

pub mod btc;
pub mod evm;
pub mod m1;

pub use btc::BtcAdapter;
pub use evm::EvmAdapter;
pub use m1::M1Adapter;

use trident_core::types::UnixSeconds;

use crate::error::ChainError;
use crate::types::LegSpec;

/// Spec checks every rail runs before creating a leg: positive amount,
/// no zero hashlock, timelock strictly in the future of the rail's own
/// clock.
pub(crate) fn validate_spec(spec: &LegSpec, now: UnixSeconds) -> Result<(), ChainError> {
    if spec.amount.is_zero() {
        return Err(ChainError::NonPositiveAmount);
    }
    if spec.hashlocks.any_zero() {
        return Err(ChainError::ZeroHashlock);
    }
    if spec.timelock <= now {
        return Err(ChainError::TimelockNotFuture {
            timelock: spec.timelock,
            now,
        });
    }
    Ok(())
}
