//! Trident Swap
//!
//! Planning and orchestration of three-leg atomic swaps. A plan fixes
//! the legs, hashlocks and strictly ordered timelocks; the
//! orchestrator submits leg operations to the rails, observes what
//! actually settled and walks the phase machine from `Init` to
//! `Completed`, or aborts the plan and refunds whatever was funded.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod plan;

pub use error::SwapError;
pub use events::SwapEvent;
pub use orchestrator::SwapOrchestrator;
pub use plan::{LegDraft, LegPlan, SwapPlan, SwapPlanBuilder};
