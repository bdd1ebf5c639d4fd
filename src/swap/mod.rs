//! Swap planning: impact estimate, slippage bounds and entry point selection.

pub mod impact;
pub mod plan;

pub use impact::Impact;
pub use plan::{GAS_PADDING, SwapPlan};
