//! Client-side planning for a concentrated-liquidity dex.
//!
//! Builds long-form order directives and their wire encoding, plans
//! slippage-bounded swaps across the dex's entry points, and composes both
//! to rebalance out-of-range positions.

pub mod config;
pub mod directive;
pub mod dex;
pub mod errors;
pub mod models;
pub mod rebalance;
pub mod swap;
pub mod utils;
