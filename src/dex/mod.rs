//! Dex collaborators: the read and call interfaces the planners consume, and
//! the bundle of them resolved for one chain.

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::types::{Address, Bytes, I256, U256};

use crate::errors::Result;
use crate::models::{CallMode, CallOutcome, SwapCallArgs, TokenQty, TxOptions};

pub mod calc;
pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod state;
pub mod tokens;

pub use client::{Connection, EthersDex, EthersHotPathReader, EthersImpact, EthersNativeView, EthersPool};
pub use state::PoolSnapshot;
pub use tokens::StaticToken;

/// `userCmd` callpath of the hot-path swap proxy.
pub const HOT_PROXY_IDX: u16 = 1;

/// Token metadata and unit conversion.
#[async_trait]
pub trait TokenView: Send + Sync {
    fn address(&self) -> Address;

    fn decimals(&self) -> u8;

    /// Raw on-chain units for a caller-supplied quantity.
    async fn norm_qty(&self, qty: &TokenQty) -> Result<U256>;

    /// Display units for a raw quantity.
    async fn to_display(&self, qty: U256) -> Result<BigDecimal>;

    /// Raw units for a display quantity, rounded down to the token's granularity.
    async fn round_qty(&self, qty: &BigDecimal) -> Result<U256>;

    /// The chain's native asset is represented by the zero address.
    fn is_native(&self) -> bool {
        self.address() == Address::zero()
    }
}

/// Price view of one base/quote pool.
#[async_trait]
pub trait PoolView: Send + Sync {
    /// Raw base-per-quote price.
    async fn spot_price(&self) -> Result<f64>;
    async fn spot_tick(&self) -> Result<i32>;
    async fn display_price(&self) -> Result<f64>;
    async fn to_display_price(&self, spot_price: f64) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactRequest {
    pub base: Address,
    pub quote: Address,
    pub pool_idx: U256,
    pub is_buy: bool,
    pub in_base_qty: bool,
    pub qty: u128,
    pub tip: u16,
    pub limit_price: u128,
}

/// Predicted pool flows for a swap, signed from the pool's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactFlows {
    pub base_flow: I256,
    pub quote_flow: I256,
    /// Q64.64 square-root price after the swap.
    pub final_price: U256,
}

/// Off-chain swap impact estimation.
#[async_trait]
pub trait ImpactQuery: Send + Sync {
    async fn calc_impact(&self, request: &ImpactRequest) -> Result<ImpactFlows>;
}

/// Reads whether the dex's embedded hot-path swap is enabled.
#[async_trait]
pub trait HotPathFlagReader: Send + Sync {
    async fn is_hot_path_open(&self) -> Result<bool>;
}

/// Native asset balances held as dex surplus collateral.
#[async_trait]
pub trait NativeAssetView: Send + Sync {
    /// Portion of `amount` not covered by the caller's native surplus.
    async fn amount_needed_beyond_surplus(&self, amount: U256) -> Result<U256>;
}

/// A contract exposing the dex swap and command entry points: the dex itself,
/// a router, or a router bypass.
#[async_trait]
pub trait DexEntryPoint: Send + Sync {
    async fn swap(&self, args: &SwapCallArgs, tx: &TxOptions, mode: CallMode)
    -> Result<CallOutcome>;

    async fn user_cmd(
        &self,
        callpath: u16,
        cmd: Bytes,
        tx: &TxOptions,
        mode: CallMode,
    ) -> Result<CallOutcome>;

    /// Unsigned RLP encoding of the `swap` call with `tx` applied.
    async fn unsigned_swap_tx(&self, args: &SwapCallArgs, tx: &TxOptions) -> Result<Bytes>;
}

/// Collaborators for one chain deployment, resolved once at setup.
#[derive(Clone)]
pub struct DexContext {
    pub dex: Arc<dyn DexEntryPoint>,
    pub router: Option<Arc<dyn DexEntryPoint>>,
    pub router_bypass: Option<Arc<dyn DexEntryPoint>>,
    pub impact: Arc<dyn ImpactQuery>,
    pub hot_path: Arc<dyn HotPathFlagReader>,
    pub native: Arc<dyn NativeAssetView>,
    pub pool_index: U256,
    /// Network default that routes swaps through the cold command path.
    pub dflt_cold_swap: bool,
}

/// Orders a pair canonically: the token with the smaller address is base.
pub fn sort_base_quote(
    a: Arc<dyn TokenView>,
    b: Arc<dyn TokenView>,
) -> (Arc<dyn TokenView>, Arc<dyn TokenView>) {
    if a.address() < b.address() { (a, b) } else { (b, a) }
}
