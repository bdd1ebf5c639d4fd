use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use ethers::types::{Bytes, U256};
use futures::try_join;
use tracing::{debug, info};

use crate::config::{PathMode, SettlementOpts, SwapExecOpts, SwapPlanOpts};
use crate::dex::calc::{decode_price, limit_price};
use crate::dex::{
    DexContext, DexEntryPoint, HOT_PROXY_IDX, ImpactRequest, PoolView, TokenView,
    sort_base_quote,
};
use crate::errors::{AppError, Result};
use crate::models::{
    CallMode, CallOutcome, SurplusFlags, SwapCallArgs, TokenQty, TxOptions, to_u128,
};

use super::Impact;

/// Gas added on top of an estimate before submission.
pub const GAS_PADDING: u64 = 15_000;

const TIP: u16 = 0;

/// Stands in for the signature fields an unsigned transaction lacks.
const FAUX_SIG_FILLER: [u8; 80] = [0xff; 80];

/// A single-pool swap between two tokens, canonicalized to the pool's
/// base/quote order.
///
/// The [`Impact`] is queried once at construction and every bound derived
/// from it reuses that snapshot; prices may move before submission and the
/// slippage-bounded quantity is the only protection against that.
pub struct SwapPlan {
    base_token: Arc<dyn TokenView>,
    quote_token: Arc<dyn TokenView>,
    sell_base: bool,
    qty_in_base: bool,
    qty: U256,
    slippage: f64,
    impact: Impact,
    path_mode: PathMode,
    ctx: DexContext,
}

impl SwapPlan {
    /// Plans selling `sell` for `buy`. `qty` is denominated in `buy` when
    /// `qty_is_buy` is set, otherwise in `sell`.
    pub async fn new(
        sell: Arc<dyn TokenView>,
        buy: Arc<dyn TokenView>,
        qty: TokenQty,
        qty_is_buy: bool,
        pool: Arc<dyn PoolView>,
        ctx: DexContext,
        opts: SwapPlanOpts,
    ) -> Result<Self> {
        let sell_addr = sell.address();
        let (base_token, quote_token) = sort_base_quote(sell, buy);
        let sell_base = base_token.address() == sell_addr;
        let qty_in_base = sell_base != qty_is_buy;

        let qty_token = if qty_in_base { &base_token } else { &quote_token };
        let qty = qty_token.norm_qty(&qty).await?;

        let request = ImpactRequest {
            base: base_token.address(),
            quote: quote_token.address(),
            pool_idx: ctx.pool_index,
            is_buy: sell_base,
            in_base_qty: qty_in_base,
            qty: to_u128(qty, "qty")?,
            tip: TIP,
            limit_price: limit_price(sell_base),
        };
        let (flows, start_price) =
            try_join!(ctx.impact.calc_impact(&request), pool.display_price())?;

        let (base_qty, quote_qty, final_price) = try_join!(
            base_token.to_display(flows.base_flow.unsigned_abs()),
            quote_token.to_display(flows.quote_flow.unsigned_abs()),
            pool.to_display_price(decode_price(flows.final_price)),
        )?;
        let impact = if sell_base {
            Impact::new(base_qty, quote_qty, start_price, final_price)
        } else {
            Impact::new(quote_qty, base_qty, start_price, final_price)
        };

        info!(
            base = ?base_token.address(),
            quote = ?quote_token.address(),
            sell_base,
            qty_in_base,
            %qty,
            sell_qty = %impact.sell_qty,
            buy_qty = %impact.buy_qty,
            percent_change = impact.percent_change,
            "[SWAP] plan built"
        );

        Ok(Self {
            base_token,
            quote_token,
            sell_base,
            qty_in_base,
            qty,
            slippage: opts.slippage,
            impact,
            path_mode: PathMode::Auto,
            ctx,
        })
    }

    pub fn base_token(&self) -> &Arc<dyn TokenView> {
        &self.base_token
    }

    pub fn quote_token(&self) -> &Arc<dyn TokenView> {
        &self.quote_token
    }

    pub fn sell_base(&self) -> bool {
        self.sell_base
    }

    pub fn qty_in_base(&self) -> bool {
        self.qty_in_base
    }

    /// Normalized quantity in raw units of the quantity-side token.
    pub fn qty(&self) -> U256 {
        self.qty
    }

    pub fn slippage(&self) -> f64 {
        self.slippage
    }

    pub fn impact(&self) -> &Impact {
        &self.impact
    }

    pub fn path_mode(&self) -> PathMode {
        self.path_mode
    }

    pub fn use_auto(&mut self) -> &mut Self {
        self.path_mode = PathMode::Auto;
        self
    }

    pub fn use_router(&mut self) -> &mut Self {
        self.path_mode = PathMode::Router;
        self
    }

    pub fn use_bypass(&mut self) -> &mut Self {
        self.path_mode = PathMode::Bypass;
        self
    }

    pub fn force_proxy(&mut self) -> &mut Self {
        self.path_mode = PathMode::Proxy;
        self
    }

    /// Estimates gas and submits the swap once.
    pub async fn swap(&self, opts: &SwapExecOpts) -> Result<CallOutcome> {
        let opts = self.with_gas_estimate(opts).await?;
        self.hot_path_call(&opts, CallMode::Submit).await
    }

    /// Static call with the same arguments `swap` would submit.
    pub async fn simulate(&self, opts: &SwapExecOpts) -> Result<CallOutcome> {
        let opts = self.with_gas_estimate(opts).await?;
        self.hot_path_call(&opts, CallMode::Simulate).await
    }

    pub async fn estimate_gas(&self, opts: &SwapExecOpts) -> Result<U256> {
        self.hot_path_call(opts, CallMode::EstimateGas)
            .await?
            .gas_estimate()
            .ok_or_else(|| AppError::Other("entry point returned no gas estimate".into()))
    }

    /// Unsigned RLP of the direct dex `swap` call with a filler where the
    /// signature would go. Only suitable for estimating L1 data fees on
    /// rollups; it is not a valid transaction.
    pub async fn faux_raw_tx(&self, opts: &SwapExecOpts) -> Result<Bytes> {
        let args = self.call_args(opts).await?;
        let tx = self.build_tx_args(opts).await?;
        let unsigned = self.ctx.dex.unsigned_swap_tx(&args, &tx).await?;
        let mut raw = unsigned.to_vec();
        raw.extend_from_slice(&FAUX_SIG_FILLER);
        Ok(Bytes::from(raw))
    }

    /// Bound on the floating side of the trade: the minimum received when the
    /// sold quantity is fixed, or the maximum paid when the bought quantity is.
    pub async fn calc_slip_qty(&self) -> Result<U256> {
        let qty_is_sell = self.sell_base == self.qty_in_base;
        let slippage = BigDecimal::from_str(&self.slippage.to_string())
            .map_err(|e| AppError::Other(format!("bad slippage {}: {e}", self.slippage)))?;
        let one = BigDecimal::from(1);

        let bound = if qty_is_sell {
            &self.impact.buy_qty * (one - slippage)
        } else {
            &self.impact.sell_qty * (one + slippage)
        };
        let bound_token = if self.qty_in_base {
            &self.quote_token
        } else {
            &self.base_token
        };
        bound_token.round_qty(&bound).await
    }

    /// Price protection is delegated to the quantity bound, so the limit is
    /// the extreme price in the trade's direction.
    pub fn calc_limit_price(&self) -> u128 {
        limit_price(self.sell_base)
    }

    /// Argument tuple shared by the direct and proxied swap calls.
    pub async fn call_args(&self, opts: &SwapExecOpts) -> Result<SwapCallArgs> {
        Ok(SwapCallArgs {
            base: self.base_token.address(),
            quote: self.quote_token.address(),
            pool_idx: self.ctx.pool_index,
            is_buy: self.sell_base,
            in_base_qty: self.qty_in_base,
            qty: to_u128(self.qty, "qty")?,
            tip: TIP,
            limit_price: self.calc_limit_price(),
            min_out: to_u128(self.calc_slip_qty().await?, "slippage bound")?,
            reserve_flags: self.surplus_flags(opts).encode(),
        })
    }

    async fn with_gas_estimate(&self, opts: &SwapExecOpts) -> Result<SwapExecOpts> {
        let gas_est = match opts.gas_est {
            Some(gas) => gas,
            None => self.estimate_gas(opts).await?,
        };
        Ok(SwapExecOpts {
            gas_est: Some(gas_est),
            ..opts.clone()
        })
    }

    async fn hot_path_call(&self, opts: &SwapExecOpts, mode: CallMode) -> Result<CallOutcome> {
        match self.path_mode {
            PathMode::Router => {
                let router = self
                    .ctx
                    .router
                    .as_ref()
                    .ok_or(AppError::RouterUnavailable("Router"))?;
                self.swap_call(router.as_ref(), opts, mode).await
            }
            PathMode::Bypass => {
                let bypass = self
                    .ctx
                    .router_bypass
                    .as_ref()
                    .ok_or(AppError::RouterUnavailable("Router bypass"))?;
                self.swap_call(bypass.as_ref(), opts, mode).await
            }
            PathMode::Proxy => self.user_cmd_call(opts, mode).await,
            PathMode::Auto if self.ctx.dflt_cold_swap => self.user_cmd_call(opts, mode).await,
            PathMode::Auto => {
                if self.ctx.hot_path.is_hot_path_open().await? {
                    self.swap_call(self.ctx.dex.as_ref(), opts, mode).await
                } else {
                    self.user_cmd_call(opts, mode).await
                }
            }
        }
    }

    async fn swap_call(
        &self,
        target: &dyn DexEntryPoint,
        opts: &SwapExecOpts,
        mode: CallMode,
    ) -> Result<CallOutcome> {
        let args = self.call_args(opts).await?;
        let tx = self.build_tx_args(opts).await?;
        debug!(?mode, path = "swap", "[SWAP] dispatching");
        target.swap(&args, &tx, mode).await
    }

    async fn user_cmd_call(&self, opts: &SwapExecOpts, mode: CallMode) -> Result<CallOutcome> {
        let args = self.call_args(opts).await?;
        let tx = self.build_tx_args(opts).await?;
        debug!(?mode, path = "userCmd", "[SWAP] dispatching");
        self.ctx
            .dex
            .user_cmd(HOT_PROXY_IDX, args.abi_encode(), &tx, mode)
            .await
    }

    fn surplus_flags(&self, opts: &SwapExecOpts) -> SurplusFlags {
        match opts.settlement {
            SettlementOpts::Uniform(flag) => SurplusFlags::new(flag, flag),
            SettlementOpts::Split {
                buy_dex_surplus,
                sell_dex_surplus,
            } => {
                if self.sell_base {
                    SurplusFlags::new(sell_dex_surplus, buy_dex_surplus)
                } else {
                    SurplusFlags::new(buy_dex_surplus, sell_dex_surplus)
                }
            }
        }
    }

    async fn build_tx_args(&self, opts: &SwapExecOpts) -> Result<TxOptions> {
        Ok(TxOptions {
            value: self.native_value(self.surplus_flags(opts)).await?,
            gas_limit: opts.gas_est.map(|gas| gas + U256::from(GAS_PADDING)),
        })
    }

    /// `msg.value` to attach. Only a sold native base needs one; the floating
    /// side is sized at its slippage bound and the contract refunds the rest.
    async fn native_value(&self, surplus: SurplusFlags) -> Result<Option<U256>> {
        if !self.sell_base || !self.base_token.is_native() {
            return Ok(None);
        }
        let value = if self.qty_in_base {
            self.qty
        } else {
            self.calc_slip_qty().await?
        };
        if surplus.base {
            Ok(Some(
                self.ctx.native.amount_needed_beyond_surplus(value).await?,
            ))
        } else {
            Ok(Some(value))
        }
    }
}
