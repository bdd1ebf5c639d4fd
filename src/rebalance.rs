//! Moves an out-of-range concentrated position into a new range with a single
//! burn, swap and mint directive.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use ethers::types::{I256, U256};
use tracing::info;

use crate::config::{RebalanceOpts, SwapPlanOpts};
use crate::dex::calc::{
    base_token_for_conc_liq, conc_deposit_balance, encode_price, quote_token_for_conc_liq,
    tick_to_price,
};
use crate::dex::{DexContext, PoolSnapshot, PoolView, TokenView};
use crate::directive::{LONG_PATH, OrderDirective, RollType, encode_directive};
use crate::errors::{AppError, Result};
use crate::models::{CallMode, CallOutcome, TickRange, TokenQty, TxOptions};
use crate::swap::SwapPlan;

/// Settlement bounds for the root and first hop. Finite, unlike the builder
/// default.
const OPEN_LIMIT_QTY: i64 = -1_000_000_000_000;
const HOP_LIMIT_QTY: i64 = -10_000_000_000;
const BPS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceTarget {
    /// Range the liquidity moves into.
    pub mint: TickRange,
    /// Range currently holding the liquidity.
    pub burn: TickRange,
    pub liquidity: U256,
}

pub struct RebalancePlan {
    pool: Arc<dyn PoolView>,
    base_token: Arc<dyn TokenView>,
    quote_token: Arc<dyn TokenView>,
    target: RebalanceTarget,
    snapshot: PoolSnapshot,
    slippage: f64,
    ctx: DexContext,
}

impl RebalancePlan {
    pub async fn new(
        pool: Arc<dyn PoolView>,
        base_token: Arc<dyn TokenView>,
        quote_token: Arc<dyn TokenView>,
        target: RebalanceTarget,
        ctx: DexContext,
        opts: RebalanceOpts,
    ) -> Result<Self> {
        let snapshot = PoolSnapshot::capture(pool.as_ref()).await?;
        info!(
            spot_tick = snapshot.spot_tick,
            burn_low = target.burn.low,
            burn_high = target.burn.high,
            mint_low = target.mint.low,
            mint_high = target.mint.high,
            "[REBAL] captured pool snapshot"
        );
        Ok(Self {
            pool,
            base_token,
            quote_token,
            target,
            snapshot,
            slippage: opts.slippage,
            ctx,
        })
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.snapshot
    }

    pub fn target(&self) -> &RebalanceTarget {
        &self.target
    }

    /// Which side the old range has converted entirely into. Fails when the
    /// spot tick is still inside `[burn.low, burn.high)`.
    pub fn is_base_out_of_range(&self) -> Result<bool> {
        let tick = self.snapshot.spot_tick;
        let burn = self.target.burn;
        if tick >= burn.high {
            Ok(true)
        } else if tick < burn.low {
            Ok(false)
        } else {
            Err(AppError::NotOutOfRange {
                tick,
                low: burn.low,
                high: burn.high,
            })
        }
    }

    /// Share of the mint range's ideal composition that must come from the
    /// out-of-range side.
    pub fn balance_percent(&self) -> Result<f64> {
        let base_share = conc_deposit_balance(
            self.snapshot.spot_price,
            tick_to_price(self.target.mint.low)?,
            tick_to_price(self.target.mint.high)?,
        );
        if self.is_base_out_of_range()? {
            Ok(1.0 - base_share)
        } else {
            Ok(base_share)
        }
    }

    /// Portion of the released collateral to swap, in basis points, padded by
    /// the slippage tolerance and capped at the whole balance.
    pub fn swap_fraction(&self) -> Result<u64> {
        let share = (self.balance_percent()? + self.slippage).min(1.0);
        Ok((share * BPS as f64).floor().max(0.0) as u64)
    }

    /// Raw collateral the old range holds, all on the out-of-range side.
    pub fn current_collateral(&self) -> Result<U256> {
        let lower = tick_to_price(self.target.burn.low)?;
        let upper = tick_to_price(self.target.burn.high)?;
        let collateral = if self.is_base_out_of_range()? {
            base_token_for_conc_liq(self.snapshot.spot_price, self.target.liquidity, lower, upper)
        } else {
            quote_token_for_conc_liq(self.snapshot.spot_price, self.target.liquidity, lower, upper)
        };
        Ok(collateral)
    }

    /// Raw collateral the swap leg converts to the other side.
    pub fn convert_collateral(&self) -> Result<U256> {
        Ok(self.current_collateral()? * U256::from(self.swap_fraction()?) / U256::from(BPS))
    }

    /// Display amount of the out-of-range token left for the mint.
    pub async fn mint_input(&self) -> Result<BigDecimal> {
        let remaining = self
            .current_collateral()?
            .saturating_sub(self.convert_collateral()?);
        let (sell, _) = self.pivot_tokens()?;
        sell.to_display(remaining).await
    }

    /// Predicted display output of the swap leg.
    pub async fn swap_output(&self) -> Result<BigDecimal> {
        let (sell, buy) = self.pivot_tokens()?;
        let plan = SwapPlan::new(
            sell,
            buy,
            TokenQty::Raw(self.convert_collateral()?),
            false,
            self.pool.clone(),
            self.ctx.clone(),
            SwapPlanOpts {
                slippage: self.slippage,
            },
        )
        .await?;
        Ok(plan.impact().buy_qty.clone())
    }

    pub fn format_directive(&self) -> Result<OrderDirective> {
        let sell_base = self.is_base_out_of_range()?;
        let (open_token, close_token) = self.pivot_tokens()?;
        let pool_idx = self.ctx.pool_index;
        let liquidity = signed_liquidity(self.target.liquidity)?;

        let mut directive = OrderDirective::new(open_token.address());
        let hop = directive.append_hop(close_token.address());

        let burn_pool = directive.append_pool(hop, pool_idx)?;
        directive.append_range_burn(
            burn_pool,
            self.target.burn.low,
            self.target.burn.high,
            liquidity,
        )?;
        let swap_fraction = self.swap_fraction()?;
        let price_mult = if sell_base {
            1.0 + self.slippage
        } else {
            1.0 - self.slippage
        };
        let pool = directive.pool_mut(burn_pool)?;
        pool.chain.swap_defer = true;
        pool.swap.roll_type = RollType::SettledFraction;
        pool.swap.qty = U256::from(swap_fraction);
        pool.swap.is_buy = sell_base;
        pool.swap.in_base_qty = sell_base;
        pool.swap.limit_price = encode_price(self.snapshot.spot_price * price_mult);

        let mint_pool = directive.append_pool(hop, pool_idx)?;
        let mint = directive.append_range_mint(
            mint_pool,
            self.target.mint.low,
            self.target.mint.high,
            I256::zero(),
        )?;
        directive.range_mut(mint)?.roll_type = RollType::SettledBalance;

        directive.open.limit_qty = I256::from(OPEN_LIMIT_QTY);
        directive.hop_mut(hop)?.settlement.limit_qty = I256::from(HOP_LIMIT_QTY);
        Ok(directive)
    }

    pub async fn rebal(&self) -> Result<CallOutcome> {
        self.send(CallMode::Submit).await
    }

    pub async fn sim_static(&self) -> Result<CallOutcome> {
        self.send(CallMode::Simulate).await
    }

    async fn send(&self, mode: CallMode) -> Result<CallOutcome> {
        let directive = self.format_directive()?;
        let encoded = encode_directive(&directive)?;
        info!(
            ?mode,
            sell_base = directive.hops[0].pools[0].swap.is_buy,
            swap_fraction = %directive.hops[0].pools[0].swap.qty,
            bytes = encoded.len(),
            "[REBAL] sending long-form directive"
        );
        self.ctx
            .dex
            .user_cmd(LONG_PATH, encoded, &TxOptions::default(), mode)
            .await
    }

    /// `(sell, buy)`: the out-of-range token first.
    fn pivot_tokens(&self) -> Result<(Arc<dyn TokenView>, Arc<dyn TokenView>)> {
        if self.is_base_out_of_range()? {
            Ok((self.base_token.clone(), self.quote_token.clone()))
        } else {
            Ok((self.quote_token.clone(), self.base_token.clone()))
        }
    }
}

fn signed_liquidity(liquidity: U256) -> Result<I256> {
    if liquidity.bit(255) {
        return Err(AppError::QtyOverflow("liquidity"));
    }
    Ok(I256::from_raw(liquidity))
}
