use std::sync::Arc;

use anyhow::{Context, Result};
use crocswap_planner::{
    config::{AppConfig, SwapExecOpts, SwapPlanOpts},
    dex::{Connection, StaticToken, TokenView, sort_base_quote},
    models::TokenQty,
    swap::SwapPlan,
    utils,
};
use ethers::types::Address;

fn env_token(prefix: &str) -> Result<StaticToken> {
    let address: Address = std::env::var(format!("{prefix}_TOKEN"))
        .with_context(|| format!("Set {prefix}_TOKEN to the token address (zero for native)"))?
        .parse()?;
    let decimals: u8 = std::env::var(format!("{prefix}_DECIMALS"))
        .unwrap_or_else(|_| "18".into())
        .parse()?;
    Ok(StaticToken::new(address, decimals))
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1" || v == "true")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cfg = AppConfig::load()?;
    tracing::info!(
        chain_id = cfg.chain.chain_id,
        dex = ?cfg.chain.addrs.dex,
        pool_index = cfg.chain.pool_index,
        "[INIT] crocswap-planner starting"
    );

    let conn = Connection::connect(&cfg.rpc_url, cfg.private_key.as_deref(), &cfg.chain).await?;
    let ctx = conn.context(&cfg.chain);

    let sell_token: Arc<dyn TokenView> = Arc::new(env_token("SELL")?);
    let buy_token: Arc<dyn TokenView> = Arc::new(env_token("BUY")?);
    let (base, quote) = sort_base_quote(sell_token.clone(), buy_token.clone());
    let pool = conn.pool(&cfg.chain, base.as_ref(), quote.as_ref());

    let qty_is_buy = env_flag("QTY_IS_BUY");
    let qty = std::env::var("QTY").context("Set QTY to the display quantity to trade")?;
    let qty = TokenQty::Display(qty.parse()?);

    let plan = SwapPlan::new(
        sell_token,
        buy_token,
        qty,
        qty_is_buy,
        pool,
        ctx,
        SwapPlanOpts {
            slippage: cfg.slippage,
        },
    )
    .await?;

    let impact = plan.impact();
    tracing::info!(
        sell_qty = %impact.sell_qty,
        buy_qty = %impact.buy_qty,
        final_price = impact.final_price,
        percent_change = impact.percent_change,
        "[SWAP] predicted impact"
    );

    let opts = SwapExecOpts::default();
    let simulated = plan.simulate(&opts).await?;
    tracing::info!(?simulated, "[SWAP] simulation succeeded");

    if env_flag("SUBMIT") {
        let outcome = plan.swap(&opts).await?;
        tracing::info!(?outcome, "[SWAP] submitted");
    } else {
        tracing::info!("[SWAP] dry run; set SUBMIT=1 to send the transaction");
    }
    Ok(())
}
