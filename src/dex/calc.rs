//! Price, tick and concentrated-liquidity math used by the planners.
//!
//! Dex prices are base-per-quote in raw token units. On-chain they are carried
//! as Q64.64 square roots.

use ethers::types::U256;
use uniswap_v3_math::tick_math::get_sqrt_ratio_at_tick;

use crate::errors::Result;

/// Lowest Q64.64 square-root price the dex accepts.
pub const MIN_SQRT_PRICE: u128 = 65538;
/// Highest Q64.64 square-root price the dex accepts.
pub const MAX_SQRT_PRICE: u128 = 21267430153580247136652501917186561138;

/// Extreme price limit in the direction of a trade: a buyer of quote (seller
/// of base) pushes the price up.
pub fn limit_price(sell_base: bool) -> u128 {
    if sell_base {
        MAX_SQRT_PRICE
    } else {
        MIN_SQRT_PRICE
    }
}

/// Encodes a raw price into its Q64.64 square-root representation.
pub fn encode_price(price: f64) -> U256 {
    let sqrt_q64 = price.max(0.0).sqrt() * 2.0_f64.powi(64);
    if !sqrt_q64.is_finite() {
        return U256::from(MAX_SQRT_PRICE);
    }
    // saturating float -> int conversion
    U256::from(sqrt_q64.floor() as u128)
}

/// Decodes a Q64.64 square-root price into a raw price.
pub fn decode_price(sqrt_q64: U256) -> f64 {
    let sqrt = u256_to_f64(sqrt_q64) / 2.0_f64.powi(64);
    sqrt * sqrt
}

/// Raw price at a tick, `1.0001^tick`.
pub fn tick_to_price(tick: i32) -> Result<f64> {
    let sqrt_x96: alloy_primitives::U256 = get_sqrt_ratio_at_tick(tick)?;
    let sqrt = sqrt_x96.to_string().parse::<f64>().unwrap_or(0.0) / 2.0_f64.powi(96);
    Ok(sqrt * sqrt)
}

/// Scales a raw price into display units, optionally as quote-per-base.
pub fn to_display_price(price: f64, base_decimals: u8, quote_decimals: u8, inverted: bool) -> f64 {
    let scaled = price * 10_f64.powi(quote_decimals as i32 - base_decimals as i32);
    if inverted { 1.0 / scaled } else { scaled }
}

/// Base tokens held by `liq` concentrated over `[lower, upper]` at `price`.
pub fn base_token_for_conc_liq(price: f64, liq: U256, lower: f64, upper: f64) -> U256 {
    let price = price.clamp(lower, upper);
    f64_to_u256(u256_to_f64(liq) * (price.sqrt() - lower.sqrt()))
}

/// Quote tokens held by `liq` concentrated over `[lower, upper]` at `price`.
pub fn quote_token_for_conc_liq(price: f64, liq: U256, lower: f64, upper: f64) -> U256 {
    let price = price.clamp(lower, upper);
    f64_to_u256(u256_to_f64(liq) * (1.0 / price.sqrt() - 1.0 / upper.sqrt()))
}

/// Fraction of a fresh concentrated deposit's value held in the base token.
///
/// Zero below the range (all quote), one above it (all base).
pub fn conc_deposit_balance(price: f64, lower: f64, upper: f64) -> f64 {
    if price <= lower {
        return 0.0;
    }
    if price >= upper {
        return 1.0;
    }
    // per unit of liquidity, both legs valued in base
    let base = price.sqrt() - lower.sqrt();
    let quote_in_base = price.sqrt() - price / upper.sqrt();
    base / (base + quote_in_base)
}

fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(0.0)
}

fn f64_to_u256(value: f64) -> U256 {
    if value.is_finite() && value > 0.0 {
        U256::from(value.floor() as u128)
    } else {
        U256::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1e-12)
    }

    #[test]
    fn price_round_trips_through_q64() {
        for price in [0.0004, 1.0, 1850.25, 3.2e9] {
            let decoded = decode_price(encode_price(price));
            assert!(close(decoded, price, 1e-9), "{price} -> {decoded}");
        }
    }

    #[test]
    fn unit_price_is_two_pow_64() {
        assert_eq!(encode_price(1.0), U256::one() << 64);
    }

    #[test]
    fn limit_price_follows_direction() {
        assert_eq!(limit_price(true), MAX_SQRT_PRICE);
        assert_eq!(limit_price(false), MIN_SQRT_PRICE);
        assert!(decode_price(U256::from(MIN_SQRT_PRICE)) < 1e-28);
    }

    #[test]
    fn tick_prices() {
        assert!(close(tick_to_price(0).unwrap(), 1.0, 1e-12));
        assert!(close(tick_to_price(100).unwrap(), 1.0001_f64.powi(100), 1e-9));
        assert!(close(tick_to_price(-69090).unwrap(), 1.0001_f64.powi(-69090), 1e-9));
        assert!(tick_to_price(900_000).is_err());
    }

    #[test]
    fn display_price_scales_by_decimals() {
        // 1e-9 raw base per raw quote with 6-decimal base and 18-decimal quote
        let display = to_display_price(1e-9, 6, 18, false);
        assert!(close(display, 1000.0, 1e-12));
        assert!(close(to_display_price(1e-9, 6, 18, true), 0.001, 1e-12));
    }

    #[test]
    fn deposit_balance_bounds() {
        assert_eq!(conc_deposit_balance(0.5, 1.0, 4.0), 0.0);
        assert_eq!(conc_deposit_balance(5.0, 1.0, 4.0), 1.0);
        let mid = conc_deposit_balance(2.0, 1.0, 4.0);
        assert!(mid > 0.0 && mid < 1.0);
        // symmetric range around spot in log space holds equal value
        assert!(close(conc_deposit_balance(1.0, 0.25, 4.0), 0.5, 1e-12));
    }

    #[test]
    fn collateral_at_range_edges() {
        let liq = U256::from(1_000_000u64);
        // above range everything sits in base
        let base = base_token_for_conc_liq(9.0, liq, 1.0, 4.0);
        let quote = quote_token_for_conc_liq(9.0, liq, 1.0, 4.0);
        assert_eq!(base, U256::from(1_000_000u64));
        assert_eq!(quote, U256::zero());
        // below range everything sits in quote
        let base = base_token_for_conc_liq(0.25, liq, 1.0, 4.0);
        let quote = quote_token_for_conc_liq(0.25, liq, 1.0, 4.0);
        assert_eq!(base, U256::zero());
        assert_eq!(quote, U256::from(500_000u64));
    }
}
