use futures::try_join;

use super::PoolView;
use crate::errors::Result;

/// Immutable snapshot of a pool's curve state, captured once and reused by a
/// plan for all of its derived quantities. It is never refreshed; build a new
/// plan to observe newer state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolSnapshot {
    /// Raw base-per-quote price.
    pub spot_price: f64,
    pub spot_tick: i32,
}

impl PoolSnapshot {
    pub fn new(spot_price: f64, spot_tick: i32) -> Self {
        Self {
            spot_price,
            spot_tick,
        }
    }

    pub async fn capture(pool: &dyn PoolView) -> Result<Self> {
        let (spot_price, spot_tick) = try_join!(pool.spot_price(), pool.spot_tick())?;
        Ok(Self::new(spot_price, spot_tick))
    }
}
