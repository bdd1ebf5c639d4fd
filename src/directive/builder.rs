use ethers::types::{Address, I256, U256};

use crate::errors::{AppError, Result};

/// Quantity substitution code understood by the dex for liquidity and swap legs.
///
/// Only codes with an established meaning are named here; the contract
/// defines others that this crate never emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum RollType {
    /// Use the encoded quantity as-is.
    #[default]
    Literal = 0,
    /// Quantity is a basis-point fraction of the settled flow so far.
    SettledFraction = 4,
    /// Use the entire balance settled so far in the hop.
    SettledBalance = 5,
}

impl RollType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementDirective {
    pub token: Address,
    /// Signed worst-case flow the caller accepts for this token.
    pub limit_qty: I256,
    pub dust_thresh: U256,
    pub use_surplus: bool,
}

impl SettlementDirective {
    /// Settlement with an effectively unlimited (2^125) flow limit.
    pub fn simple(token: Address) -> Self {
        Self {
            token,
            limit_qty: I256::from_raw(U256::one() << 125),
            dust_thresh: U256::zero(),
            use_surplus: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImproveDirective {
    pub is_enabled: bool,
    pub use_base_side: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainingDirective {
    pub roll_exit: bool,
    pub swap_defer: bool,
    pub offset_surplus: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapDirective {
    pub is_buy: bool,
    pub in_base_qty: bool,
    pub roll_type: RollType,
    pub qty: U256,
    pub limit_price: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientDirective {
    pub is_add: bool,
    pub roll_type: RollType,
    pub liquidity: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcentratedDirective {
    pub low_tick: i32,
    pub high_tick: i32,
    pub is_rel_tick: bool,
    pub is_add: bool,
    pub roll_type: RollType,
    /// Magnitude only; direction is carried by `is_add`.
    pub liquidity: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassiveDirective {
    pub ambient: AmbientDirective,
    pub concentrated: Vec<ConcentratedDirective>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDirective {
    pub pool_idx: U256,
    pub passive: PassiveDirective,
    pub swap: SwapDirective,
    pub chain: ChainingDirective,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopDirective {
    pub pools: Vec<PoolDirective>,
    pub settlement: SettlementDirective,
    pub improve: ImproveDirective,
}

/// Handle to a hop appended with [`OrderDirective::append_hop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopId(usize);

/// Handle to a pool appended with [`OrderDirective::append_pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolId {
    hop: usize,
    pool: usize,
}

impl PoolId {
    pub fn hop(&self) -> HopId {
        HopId(self.hop)
    }
}

/// Handle to a concentrated range action inside a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeId {
    hop: usize,
    pool: usize,
    range: usize,
}

impl RangeId {
    pub fn pool(&self) -> PoolId {
        PoolId {
            hop: self.hop,
            pool: self.pool,
        }
    }
}

/// Instruction tree for one chained dex transaction.
///
/// Elements are append-only and addressed through the handles returned on
/// append, so hops and pools are always mutated explicitly rather than
/// through an implicit "last element" cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDirective {
    pub open: SettlementDirective,
    pub hops: Vec<HopDirective>,
}

impl OrderDirective {
    pub fn new(open_token: Address) -> Self {
        Self {
            open: SettlementDirective::simple(open_token),
            hops: Vec::new(),
        }
    }

    pub fn append_hop(&mut self, next_token: Address) -> HopId {
        self.hops.push(HopDirective {
            pools: Vec::new(),
            settlement: SettlementDirective::simple(next_token),
            improve: ImproveDirective::default(),
        });
        HopId(self.hops.len() - 1)
    }

    pub fn append_pool(&mut self, hop: HopId, pool_idx: impl Into<U256>) -> Result<PoolId> {
        let pools = &mut self.hop_mut(hop)?.pools;
        pools.push(PoolDirective {
            pool_idx: pool_idx.into(),
            passive: PassiveDirective::default(),
            swap: SwapDirective::default(),
            chain: ChainingDirective::default(),
        });
        Ok(PoolId {
            hop: hop.0,
            pool: pools.len() - 1,
        })
    }

    /// Appends a concentrated liquidity add of `|liq|` over `[low_tick, high_tick)`.
    pub fn append_range_mint(
        &mut self,
        pool: PoolId,
        low_tick: i32,
        high_tick: i32,
        liq: I256,
    ) -> Result<RangeId> {
        if low_tick >= high_tick {
            return Err(AppError::InvalidRange {
                low: low_tick,
                high: high_tick,
            });
        }
        let ranges = &mut self.pool_mut(pool)?.passive.concentrated;
        ranges.push(ConcentratedDirective {
            low_tick,
            high_tick,
            is_rel_tick: false,
            is_add: true,
            roll_type: RollType::Literal,
            liquidity: liq.unsigned_abs(),
        });
        Ok(RangeId {
            hop: pool.hop,
            pool: pool.pool,
            range: ranges.len() - 1,
        })
    }

    /// Same as [`append_range_mint`](Self::append_range_mint) but removes liquidity.
    pub fn append_range_burn(
        &mut self,
        pool: PoolId,
        low_tick: i32,
        high_tick: i32,
        liq: I256,
    ) -> Result<RangeId> {
        let range = self.append_range_mint(pool, low_tick, high_tick, liq)?;
        self.range_mut(range)?.is_add = false;
        Ok(range)
    }

    pub fn hop(&self, id: HopId) -> Result<&HopDirective> {
        self.hops
            .get(id.0)
            .ok_or_else(|| AppError::UnknownHandle(format!("{id:?}")))
    }

    pub fn hop_mut(&mut self, id: HopId) -> Result<&mut HopDirective> {
        self.hops
            .get_mut(id.0)
            .ok_or_else(|| AppError::UnknownHandle(format!("{id:?}")))
    }

    pub fn pool(&self, id: PoolId) -> Result<&PoolDirective> {
        self.hop(id.hop())?
            .pools
            .get(id.pool)
            .ok_or_else(|| AppError::UnknownHandle(format!("{id:?}")))
    }

    pub fn pool_mut(&mut self, id: PoolId) -> Result<&mut PoolDirective> {
        self.hop_mut(id.hop())?
            .pools
            .get_mut(id.pool)
            .ok_or_else(|| AppError::UnknownHandle(format!("{id:?}")))
    }

    pub fn range(&self, id: RangeId) -> Result<&ConcentratedDirective> {
        self.pool(id.pool())?
            .passive
            .concentrated
            .get(id.range)
            .ok_or_else(|| AppError::UnknownHandle(format!("{id:?}")))
    }

    pub fn range_mut(&mut self, id: RangeId) -> Result<&mut ConcentratedDirective> {
        self.pool_mut(id.pool())?
            .passive
            .concentrated
            .get_mut(id.range)
            .ok_or_else(|| AppError::UnknownHandle(format!("{id:?}")))
    }
}
