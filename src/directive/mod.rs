//! Long-form order directives: a hop/pool instruction tree and its wire encoding.

pub mod builder;
pub mod encode;

pub use builder::{
    AmbientDirective, ChainingDirective, ConcentratedDirective, HopDirective, HopId,
    ImproveDirective, OrderDirective, PassiveDirective, PoolDirective, PoolId, RangeId, RollType,
    SettlementDirective, SwapDirective,
};
pub use encode::{LONG_FORM_SCHEMA, encode_directive, encoded_len};

/// `userCmd` callpath that accepts a long-form directive.
pub const LONG_PATH: u16 = 4;
