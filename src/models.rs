//! Shared data structures used throughout the crate.

use bigdecimal::BigDecimal;
use ethers::{
    abi::{Token, encode},
    types::{Address, Bytes, TxHash, U256},
};

use crate::errors::{AppError, Result};

/// Token quantity as supplied by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenQty {
    /// Raw on-chain integer units.
    Raw(U256),
    /// Human display units, scaled by the token's decimals.
    Display(BigDecimal),
}

/// Whether each side of the pair settles against the caller's dex surplus
/// collateral instead of a token transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurplusFlags {
    pub base: bool,
    pub quote: bool,
}

impl SurplusFlags {
    pub fn new(base: bool, quote: bool) -> Self {
        Self { base, quote }
    }

    /// Packs into the contract's `reserveFlags` byte: bit0 base, bit1 quote.
    pub fn encode(self) -> u8 {
        (self.base as u8) | ((self.quote as u8) << 1)
    }
}

/// How a contract call is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Sign and broadcast; the only state-mutating mode.
    Submit,
    /// Static call against the latest block.
    Simulate,
    EstimateGas,
}

/// Result of a dispatched contract call, shaped by its `CallMode`.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Submitted(TxHash),
    SwapFlows { base_flow: i128, quote_flow: i128 },
    CommandOutput(Bytes),
    GasEstimate(U256),
}

impl CallOutcome {
    pub fn gas_estimate(&self) -> Option<U256> {
        match self {
            CallOutcome::GasEstimate(gas) => Some(*gas),
            _ => None,
        }
    }
}

/// Transaction-level overrides attached to a contract call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Native asset attached as `msg.value`.
    pub value: Option<U256>,
    pub gas_limit: Option<U256>,
}

/// Argument tuple of the dex's direct `swap` entry point. The same tuple,
/// ABI-encoded, is the payload of the hot proxy command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCallArgs {
    pub base: Address,
    pub quote: Address,
    pub pool_idx: U256,
    pub is_buy: bool,
    pub in_base_qty: bool,
    pub qty: u128,
    pub tip: u16,
    pub limit_price: u128,
    pub min_out: u128,
    pub reserve_flags: u8,
}

impl SwapCallArgs {
    /// Standard ABI tuple encoding (ten static words).
    pub fn abi_encode(&self) -> Bytes {
        encode(&[
            Token::Address(self.base),
            Token::Address(self.quote),
            Token::Uint(self.pool_idx),
            Token::Bool(self.is_buy),
            Token::Bool(self.in_base_qty),
            Token::Uint(U256::from(self.qty)),
            Token::Uint(U256::from(self.tip)),
            Token::Uint(U256::from(self.limit_price)),
            Token::Uint(U256::from(self.min_out)),
            Token::Uint(U256::from(self.reserve_flags)),
        ])
        .into()
    }
}

/// Half-open tick interval `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRange {
    pub low: i32,
    pub high: i32,
}

impl TickRange {
    pub fn new(low: i32, high: i32) -> Result<Self> {
        if low >= high {
            return Err(AppError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn contains(&self, tick: i32) -> bool {
        tick >= self.low && tick < self.high
    }
}

/// Narrows a 256-bit quantity to the `uint128` width the contract accepts.
pub fn to_u128(value: U256, field: &'static str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(AppError::QtyOverflow(field));
    }
    Ok(value.as_u128())
}
