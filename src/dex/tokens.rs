use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::types::{Address, U256};
use num_bigint::{BigInt, Sign};
use num_traits::Signed;

use super::TokenView;
use crate::errors::{AppError, Result};
use crate::models::TokenQty;

/// Token with metadata known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticToken {
    pub address: Address,
    pub decimals: u8,
}

impl StaticToken {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }

    /// The chain's native asset (zero address, 18 decimals).
    pub fn native() -> Self {
        Self::new(Address::zero(), 18)
    }
}

#[async_trait]
impl TokenView for StaticToken {
    fn address(&self) -> Address {
        self.address
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    async fn norm_qty(&self, qty: &TokenQty) -> Result<U256> {
        match qty {
            TokenQty::Raw(raw) => Ok(*raw),
            TokenQty::Display(display) => display_to_raw(display, self.decimals),
        }
    }

    async fn to_display(&self, qty: U256) -> Result<BigDecimal> {
        Ok(raw_to_display(qty, self.decimals))
    }

    async fn round_qty(&self, qty: &BigDecimal) -> Result<U256> {
        display_to_raw(qty, self.decimals)
    }
}

/// `raw / 10^decimals`, exact.
pub fn raw_to_display(raw: U256, decimals: u8) -> BigDecimal {
    let mut bytes = [0u8; 32];
    raw.to_big_endian(&mut bytes);
    BigDecimal::new(BigInt::from_bytes_be(Sign::Plus, &bytes), decimals as i64)
}

/// `display * 10^decimals`, truncated toward zero.
pub fn display_to_raw(display: &BigDecimal, decimals: u8) -> Result<U256> {
    let scale = BigDecimal::new(BigInt::from(1), -(decimals as i64));
    let (digits, _) = (display * scale).with_scale(0).into_bigint_and_exponent();
    if digits.is_negative() {
        return Err(AppError::Other(format!("negative token quantity: {display}")));
    }
    let (_, bytes) = digits.to_bytes_be();
    if bytes.len() > 32 {
        return Err(AppError::QtyOverflow("display quantity"));
    }
    Ok(U256::from_big_endian(&bytes))
}

/// Parses a decimal string such as `"1.5"` into display units.
pub fn parse_display(qty: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(qty).map_err(|e| AppError::Config(format!("bad quantity {qty}: {e}")))
}
