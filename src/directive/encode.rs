//! Bit-exact long-form wire encoding of an [`OrderDirective`].
//!
//! Widths: full integers are 32-byte big-endian, signed values carry a
//! leading sign byte (0 positive, 1 negative) before the magnitude, ticks use a
//! 3-byte magnitude, flags and small codes take one byte, and lists are
//! prefixed by a one-byte element count.

use ethers::types::{Address, Bytes, I256, U256};

use super::builder::{
    ChainingDirective, ConcentratedDirective, HopDirective, ImproveDirective, OrderDirective,
    PassiveDirective, PoolDirective, SettlementDirective, SwapDirective,
};
use crate::errors::{AppError, Result};

pub const LONG_FORM_SCHEMA: u8 = 1;

const FULL: usize = 32;
const SIGNED_FULL: usize = 1 + FULL;
const TICK: usize = 1 + 3;
const SETTLEMENT_LEN: usize = FULL + SIGNED_FULL + FULL + 1;
const CONCENTRATED_LEN: usize = TICK + TICK + 1 + 1 + 1 + FULL;
const SWAP_LEN: usize = 1 + 1 + FULL + FULL;
const MAX_TICK_MAGNITUDE: u32 = (1 << 24) - 1;

/// Serializes the directive into the bytes expected by the long-form callpath.
pub fn encode_directive(directive: &OrderDirective) -> Result<Bytes> {
    let mut buf = Vec::with_capacity(encoded_len(directive));
    buf.push(LONG_FORM_SCHEMA);
    put_settlement(&mut buf, &directive.open);
    put_list(&mut buf, "hop", &directive.hops, put_hop)?;
    Ok(buf.into())
}

/// Exact encoded size; depends only on list lengths.
pub fn encoded_len(directive: &OrderDirective) -> usize {
    1 + SETTLEMENT_LEN + 1 + directive.hops.iter().map(hop_len).sum::<usize>()
}

fn hop_len(hop: &HopDirective) -> usize {
    1 + hop.pools.iter().map(pool_len).sum::<usize>() + SETTLEMENT_LEN + 1
}

fn pool_len(pool: &PoolDirective) -> usize {
    let passive = 1 + 1 + FULL + 1 + pool.passive.concentrated.len() * CONCENTRATED_LEN;
    FULL + passive + SWAP_LEN + 1
}

fn put_list<T>(
    buf: &mut Vec<u8>,
    kind: &'static str,
    elems: &[T],
    put: fn(&mut Vec<u8>, &T) -> Result<()>,
) -> Result<()> {
    let count = u8::try_from(elems.len()).map_err(|_| AppError::ListOverflow {
        kind,
        len: elems.len(),
    })?;
    buf.push(count);
    for elem in elems {
        put(buf, elem)?;
    }
    Ok(())
}

fn put_settlement(buf: &mut Vec<u8>, settle: &SettlementDirective) {
    put_address(buf, settle.token);
    put_full_signed(buf, settle.limit_qty);
    put_full(buf, settle.dust_thresh);
    put_bool(buf, settle.use_surplus);
}

fn put_hop(buf: &mut Vec<u8>, hop: &HopDirective) -> Result<()> {
    put_list(buf, "pool", &hop.pools, put_pool)?;
    put_settlement(buf, &hop.settlement);
    buf.push(improve_flags(&hop.improve));
    Ok(())
}

fn put_pool(buf: &mut Vec<u8>, pool: &PoolDirective) -> Result<()> {
    put_full(buf, pool.pool_idx);
    put_passive(buf, &pool.passive)?;
    put_swap(buf, &pool.swap);
    buf.push(chain_flags(&pool.chain));
    Ok(())
}

fn put_passive(buf: &mut Vec<u8>, passive: &PassiveDirective) -> Result<()> {
    put_bool(buf, passive.ambient.is_add);
    buf.push(passive.ambient.roll_type.code());
    put_full(buf, passive.ambient.liquidity);
    put_list(buf, "concentrated range", &passive.concentrated, put_concentrated)
}

fn put_concentrated(buf: &mut Vec<u8>, conc: &ConcentratedDirective) -> Result<()> {
    put_tick(buf, conc.low_tick)?;
    put_tick(buf, conc.high_tick)?;
    put_bool(buf, conc.is_rel_tick);
    put_bool(buf, conc.is_add);
    buf.push(conc.roll_type.code());
    put_full(buf, conc.liquidity);
    Ok(())
}

fn put_swap(buf: &mut Vec<u8>, swap: &SwapDirective) {
    buf.push(((swap.is_buy as u8) << 1) | swap.in_base_qty as u8);
    buf.push(swap.roll_type.code());
    put_full(buf, swap.qty);
    put_full(buf, swap.limit_price);
}

fn improve_flags(improve: &ImproveDirective) -> u8 {
    ((improve.is_enabled as u8) << 1) | improve.use_base_side as u8
}

fn chain_flags(chain: &ChainingDirective) -> u8 {
    ((chain.roll_exit as u8) << 2) | ((chain.swap_defer as u8) << 1) | chain.offset_surplus as u8
}

fn put_full(buf: &mut Vec<u8>, value: U256) {
    let mut word = [0u8; FULL];
    value.to_big_endian(&mut word);
    buf.extend_from_slice(&word);
}

fn put_full_signed(buf: &mut Vec<u8>, value: I256) {
    put_bool(buf, value.is_negative());
    put_full(buf, value.unsigned_abs());
}

fn put_tick(buf: &mut Vec<u8>, tick: i32) -> Result<()> {
    let magnitude = tick.unsigned_abs();
    if magnitude > MAX_TICK_MAGNITUDE {
        return Err(AppError::TickOverflow(tick));
    }
    put_bool(buf, tick < 0);
    buf.extend_from_slice(&magnitude.to_be_bytes()[1..]);
    Ok(())
}

fn put_address(buf: &mut Vec<u8>, addr: Address) {
    buf.extend_from_slice(&[0u8; 12]);
    buf.extend_from_slice(addr.as_bytes());
}

fn put_bool(buf: &mut Vec<u8>, flag: bool) {
    buf.push(flag as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::RollType;
    use proptest::prelude::*;

    fn token(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn directive_with(hops: usize, pools_per_hop: usize, ranges_per_pool: usize) -> OrderDirective {
        let mut directive = OrderDirective::new(token(1));
        for h in 0..hops {
            let hop = directive.append_hop(token(2 + h as u8));
            for _ in 0..pools_per_hop {
                let pool = directive.append_pool(hop, 420).unwrap();
                for r in 0..ranges_per_pool {
                    let low = -100 * (r as i32 + 1);
                    directive
                        .append_range_mint(pool, low, 100, I256::from(1000))
                        .unwrap();
                }
            }
        }
        directive
    }

    #[test]
    fn length_is_pure_function_of_list_sizes() {
        for hops in [0usize, 1, 2] {
            for pools in [0usize, 1, 3] {
                let directive = directive_with(hops, pools, 1);
                let bytes = encode_directive(&directive).unwrap();
                let pool_bytes = 32 + (1 + 1 + 32 + 1 + CONCENTRATED_LEN) + SWAP_LEN + 1;
                let hop_bytes = 1 + pools * pool_bytes + SETTLEMENT_LEN + 1;
                let expected = 1 + SETTLEMENT_LEN + 1 + hops * hop_bytes;
                assert_eq!(bytes.len(), expected, "hops={hops} pools={pools}");
                assert_eq!(encoded_len(&directive), expected);
            }
        }
    }

    proptest! {
        #[test]
        fn encoded_len_matches_encoding(
            shape in prop::collection::vec(prop::collection::vec(0usize..4, 0..4), 0..4),
            low in -8_000_000i32..0,
            width in 1i32..8_000_000,
            liq in 1i64..i64::MAX,
        ) {
            let mut directive = OrderDirective::new(token(1));
            let mut expected = 1 + SETTLEMENT_LEN + 1;
            for (h, pools) in shape.iter().enumerate() {
                let hop = directive.append_hop(token(2 + h as u8));
                expected += 1 + SETTLEMENT_LEN + 1;
                for ranges in pools {
                    let pool = directive.append_pool(hop, 420).unwrap();
                    expected += 32 + (1 + 1 + 32 + 1) + SWAP_LEN + 1;
                    for _ in 0..*ranges {
                        directive
                            .append_range_burn(pool, low, low + width, I256::from(liq))
                            .unwrap();
                        expected += CONCENTRATED_LEN;
                    }
                }
            }
            let bytes = encode_directive(&directive).unwrap();
            prop_assert_eq!(bytes.len(), expected);
            prop_assert_eq!(encoded_len(&directive), expected);
        }
    }

    #[test]
    fn empty_directive_layout() {
        let bytes = encode_directive(&OrderDirective::new(token(0xab))).unwrap();
        assert_eq!(bytes.len(), 1 + 32 + 33 + 32 + 1 + 1);
        assert_eq!(bytes[0], LONG_FORM_SCHEMA);
        assert_eq!(&bytes[1..13], &[0u8; 12]);
        assert_eq!(&bytes[13..33], token(0xab).as_bytes());
        // positive 2^125 limit: sign byte then bit 125 set in the magnitude
        assert_eq!(bytes[33], 0);
        assert_eq!(bytes[34 + 16], 0x20);
        assert!(bytes[34..66].iter().enumerate().all(|(i, b)| i == 16 || *b == 0));
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn encoding_is_deterministic() {
        let directive = directive_with(2, 3, 2);
        let first = encode_directive(&directive).unwrap();
        let second = encode_directive(&directive.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn negative_and_positive_ticks() {
        let mut buf = Vec::new();
        put_tick(&mut buf, -69090).unwrap();
        assert_eq!(buf, vec![0x01, 0x01, 0x0d, 0xe2]);

        buf.clear();
        put_tick(&mut buf, 52980).unwrap();
        assert_eq!(buf, vec![0x00, 0x00, 0xce, 0xf4]);

        assert!(matches!(
            put_tick(&mut buf, 1 << 24),
            Err(AppError::TickOverflow(_))
        ));
    }

    #[test]
    fn negative_limit_carries_sign_byte() {
        let mut buf = Vec::new();
        put_full_signed(&mut buf, I256::from(-10_000_000_000i64));
        assert_eq!(buf.len(), SIGNED_FULL);
        assert_eq!(buf[0], 1);
        assert_eq!(U256::from_big_endian(&buf[1..]), U256::from(10_000_000_000u64));
    }

    #[test]
    fn two_hop_list_prefix() {
        let directive = directive_with(2, 1, 0);
        let bytes = encode_directive(&directive).unwrap();
        let hop_list = 1 + SETTLEMENT_LEN;
        assert_eq!(bytes[hop_list], 0x02);
        // first hop begins with its pool count
        assert_eq!(bytes[hop_list + 1], 0x01);
        let second_hop = hop_list + 1 + hop_len(&directive.hops[0]);
        assert_eq!(bytes[second_hop], 0x01);
        assert_eq!(bytes.len(), second_hop + hop_len(&directive.hops[1]));
    }

    #[test]
    fn flag_bytes() {
        let mut directive = OrderDirective::new(token(1));
        let hop = directive.append_hop(token(2));
        let pool = directive.append_pool(hop, 420).unwrap();
        {
            let pool = directive.pool_mut(pool).unwrap();
            pool.chain.roll_exit = true;
            pool.chain.offset_surplus = true;
            pool.swap.is_buy = true;
            pool.swap.roll_type = RollType::SettledFraction;
        }
        directive.hop_mut(hop).unwrap().improve.is_enabled = true;

        let bytes = encode_directive(&directive).unwrap();
        let pool_start = 1 + SETTLEMENT_LEN + 1 + 1;
        let swap_start = pool_start + 32 + 1 + 1 + 32 + 1;
        assert_eq!(bytes[swap_start], 0b10);
        assert_eq!(bytes[swap_start + 1], 4);
        assert_eq!(bytes[swap_start + SWAP_LEN], 0b101);
        assert_eq!(*bytes.last().unwrap(), 0b10);
    }

    #[test]
    fn oversized_lists_are_rejected() {
        let mut directive = OrderDirective::new(token(1));
        for _ in 0..256 {
            directive.append_hop(token(2));
        }
        assert!(matches!(
            encode_directive(&directive),
            Err(AppError::ListOverflow { kind: "hop", len: 256 })
        ));
    }

    #[test]
    fn range_burn_end_to_end() {
        let open = token(0x0a);
        let next = token(0x0b);
        let mut directive = OrderDirective::new(open);
        let hop = directive.append_hop(next);
        let pool = directive.append_pool(hop, 420).unwrap();
        directive
            .append_range_burn(pool, -69090, -52980, I256::from(277973882314227712i64))
            .unwrap();

        let bytes = encode_directive(&directive).unwrap();
        assert_eq!(bytes[0], 0x01);

        let mut at = 1 + SETTLEMENT_LEN;
        assert_eq!(bytes[at], 1, "one hop");
        at += 1;
        assert_eq!(bytes[at], 1, "one pool");
        at += 1;
        assert_eq!(U256::from_big_endian(&bytes[at..at + 32]), U256::from(420));
        at += 32;
        // ambient leg untouched
        assert_eq!(&bytes[at..at + 34], &[0u8; 34]);
        at += 34;
        assert_eq!(bytes[at], 1, "one concentrated range");
        at += 1;
        assert_eq!(&bytes[at..at + 4], &[0x01, 0x01, 0x0d, 0xe2]);
        assert_eq!(&bytes[at + 4..at + 8], &[0x01, 0x00, 0xce, 0xf4]);
        assert_eq!(bytes[at + 8], 0, "absolute ticks");
        assert_eq!(bytes[at + 9], 0, "burn");
        assert_eq!(bytes[at + 10], 0, "literal roll");
        assert_eq!(
            U256::from_big_endian(&bytes[at + 11..at + 43]),
            U256::from(277973882314227712u64)
        );
        assert_eq!(bytes.len(), encoded_len(&directive));
    }
}
