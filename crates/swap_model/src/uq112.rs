//! UQ112.112 fixed-point encoding.
//!
//! A 112-bit reserve `y` is encoded as `y << 112` inside a 256-bit word
//! (the top 32 bits stay clear). Dividing an encoded reserve by the
//! opposing raw reserve yields a truncating fixed-point price; multiplied
//! by a 32-bit elapsed time it becomes one oracle accumulator increment.

use crate::{MAX_RESERVE, U256};

/// Number of fractional bits.
pub const RESOLUTION: usize = 112;

/// The fixed-point unit, `2^112`.
pub fn q112() -> U256 {
    U256::one() << RESOLUTION
}

/// Encode a 112-bit reserve as a UQ112.112 value.
pub fn encode(y: u128) -> U256 {
    debug_assert!(y <= MAX_RESERVE);
    U256::from(y) << RESOLUTION
}

/// Divide a UQ112.112 value by a nonzero 112-bit reserve. Truncates.
pub fn uqdiv(x: U256, z: u128) -> U256 {
    debug_assert!(z != 0 && z <= MAX_RESERVE);
    x / U256::from(z)
}

/// One accumulator increment: `encode(numerator) / denominator * elapsed`.
///
/// The multiply wraps by design; callers fold the result into a 256-bit
/// accumulator with wrapping addition and consumers difference snapshots
/// under the same modulus.
pub fn price_integral(numerator_reserve: u128, denominator_reserve: u128, elapsed: u32) -> U256 {
    let price = uqdiv(encode(numerator_reserve), denominator_reserve);
    price.overflowing_mul(U256::from(elapsed)).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_shifts_into_fraction_bits() {
        assert_eq!(encode(1), q112());
        assert_eq!(encode(3), q112() * U256::from(3u64));
        assert_eq!(encode(0), U256::zero());
    }

    #[test]
    fn test_uqdiv_truncates() {
        // 1/3 in UQ112.112: floor(2^112 / 3)
        let third = uqdiv(encode(1), 3);
        assert_eq!(third, q112() / U256::from(3u64));
        // exact division round-trips
        assert_eq!(uqdiv(encode(6), 3), encode(2));
    }

    #[test]
    fn test_unit_price_integral() {
        // equal reserves integrate to elapsed * 2^112
        assert_eq!(price_integral(5, 5, 1), q112());
        assert_eq!(price_integral(5, 5, 10), q112() * U256::from(10u64));
    }

    #[test]
    fn test_max_reserve_encoding_fits() {
        let top = encode(MAX_RESERVE);
        // 112 integer bits + 112 fraction bits = 224 bits
        assert!(top.bits() <= 224);
    }
}
