//! Pure constant-product pool math (x·y=k).
//!
//! This crate contains the numeric core of the pool engine: the UQ112.112
//! fixed-point helper used by the price oracle, integer square root, the
//! liquidity mint/burn formulas, the fee-adjusted invariant check, and
//! periphery-style quoting. It holds no pool state and performs no external
//! calls, so every function is total and directly checkable.

#![no_std]

#[cfg(kani)]
extern crate kani;

pub mod math;
pub mod uq112;

use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer for balances, pool shares, and intermediates.
    pub struct U256(4);
}

/// Pool shares minted to the zero address on first deposit. Keeps the
/// pro-rata denominator from ever collapsing back to zero.
pub const MINIMUM_LIQUIDITY: u128 = 1_000;

/// Swap fee numerator: 3/1000 = 0.3%, charged on inputs.
pub const SWAP_FEE_NUMERATOR: u64 = 3;

/// Swap fee denominator.
pub const SWAP_FEE_DENOMINATOR: u64 = 1_000;

/// Largest value a reserve counter may hold (2^112 - 1). Products of two
/// reserves then fit in 224 bits, leaving headroom for the oracle's
/// 32-bit elapsed-time multiply.
pub const MAX_RESERVE: u128 = (1u128 << 112) - 1;

/// Error types for pool math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// Reserves are zero where a price is required
    InvalidReserves,
    /// Amount is zero or otherwise unusable
    InvalidAmount,
    /// Requested output cannot be covered by reserves
    InsufficientLiquidity,
    /// Arithmetic overflow in a checked computation
    Overflow,
}
