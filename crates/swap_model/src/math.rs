//! Liquidity, fee, and invariant formulas for constant-product pools.

use crate::{
    MathError, MINIMUM_LIQUIDITY, SWAP_FEE_DENOMINATOR, SWAP_FEE_NUMERATOR, U256,
};

/// Babylonian integer square root, rounding down.
pub fn sqrt(y: U256) -> U256 {
    let two = U256::from(2u64);
    if y > U256::from(3u64) {
        let mut z = y;
        let mut x = y / two + U256::one();
        while x < z {
            z = x;
            x = (y / x + x) / two;
        }
        z
    } else if y.is_zero() {
        U256::zero()
    } else {
        U256::one()
    }
}

/// Shares for the very first deposit: `floor(sqrt(amount0 * amount1))`
/// minus the permanently locked minimum.
pub fn initial_liquidity(amount0: U256, amount1: U256) -> Result<U256, MathError> {
    let product = amount0.checked_mul(amount1).ok_or(MathError::Overflow)?;
    sqrt(product)
        .checked_sub(U256::from(MINIMUM_LIQUIDITY))
        .ok_or(MathError::InsufficientLiquidity)
}

/// Shares for a follow-on deposit of one side: `floor(amount * total_supply / reserve)`.
pub fn proportional_liquidity(
    amount: U256,
    total_supply: U256,
    reserve: u128,
) -> Result<U256, MathError> {
    if reserve == 0 {
        return Err(MathError::InvalidReserves);
    }
    let numerator = amount.checked_mul(total_supply).ok_or(MathError::Overflow)?;
    Ok(numerator / U256::from(reserve))
}

/// Pro-rata redemption of one side: `floor(liquidity * balance / total_supply)`.
pub fn pro_rata_amount(
    liquidity: U256,
    balance: U256,
    total_supply: U256,
) -> Result<U256, MathError> {
    if total_supply.is_zero() {
        return Err(MathError::InvalidReserves);
    }
    let numerator = liquidity.checked_mul(balance).ok_or(MathError::Overflow)?;
    Ok(numerator / total_supply)
}

/// Input delta implied by an observed balance, the cached reserve, and the
/// output already sent: `balance - (reserve - amount_out)` when positive.
///
/// Callers guarantee `amount_out < reserve`.
pub fn swap_input(balance: U256, reserve: u128, amount_out: U256) -> U256 {
    let hypothetical = U256::from(reserve) - amount_out;
    if balance > hypothetical {
        balance - hypothetical
    } else {
        U256::zero()
    }
}

/// The fee-adjusted constant-product check performed after every swap:
///
/// `(bal0*1000 - in0*3) * (bal1*1000 - in1*3) >= r0 * r1 * 1000^2`
///
/// which enforces x·y=k with a 0.3% fee charged on inputs.
pub fn k_after_fees_holds(
    balance0: U256,
    balance1: U256,
    amount0_in: U256,
    amount1_in: U256,
    reserve0: u128,
    reserve1: u128,
) -> Result<bool, MathError> {
    let scale = U256::from(SWAP_FEE_DENOMINATOR);
    let fee = U256::from(SWAP_FEE_NUMERATOR);

    let adjusted0 = balance0
        .checked_mul(scale)
        .ok_or(MathError::Overflow)?
        .checked_sub(amount0_in.checked_mul(fee).ok_or(MathError::Overflow)?)
        .ok_or(MathError::Overflow)?;
    let adjusted1 = balance1
        .checked_mul(scale)
        .ok_or(MathError::Overflow)?
        .checked_sub(amount1_in.checked_mul(fee).ok_or(MathError::Overflow)?)
        .ok_or(MathError::Overflow)?;

    let lhs = adjusted0.checked_mul(adjusted1).ok_or(MathError::Overflow)?;
    let rhs = U256::from(reserve0)
        .checked_mul(U256::from(reserve1))
        .ok_or(MathError::Overflow)?
        .checked_mul(scale * scale)
        .ok_or(MathError::Overflow)?;

    Ok(lhs >= rhs)
}

/// Protocol-fee shares owed for growth in sqrt(k) since the last liquidity
/// event: `total_supply * (rk - rk_last) / (5*rk + rk_last)`, which realizes
/// a 1/6 share of the growth. Zero when sqrt(k) has not grown.
pub fn protocol_fee_shares(
    total_supply: U256,
    k: U256,
    k_last: U256,
) -> Result<U256, MathError> {
    let root_k = sqrt(k);
    let root_k_last = sqrt(k_last);
    if root_k <= root_k_last {
        return Ok(U256::zero());
    }
    let numerator = total_supply
        .checked_mul(root_k - root_k_last)
        .ok_or(MathError::Overflow)?;
    let denominator = root_k
        .checked_mul(U256::from(5u64))
        .ok_or(MathError::Overflow)?
        .checked_add(root_k_last)
        .ok_or(MathError::Overflow)?;
    Ok(numerator / denominator)
}

/// Largest output obtainable for a given input, fee included:
/// `in*997*r_out / (r_in*1000 + in*997)`.
pub fn quote_out(amount_in: U256, reserve_in: u128, reserve_out: u128) -> Result<U256, MathError> {
    if amount_in.is_zero() {
        return Err(MathError::InvalidAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(MathError::InvalidReserves);
    }
    let fee_adjusted = amount_in
        .checked_mul(U256::from(SWAP_FEE_DENOMINATOR - SWAP_FEE_NUMERATOR))
        .ok_or(MathError::Overflow)?;
    let numerator = fee_adjusted
        .checked_mul(U256::from(reserve_out))
        .ok_or(MathError::Overflow)?;
    let denominator = U256::from(reserve_in)
        .checked_mul(U256::from(SWAP_FEE_DENOMINATOR))
        .ok_or(MathError::Overflow)?
        .checked_add(fee_adjusted)
        .ok_or(MathError::Overflow)?;
    Ok(numerator / denominator)
}

/// Smallest input that affords a given output, fee included:
/// `r_in*1000*out / ((r_out - out)*997) + 1`.
pub fn quote_in(amount_out: U256, reserve_in: u128, reserve_out: u128) -> Result<U256, MathError> {
    if amount_out.is_zero() {
        return Err(MathError::InvalidAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(MathError::InvalidReserves);
    }
    if amount_out >= U256::from(reserve_out) {
        return Err(MathError::InsufficientLiquidity);
    }
    let numerator = U256::from(reserve_in)
        .checked_mul(U256::from(SWAP_FEE_DENOMINATOR))
        .ok_or(MathError::Overflow)?
        .checked_mul(amount_out)
        .ok_or(MathError::Overflow)?;
    let denominator = (U256::from(reserve_out) - amount_out)
        .checked_mul(U256::from(SWAP_FEE_DENOMINATOR - SWAP_FEE_NUMERATOR))
        .ok_or(MathError::Overflow)?;
    Ok(numerator / denominator + U256::one())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    fn e18_u128(n: u64) -> u128 {
        (n as u128) * 10u128.pow(18)
    }

    #[test]
    fn test_sqrt_small_values() {
        assert_eq!(sqrt(U256::zero()), U256::zero());
        assert_eq!(sqrt(U256::one()), U256::one());
        assert_eq!(sqrt(U256::from(3u64)), U256::one());
        assert_eq!(sqrt(U256::from(4u64)), U256::from(2u64));
        assert_eq!(sqrt(U256::from(99u64)), U256::from(9u64));
        assert_eq!(sqrt(U256::from(100u64)), U256::from(10u64));
    }

    #[test]
    fn test_sqrt_is_floor() {
        for n in [7u64, 48, 1023, 65_535, 1_000_000_007] {
            let root = sqrt(U256::from(n));
            assert!(root * root <= U256::from(n));
            assert!((root + U256::one()) * (root + U256::one()) > U256::from(n));
        }
    }

    #[test]
    fn test_initial_liquidity_locks_minimum() {
        // 1e18 * 4e18 -> sqrt = 2e18, minus the locked minimum
        let shares = initial_liquidity(e18(1), e18(4)).unwrap();
        assert_eq!(shares, e18(2) - U256::from(MINIMUM_LIQUIDITY));
    }

    #[test]
    fn test_initial_liquidity_below_minimum_fails() {
        let result = initial_liquidity(U256::from(10u64), U256::from(10u64));
        assert_eq!(result, Err(MathError::InsufficientLiquidity));
    }

    #[test]
    fn test_quote_out_reference_rows() {
        // reference rows for the fee-adjusted output formula
        let cases: [(u64, u64, u64, u128); 4] = [
            (1, 5, 10, 1_662_497_915_624_478_906),
            (1, 10, 5, 453_305_446_940_074_565),
            (1, 100, 100, 987_158_034_397_061_298),
            (1, 1000, 1000, 996_006_981_039_903_216),
        ];
        for (amount_in, reserve_in, reserve_out, expected) in cases {
            let out = quote_out(e18(amount_in), e18_u128(reserve_in), e18_u128(reserve_out))
                .unwrap();
            assert_eq!(out, U256::from(expected));
        }
    }

    #[test]
    fn test_quote_out_survives_invariant_check() {
        let (r0, r1) = (e18_u128(5), e18_u128(10));
        let amount_in = e18(1);
        let out = quote_out(amount_in, r0, r1).unwrap();

        let bal0 = U256::from(r0) + amount_in;
        let bal1 = U256::from(r1) - out;
        assert!(k_after_fees_holds(bal0, bal1, amount_in, U256::zero(), r0, r1).unwrap());

        // one more wei of output breaks it
        let bal1_greedy = U256::from(r1) - (out + U256::one());
        assert!(!k_after_fees_holds(bal0, bal1_greedy, amount_in, U256::zero(), r0, r1).unwrap());
    }

    #[test]
    fn test_quote_in_is_sufficient() {
        let (r0, r1) = (e18_u128(5), e18_u128(10));
        let out = e18(1);
        let needed = quote_in(out, r0, r1).unwrap();
        let bal0 = U256::from(r0) + needed;
        let bal1 = U256::from(r1) - out;
        assert!(k_after_fees_holds(bal0, bal1, needed, U256::zero(), r0, r1).unwrap());
    }

    #[test]
    fn test_quote_in_rejects_draining_pool() {
        let result = quote_in(e18(10), e18_u128(5), e18_u128(10));
        assert_eq!(result, Err(MathError::InsufficientLiquidity));
    }

    #[test]
    fn test_protocol_fee_is_sixth_of_growth() {
        // supply 1000e18, k grows from (1000e18)^2 to (1001e18)^2:
        // rk = 1001e18, rk_last = 1000e18, shares = ts * 1e18 / (5*1001e18 + 1000e18)
        let ts = e18(1000);
        let k_last = e18(1000) * e18(1000);
        let k = e18(1001) * e18(1001);
        let shares = protocol_fee_shares(ts, k, k_last).unwrap();
        let expected = ts * e18(1) / (e18(1001) * U256::from(5u64) + e18(1000));
        assert_eq!(shares, expected);

        // roughly 1/6 of the 0.1% growth in sqrt(k)
        let sixth = ts / U256::from(6u64) / U256::from(1000u64);
        assert!(shares < sixth);
        assert!(shares > sixth - sixth / U256::from(500u64));
    }

    #[test]
    fn test_protocol_fee_zero_without_growth() {
        let ts = e18(1000);
        let k = e18(1000) * e18(1000);
        assert_eq!(protocol_fee_shares(ts, k, k).unwrap(), U256::zero());
        // shrinking k also mints nothing
        let smaller = e18(999) * e18(999);
        assert_eq!(protocol_fee_shares(ts, smaller, k).unwrap(), U256::zero());
    }

    #[test]
    fn test_swap_input_derivation() {
        // reserve 100, sent out 10, observed 95: caller paid in 5
        assert_eq!(
            swap_input(U256::from(95u64), 100, U256::from(10u64)),
            U256::from(5u64)
        );
        // observed exactly reserve-minus-out: no input
        assert_eq!(
            swap_input(U256::from(90u64), 100, U256::from(10u64)),
            U256::zero()
        );
    }
}

// ============================================================================
// Kani formal verification proofs
// ============================================================================

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// S1: sqrt returns the floor of the real square root.
    #[kani::proof]
    #[kani::unwind(130)]
    fn s1_sqrt_floor() {
        let y: u64 = kani::any();
        let root = sqrt(U256::from(y));
        assert!(root * root <= U256::from(y));
        assert!((root + U256::one()) * (root + U256::one()) > U256::from(y));
    }

    /// S2: a quoted output always satisfies the fee-adjusted invariant.
    #[kani::proof]
    #[kani::unwind(130)]
    fn s2_quote_preserves_k() {
        let amount_in: u64 = kani::any();
        let reserve_in: u64 = kani::any();
        let reserve_out: u64 = kani::any();

        kani::assume(amount_in > 0 && amount_in < 1_000_000);
        kani::assume(reserve_in > 1_000 && reserve_in < 1_000_000_000);
        kani::assume(reserve_out > 1_000 && reserve_out < 1_000_000_000);

        if let Ok(out) = quote_out(
            U256::from(amount_in),
            reserve_in as u128,
            reserve_out as u128,
        ) {
            let bal_in = U256::from(reserve_in) + U256::from(amount_in);
            let bal_out = U256::from(reserve_out) - out;
            let holds = k_after_fees_holds(
                bal_in,
                bal_out,
                U256::from(amount_in),
                U256::zero(),
                reserve_in as u128,
                reserve_out as u128,
            )
            .unwrap();
            assert!(holds, "S2: quoted swap must satisfy the invariant");
        }
    }

    /// S3: protocol fee never exceeds the supply growth it is charged on.
    #[kani::proof]
    #[kani::unwind(130)]
    fn s3_fee_shares_bounded() {
        let ts: u64 = kani::any();
        let rk: u64 = kani::any();
        let rk_last: u64 = kani::any();

        kani::assume(ts > 0 && ts < 1_000_000_000);
        kani::assume(rk_last > 0 && rk_last < 1_000_000);
        kani::assume(rk > rk_last && rk < 1_000_000);

        let shares = protocol_fee_shares(
            U256::from(ts),
            U256::from(rk) * U256::from(rk),
            U256::from(rk_last) * U256::from(rk_last),
        )
        .unwrap();

        // strictly less than ts * (rk - rk_last) / rk_last, the full growth
        let full_growth = U256::from(ts) * U256::from(rk - rk_last) / U256::from(rk_last);
        assert!(shares <= full_growth, "S3: fee exceeds growth");
    }
}
