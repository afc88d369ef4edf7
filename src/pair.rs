//! The pool engine.
//!
//! One pool per unordered token pair. Liquidity providers transfer input
//! tokens to the pool and call `mint`; withdrawers transfer pool shares
//! back and call `burn`; traders call `swap` naming desired outputs, which
//! are sent optimistically before the fee-adjusted invariant is re-checked
//! against observed balances. Every mutating entry point runs under the
//! pool's reentrancy latch, which stays held across the swap callback.

use log::debug;
use swap_model::{math, uq112, MathError, MAX_RESERVE, MINIMUM_LIQUIDITY, U256};

use crate::address::Address;
use crate::error::EngineError;
use crate::event::Event;
use crate::ledger::Ledger;
use crate::token::ShareToken;

/// Per-pool state. Reserves are 112-bit counters of the pool's last-known
/// holdings; the 32-bit timestamp and the 256-bit price accumulators wrap
/// by design, everything else is overflow-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairState {
    pub(crate) factory: Address,
    pub(crate) address: Address,
    pub(crate) token0: Address,
    pub(crate) token1: Address,
    pub(crate) reserve0: u128,
    pub(crate) reserve1: u128,
    pub(crate) block_timestamp_last: u32,
    pub(crate) price0_cumulative_last: U256,
    pub(crate) price1_cumulative_last: U256,
    pub(crate) k_last: U256,
    pub(crate) shares: ShareToken,
    pub(crate) unlocked: bool,
    pub(crate) initialized: bool,
}

impl PairState {
    pub(crate) fn new(factory: Address, address: Address, chain_id: u64) -> Self {
        PairState {
            factory,
            address,
            token0: Address::ZERO,
            token1: Address::ZERO,
            reserve0: 0,
            reserve1: 0,
            block_timestamp_last: 0,
            price0_cumulative_last: U256::zero(),
            price1_cumulative_last: U256::zero(),
            k_last: U256::zero(),
            shares: ShareToken::new(chain_id, address),
            unlocked: true,
            initialized: false,
        }
    }

    /// Cached reserves and the timestamp of the last update.
    pub fn get_reserves(&self) -> (u128, u128, u32) {
        (self.reserve0, self.reserve1, self.block_timestamp_last)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn token0(&self) -> Address {
        self.token0
    }

    pub fn token1(&self) -> Address {
        self.token1
    }

    pub fn price0_cumulative_last(&self) -> U256 {
        self.price0_cumulative_last
    }

    pub fn price1_cumulative_last(&self) -> U256 {
        self.price1_cumulative_last
    }

    pub fn k_last(&self) -> U256 {
        self.k_last
    }

    /// The embedded pool-share token (read-only).
    pub fn shares(&self) -> &ShareToken {
        &self.shares
    }
}

fn mint_math_error(error: MathError) -> EngineError {
    match error {
        MathError::Overflow => EngineError::Overflow,
        _ => EngineError::InsufficientLiquidityMinted,
    }
}

fn burn_math_error(error: MathError) -> EngineError {
    match error {
        MathError::Overflow => EngineError::Overflow,
        _ => EngineError::InsufficientLiquidityBurned,
    }
}

impl Ledger {
    /// One-time token assignment, callable only by the creating factory.
    pub fn initialize_pair(
        &mut self,
        pair: Address,
        caller: Address,
        token0: Address,
        token1: Address,
    ) -> Result<(), EngineError> {
        self.transact(|led| {
            let state = led.pair_state_mut(pair)?;
            if caller != state.factory || state.initialized {
                return Err(EngineError::Forbidden);
            }
            state.token0 = token0;
            state.token1 = token1;
            state.initialized = true;
            Ok(())
        })
    }

    /// Cached reserves and last-update timestamp of a pool.
    pub fn get_reserves(&self, pair: Address) -> Result<(u128, u128, u32), EngineError> {
        Ok(self.pair_state(pair)?.get_reserves())
    }

    /// Both oracle accumulators of a pool.
    pub fn price_cumulatives(&self, pair: Address) -> Result<(U256, U256), EngineError> {
        let state = self.pair_state(pair)?;
        Ok((state.price0_cumulative_last, state.price1_cumulative_last))
    }

    /// Issue pool shares against tokens already transferred to the pool.
    pub fn mint(&mut self, pair: Address, caller: Address, to: Address) -> Result<U256, EngineError> {
        self.transact(|led| {
            led.lock(pair)?;
            let liquidity = led.mint_inner(pair, caller, to)?;
            led.unlock(pair)?;
            Ok(liquidity)
        })
    }

    /// Redeem pool shares already transferred to the pool, pro rata.
    pub fn burn(
        &mut self,
        pair: Address,
        caller: Address,
        to: Address,
    ) -> Result<(U256, U256), EngineError> {
        self.transact(|led| {
            led.lock(pair)?;
            let amounts = led.burn_inner(pair, caller, to)?;
            led.unlock(pair)?;
            Ok(amounts)
        })
    }

    /// Swap against the invariant: outputs first, optional callback, then
    /// the fee-adjusted constant-product check.
    pub fn swap(
        &mut self,
        pair: Address,
        caller: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        data: &[u8],
    ) -> Result<(), EngineError> {
        self.transact(|led| {
            led.lock(pair)?;
            led.swap_inner(pair, caller, amount0_out, amount1_out, to, data)?;
            led.unlock(pair)?;
            Ok(())
        })
    }

    /// Sweep balances in excess of the cached reserves to `to`.
    pub fn skim(&mut self, pair: Address, _caller: Address, to: Address) -> Result<(), EngineError> {
        self.transact(|led| {
            led.lock(pair)?;
            led.skim_inner(pair, to)?;
            led.unlock(pair)?;
            Ok(())
        })
    }

    /// Force the cached reserves to match observed balances.
    pub fn sync(&mut self, pair: Address, _caller: Address) -> Result<(), EngineError> {
        self.transact(|led| {
            led.lock(pair)?;
            led.sync_inner(pair)?;
            led.unlock(pair)?;
            Ok(())
        })
    }

    fn lock(&mut self, pair: Address) -> Result<(), EngineError> {
        let state = self.pair_state_mut(pair)?;
        if !state.unlocked {
            return Err(EngineError::Locked);
        }
        state.unlocked = false;
        Ok(())
    }

    fn unlock(&mut self, pair: Address) -> Result<(), EngineError> {
        self.pair_state_mut(pair)?.unlocked = true;
        Ok(())
    }

    fn mint_inner(
        &mut self,
        pair: Address,
        caller: Address,
        to: Address,
    ) -> Result<U256, EngineError> {
        let state = self.pair_state(pair)?;
        let (reserve0, reserve1, _) = state.get_reserves();
        let (token0, token1) = (state.token0, state.token1);

        let balance0 = self.balance_of(token0, pair)?;
        let balance1 = self.balance_of(token1, pair)?;
        let amount0 = balance0
            .checked_sub(U256::from(reserve0))
            .ok_or(EngineError::Overflow)?;
        let amount1 = balance1
            .checked_sub(U256::from(reserve1))
            .ok_or(EngineError::Overflow)?;

        let fee_on = self.mint_protocol_fee(pair, reserve0, reserve1)?;
        // supply may have grown inside the fee mint
        let total_supply = self.pair_state(pair)?.shares.total_supply();

        let liquidity = if total_supply.is_zero() {
            let liquidity = math::initial_liquidity(amount0, amount1).map_err(mint_math_error)?;
            let minimum = U256::from(MINIMUM_LIQUIDITY);
            self.pair_state_mut(pair)?.shares.mint(Address::ZERO, minimum)?;
            self.emit(
                pair,
                Event::Transfer {
                    from: Address::ZERO,
                    to: Address::ZERO,
                    value: minimum,
                },
            );
            liquidity
        } else {
            let by0 = math::proportional_liquidity(amount0, total_supply, reserve0)
                .map_err(mint_math_error)?;
            let by1 = math::proportional_liquidity(amount1, total_supply, reserve1)
                .map_err(mint_math_error)?;
            by0.min(by1)
        };
        if liquidity.is_zero() {
            return Err(EngineError::InsufficientLiquidityMinted);
        }

        self.pair_state_mut(pair)?.shares.mint(to, liquidity)?;
        self.emit(
            pair,
            Event::Transfer {
                from: Address::ZERO,
                to,
                value: liquidity,
            },
        );

        self.update_reserves(pair, balance0, balance1, reserve0, reserve1)?;
        if fee_on {
            let state = self.pair_state_mut(pair)?;
            state.k_last = U256::from(state.reserve0) * U256::from(state.reserve1);
        }
        self.emit(
            pair,
            Event::Mint {
                sender: caller,
                amount0,
                amount1,
            },
        );
        debug!(target: "pairswap", "mint pair={pair} to={to} liquidity={liquidity}");
        Ok(liquidity)
    }

    fn burn_inner(
        &mut self,
        pair: Address,
        caller: Address,
        to: Address,
    ) -> Result<(U256, U256), EngineError> {
        let state = self.pair_state(pair)?;
        let (reserve0, reserve1, _) = state.get_reserves();
        let (token0, token1) = (state.token0, state.token1);

        let balance0 = self.balance_of(token0, pair)?;
        let balance1 = self.balance_of(token1, pair)?;
        let liquidity = self.pair_state(pair)?.shares.balance_of(pair);

        let fee_on = self.mint_protocol_fee(pair, reserve0, reserve1)?;
        let total_supply = self.pair_state(pair)?.shares.total_supply();
        if total_supply.is_zero() {
            return Err(EngineError::InsufficientLiquidityBurned);
        }
        let amount0 =
            math::pro_rata_amount(liquidity, balance0, total_supply).map_err(burn_math_error)?;
        let amount1 =
            math::pro_rata_amount(liquidity, balance1, total_supply).map_err(burn_math_error)?;
        if amount0.is_zero() || amount1.is_zero() {
            return Err(EngineError::InsufficientLiquidityBurned);
        }

        self.pair_state_mut(pair)?.shares.burn(pair, liquidity)?;
        self.emit(
            pair,
            Event::Transfer {
                from: pair,
                to: Address::ZERO,
                value: liquidity,
            },
        );
        self.safe_transfer(token0, pair, to, amount0)?;
        self.safe_transfer(token1, pair, to, amount1)?;

        let balance0 = self.balance_of(token0, pair)?;
        let balance1 = self.balance_of(token1, pair)?;
        self.update_reserves(pair, balance0, balance1, reserve0, reserve1)?;
        if fee_on {
            let state = self.pair_state_mut(pair)?;
            state.k_last = U256::from(state.reserve0) * U256::from(state.reserve1);
        }
        self.emit(
            pair,
            Event::Burn {
                sender: caller,
                amount0,
                amount1,
                to,
            },
        );
        debug!(target: "pairswap", "burn pair={pair} to={to} amounts=({amount0}, {amount1})");
        Ok((amount0, amount1))
    }

    fn swap_inner(
        &mut self,
        pair: Address,
        caller: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        data: &[u8],
    ) -> Result<(), EngineError> {
        if amount0_out.is_zero() && amount1_out.is_zero() {
            return Err(EngineError::InsufficientOutputAmount);
        }
        let state = self.pair_state(pair)?;
        let (reserve0, reserve1, _) = state.get_reserves();
        if amount0_out >= U256::from(reserve0) || amount1_out >= U256::from(reserve1) {
            return Err(EngineError::InsufficientLiquidity);
        }
        let (token0, token1) = (state.token0, state.token1);
        if to == token0 || to == token1 {
            return Err(EngineError::InvalidTo);
        }

        // optimistic output transfers; the invariant check below settles up
        if !amount0_out.is_zero() {
            self.safe_transfer(token0, pair, to, amount0_out)?;
        }
        if !amount1_out.is_zero() {
            self.safe_transfer(token1, pair, to, amount1_out)?;
        }
        if !data.is_empty() {
            self.invoke_swap_callback(to, pair, caller, amount0_out, amount1_out, data)?;
        }

        let balance0 = self.balance_of(token0, pair)?;
        let balance1 = self.balance_of(token1, pair)?;
        let amount0_in = math::swap_input(balance0, reserve0, amount0_out);
        let amount1_in = math::swap_input(balance1, reserve1, amount1_out);
        if amount0_in.is_zero() && amount1_in.is_zero() {
            return Err(EngineError::InsufficientInputAmount);
        }
        let holds = math::k_after_fees_holds(
            balance0, balance1, amount0_in, amount1_in, reserve0, reserve1,
        )
        .map_err(|_| EngineError::Overflow)?;
        if !holds {
            return Err(EngineError::K);
        }

        self.update_reserves(pair, balance0, balance1, reserve0, reserve1)?;
        self.emit(
            pair,
            Event::Swap {
                sender: caller,
                amount0_in,
                amount1_in,
                amount0_out,
                amount1_out,
                to,
            },
        );
        debug!(
            target: "pairswap",
            "swap pair={pair} in=({amount0_in}, {amount1_in}) out=({amount0_out}, {amount1_out}) to={to}"
        );
        Ok(())
    }

    fn skim_inner(&mut self, pair: Address, to: Address) -> Result<(), EngineError> {
        let state = self.pair_state(pair)?;
        let (reserve0, reserve1, _) = state.get_reserves();
        let (token0, token1) = (state.token0, state.token1);

        let excess0 = self
            .balance_of(token0, pair)?
            .checked_sub(U256::from(reserve0))
            .ok_or(EngineError::Overflow)?;
        let excess1 = self
            .balance_of(token1, pair)?
            .checked_sub(U256::from(reserve1))
            .ok_or(EngineError::Overflow)?;
        self.safe_transfer(token0, pair, to, excess0)?;
        self.safe_transfer(token1, pair, to, excess1)?;
        Ok(())
    }

    fn sync_inner(&mut self, pair: Address) -> Result<(), EngineError> {
        let state = self.pair_state(pair)?;
        let (reserve0, reserve1, _) = state.get_reserves();
        let (token0, token1) = (state.token0, state.token1);
        let balance0 = self.balance_of(token0, pair)?;
        let balance1 = self.balance_of(token1, pair)?;
        self.update_reserves(pair, balance0, balance1, reserve0, reserve1)
    }

    /// Write observed balances into the reserves, advancing the oracle
    /// accumulators with the pre-update reserves and elapsed time.
    fn update_reserves(
        &mut self,
        pair: Address,
        balance0: U256,
        balance1: U256,
        reserve0: u128,
        reserve1: u128,
    ) -> Result<(), EngineError> {
        if balance0 > U256::from(MAX_RESERVE) || balance1 > U256::from(MAX_RESERVE) {
            return Err(EngineError::Overflow);
        }
        let now32 = self.timestamp() as u32;
        let state = self.pair_state_mut(pair)?;
        let elapsed = now32.wrapping_sub(state.block_timestamp_last);
        if elapsed > 0 && reserve0 != 0 && reserve1 != 0 {
            let (acc0, _) = state
                .price0_cumulative_last
                .overflowing_add(uq112::price_integral(reserve1, reserve0, elapsed));
            state.price0_cumulative_last = acc0;
            let (acc1, _) = state
                .price1_cumulative_last
                .overflowing_add(uq112::price_integral(reserve0, reserve1, elapsed));
            state.price1_cumulative_last = acc1;
        }
        state.reserve0 = balance0.low_u128();
        state.reserve1 = balance1.low_u128();
        state.block_timestamp_last = now32;
        let (reserve0, reserve1) = (state.reserve0, state.reserve1);
        self.emit(pair, Event::Sync { reserve0, reserve1 });
        Ok(())
    }

    /// Mint the protocol's 1/6 share of growth in sqrt(k) since the last
    /// liquidity event, if the factory has a fee recipient set.
    fn mint_protocol_fee(
        &mut self,
        pair: Address,
        reserve0: u128,
        reserve1: u128,
    ) -> Result<bool, EngineError> {
        let factory = self.pair_state(pair)?.factory;
        let fee_to = self.factory_state(factory)?.fee_to();
        let fee_on = !fee_to.is_zero();
        let k_last = self.pair_state(pair)?.k_last;
        if fee_on {
            if !k_last.is_zero() {
                let k = U256::from(reserve0) * U256::from(reserve1);
                let total_supply = self.pair_state(pair)?.shares.total_supply();
                let fee_shares = math::protocol_fee_shares(total_supply, k, k_last)
                    .map_err(|_| EngineError::Overflow)?;
                if !fee_shares.is_zero() {
                    self.pair_state_mut(pair)?.shares.mint(fee_to, fee_shares)?;
                    self.emit(
                        pair,
                        Event::Transfer {
                            from: Address::ZERO,
                            to: fee_to,
                            value: fee_shares,
                        },
                    );
                }
            }
        } else if !k_last.is_zero() {
            self.pair_state_mut(pair)?.k_last = U256::zero();
        }
        Ok(fee_on)
    }
}
