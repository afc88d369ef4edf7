//! Structured log records emitted by pools, share tokens, and the factory.

use swap_model::U256;

use crate::address::Address;

/// One event, tagged by the emitting contract in [`EventRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A new pool was registered; `pair_count` is the registry length
    /// after the append.
    PairCreated {
        token0: Address,
        token1: Address,
        pair: Address,
        pair_count: u64,
    },
    /// Liquidity deposited and shares issued.
    Mint {
        sender: Address,
        amount0: U256,
        amount1: U256,
    },
    /// Shares redeemed and reserves paid out.
    Burn {
        sender: Address,
        amount0: U256,
        amount1: U256,
        to: Address,
    },
    /// A swap settled against the invariant.
    Swap {
        sender: Address,
        amount0_in: U256,
        amount1_in: U256,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    },
    /// Cached reserves were rewritten to observed balances.
    Sync { reserve0: u128, reserve1: u128 },
    /// Fungible-token movement (zero `from` marks a mint, zero `to` a burn).
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    /// Allowance set.
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
}

/// An event together with the contract that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub emitter: Address,
    pub event: Event,
}
