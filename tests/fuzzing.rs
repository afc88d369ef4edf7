//! Proptest fuzzing suite for the pool engine
//!
//! ## Running Tests
//! - Quick: `cargo test --features fuzz` (default proptest cases)
//! - Deep: `PROPTEST_CASES=1000 cargo test --features fuzz`
//!
//! ## Invariant Definitions
//!
//! ### Reserve consistency
//! After every successful mint/burn/swap/sync/skim, the cached reserves
//! equal the pool's observed token balances.
//!
//! ### Constant product
//! Reserve products never shrink across a successful swap (fees only add).
//!
//! ### Atomicity
//! All public operations are atomic on error: if an operation returns Err,
//! the ledger (contracts and event log) is unchanged from before the call.
//!
//! ### Share lock
//! Once any liquidity exists, the zero address holds exactly
//! MINIMUM_LIQUIDITY pool shares, forever.
//!
//! ### Oracle monotonicity
//! Price accumulators never decrease within the bounded time window these
//! runs generate (no 2^32 or 2^256 wrap is reachable here).

#![cfg(feature = "fuzz")]

use pairswap::*;
use proptest::prelude::*;

fn e18(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

struct World {
    ledger: Ledger,
    pair: Address,
    token0: Address,
    token1: Address,
    lp: Address,
    trader: Address,
    acc0_prev: U256,
    acc1_prev: U256,
}

fn world() -> World {
    let mut ledger = Ledger::new(1);
    let lp = addr(0x11);
    let trader = addr(0x22);
    let token_a = ledger.deploy_token("TKA", TokenBehavior::Standard);
    let token_b = ledger.deploy_token("TKB", TokenBehavior::Standard);
    let factory = ledger.deploy_factory(addr(0x33));
    let pair = ledger.create_pair(factory, token_a, token_b).unwrap();
    let state = ledger.pair(pair).unwrap();
    let (token0, token1) = (state.token0(), state.token1());

    for account in [lp, trader] {
        ledger.fund(token0, account, e18(100_000)).unwrap();
        ledger.fund(token1, account, e18(100_000)).unwrap();
    }
    ledger.transfer(token0, lp, pair, e18(100)).unwrap();
    ledger.transfer(token1, lp, pair, e18(100)).unwrap();
    ledger.mint(pair, lp, lp).unwrap();

    World {
        ledger,
        pair,
        token0,
        token1,
        lp,
        trader,
        acc0_prev: U256::zero(),
        acc1_prev: U256::zero(),
    }
}

#[derive(Debug, Clone)]
enum Action {
    /// Swap token0 in for token1 out at the quoted maximum.
    SwapZeroForOne { amount_micro: u64 },
    /// Swap token1 in for token0 out at the quoted maximum.
    SwapOneForZero { amount_micro: u64 },
    /// Request one unit more than the quote affords; must fail `K` and
    /// mutate nothing.
    SwapGreedy { amount_micro: u64 },
    /// Deposit proportional liquidity.
    AddLiquidity { amount_milli: u64 },
    /// Redeem a percentage of the LP's shares.
    RemoveLiquidity { percent: u8 },
    /// Push tokens at the pool without calling anyone.
    Donate { amount_micro: u64, side: bool },
    /// Sweep excess to the trader.
    Skim,
    /// Fold observed balances into the reserves.
    Sync,
    /// Let wall-clock seconds pass.
    AdvanceTime { seconds: u32 },
    /// Burn with no shares staged; must fail and mutate nothing.
    BurnNothing,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (1u64..1_000_000).prop_map(|amount_micro| Action::SwapZeroForOne { amount_micro }),
        (1u64..1_000_000).prop_map(|amount_micro| Action::SwapOneForZero { amount_micro }),
        (1u64..1_000_000).prop_map(|amount_micro| Action::SwapGreedy { amount_micro }),
        (1u64..1_000).prop_map(|amount_milli| Action::AddLiquidity { amount_milli }),
        (1u8..=50).prop_map(|percent| Action::RemoveLiquidity { percent }),
        ((1u64..1_000_000), any::<bool>())
            .prop_map(|(amount_micro, side)| Action::Donate { amount_micro, side }),
        Just(Action::Skim),
        Just(Action::Sync),
        (0u32..3_600).prop_map(|seconds| Action::AdvanceTime { seconds }),
        Just(Action::BurnNothing),
    ]
}

/// micro = 1e-6 whole tokens, i.e. `amount_micro * 1e12` raw units.
fn micro(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(12)
}

fn check_universal_invariants(w: &mut World) {
    // zero-address lock
    assert_eq!(
        w.ledger.balance_of(w.pair, Address::ZERO).unwrap(),
        U256::from(MINIMUM_LIQUIDITY),
        "zero-address share lock disturbed"
    );
    // oracle monotonicity within the bounded window
    let (acc0, acc1) = w.ledger.price_cumulatives(w.pair).unwrap();
    assert!(acc0 >= w.acc0_prev, "price0 accumulator decreased");
    assert!(acc1 >= w.acc1_prev, "price1 accumulator decreased");
    w.acc0_prev = acc0;
    w.acc1_prev = acc1;
}

fn check_reserves_match_balances(w: &World) {
    let (reserve0, reserve1, _) = w.ledger.get_reserves(w.pair).unwrap();
    assert_eq!(
        U256::from(reserve0),
        w.ledger.balance_of(w.token0, w.pair).unwrap(),
        "reserve0 diverged from the observed balance"
    );
    assert_eq!(
        U256::from(reserve1),
        w.ledger.balance_of(w.token1, w.pair).unwrap(),
        "reserve1 diverged from the observed balance"
    );
}

fn apply(w: &mut World, action: &Action) {
    let (reserve0, reserve1, _) = w.ledger.get_reserves(w.pair).unwrap();
    let k_before = U256::from(reserve0) * U256::from(reserve1);

    match *action {
        Action::SwapZeroForOne { amount_micro } => {
            let amount_in = micro(amount_micro);
            let out = math::quote_out(amount_in, reserve0, reserve1).unwrap();
            if out.is_zero() {
                return;
            }
            w.ledger
                .transfer(w.token0, w.trader, w.pair, amount_in)
                .unwrap();
            w.ledger
                .swap(w.pair, w.trader, U256::zero(), out, w.trader, &[])
                .unwrap();
            check_reserves_match_balances(w);
            let (r0, r1, _) = w.ledger.get_reserves(w.pair).unwrap();
            assert!(U256::from(r0) * U256::from(r1) >= k_before, "k shrank");
        }
        Action::SwapOneForZero { amount_micro } => {
            let amount_in = micro(amount_micro);
            let out = math::quote_out(amount_in, reserve1, reserve0).unwrap();
            if out.is_zero() {
                return;
            }
            w.ledger
                .transfer(w.token1, w.trader, w.pair, amount_in)
                .unwrap();
            w.ledger
                .swap(w.pair, w.trader, out, U256::zero(), w.trader, &[])
                .unwrap();
            check_reserves_match_balances(w);
            let (r0, r1, _) = w.ledger.get_reserves(w.pair).unwrap();
            assert!(U256::from(r0) * U256::from(r1) >= k_before, "k shrank");
        }
        Action::SwapGreedy { amount_micro } => {
            let amount_in = micro(amount_micro);
            let out = math::quote_out(amount_in, reserve0, reserve1).unwrap();
            w.ledger
                .transfer(w.token0, w.trader, w.pair, amount_in)
                .unwrap();
            let snapshot = w.ledger.clone();
            let result = w.ledger.swap(
                w.pair,
                w.trader,
                U256::zero(),
                out + U256::one(),
                w.trader,
                &[],
            );
            assert!(matches!(
                result,
                Err(EngineError::K) | Err(EngineError::InsufficientLiquidity)
            ));
            assert_eq!(w.ledger, snapshot, "failed swap left a trace");
            // leave the staged input for the next observer (skim/sync/swap)
        }
        Action::AddLiquidity { amount_milli } => {
            let amount0 = U256::from(amount_milli) * U256::exp10(15);
            let amount1 = amount0 * U256::from(reserve1) / U256::from(reserve0) + U256::one();
            w.ledger
                .transfer(w.token0, w.lp, w.pair, amount0)
                .unwrap();
            w.ledger
                .transfer(w.token1, w.lp, w.pair, amount1)
                .unwrap();
            w.ledger.mint(w.pair, w.lp, w.lp).unwrap();
            check_reserves_match_balances(w);
        }
        Action::RemoveLiquidity { percent } => {
            let held = w.ledger.balance_of(w.pair, w.lp).unwrap();
            let slice = held * U256::from(percent) / U256::from(100u64);
            if slice.is_zero() {
                return;
            }
            w.ledger.transfer(w.pair, w.lp, w.pair, slice).unwrap();
            w.ledger.burn(w.pair, w.lp, w.lp).unwrap();
            check_reserves_match_balances(w);
        }
        Action::Donate { amount_micro, side } => {
            let token = if side { w.token1 } else { w.token0 };
            w.ledger
                .transfer(token, w.trader, w.pair, micro(amount_micro))
                .unwrap();
            // reserves intentionally lag until the next observation
        }
        Action::Skim => {
            w.ledger.skim(w.pair, w.trader, w.trader).unwrap();
            check_reserves_match_balances(w);
        }
        Action::Sync => {
            w.ledger.sync(w.pair, w.trader).unwrap();
            check_reserves_match_balances(w);
        }
        Action::AdvanceTime { seconds } => {
            w.ledger.advance_time(seconds as u64);
        }
        Action::BurnNothing => {
            let snapshot = w.ledger.clone();
            let result = w.ledger.burn(w.pair, w.trader, w.trader);
            assert_eq!(result, Err(EngineError::InsufficientLiquidityBurned));
            assert_eq!(w.ledger, snapshot, "failed burn left a trace");
        }
    }
    check_universal_invariants(w);
}

proptest! {
    /// Random action sequences preserve every universal invariant.
    #[test]
    fn fuzz_state_machine(actions in prop::collection::vec(action_strategy(), 1..40)) {
        let mut w = world();
        for action in &actions {
            apply(&mut w, action);
        }
    }

    /// Rejected entry points never mutate: drive each precondition failure
    /// against a live pool and compare full ledger snapshots.
    #[test]
    fn fuzz_no_mutation_on_error(
        out0 in 1u64..1_000_000,
        out1 in 1u64..1_000_000,
        seed in any::<u8>(),
    ) {
        let mut w = world();
        let (reserve0, reserve1, _) = w.ledger.get_reserves(w.pair).unwrap();
        let snapshot = w.ledger.clone();

        // both outputs zero
        let r = w.ledger.swap(w.pair, w.trader, U256::zero(), U256::zero(), w.trader, &[]);
        prop_assert_eq!(r, Err(EngineError::InsufficientOutputAmount));
        prop_assert_eq!(&w.ledger, &snapshot);

        // output exceeding reserves
        let r = w.ledger.swap(
            w.pair,
            w.trader,
            U256::from(reserve0) + U256::from(out0),
            U256::zero(),
            w.trader,
            &[],
        );
        prop_assert_eq!(r, Err(EngineError::InsufficientLiquidity));
        prop_assert_eq!(&w.ledger, &snapshot);

        // recipient collides with a reserve token
        let bad_to = if seed % 2 == 0 { w.token0 } else { w.token1 };
        let r = w.ledger.swap(w.pair, w.trader, U256::zero(), micro(out1), bad_to, &[]);
        prop_assert_eq!(r, Err(EngineError::InvalidTo));
        prop_assert_eq!(&w.ledger, &snapshot);

        // output with no input staged
        let r = w.ledger.swap(w.pair, w.trader, U256::zero(), micro(out1), w.trader, &[]);
        prop_assert_eq!(r, Err(EngineError::InsufficientInputAmount));
        prop_assert_eq!(&w.ledger, &snapshot);

        // mint with no deposit
        let r = w.ledger.mint(w.pair, w.trader, w.trader);
        prop_assert_eq!(r, Err(EngineError::InsufficientLiquidityMinted));
        prop_assert_eq!(&w.ledger, &snapshot);
    }

    /// Quoted swaps always clear the invariant check, whatever the state.
    #[test]
    fn fuzz_quotes_always_clear_k(
        deposits in prop::collection::vec(1u64..500, 1..4),
        amount_micro in 1u64..10_000_000,
    ) {
        let mut w = world();
        for amount0_milli in &deposits {
            let amount0 = U256::from(*amount0_milli) * U256::exp10(15);
            let (reserve0, reserve1, _) = w.ledger.get_reserves(w.pair).unwrap();
            let amount1 = amount0 * U256::from(reserve1) / U256::from(reserve0) + U256::one();
            w.ledger.transfer(w.token0, w.lp, w.pair, amount0).unwrap();
            w.ledger.transfer(w.token1, w.lp, w.pair, amount1).unwrap();
            w.ledger.mint(w.pair, w.lp, w.lp).unwrap();
        }

        let (reserve0, reserve1, _) = w.ledger.get_reserves(w.pair).unwrap();
        let amount_in = micro(amount_micro);
        let out = math::quote_out(amount_in, reserve0, reserve1).unwrap();
        prop_assume!(!out.is_zero());
        w.ledger.transfer(w.token0, w.trader, w.pair, amount_in).unwrap();
        w.ledger.swap(w.pair, w.trader, U256::zero(), out, w.trader, &[]).unwrap();
    }
}
