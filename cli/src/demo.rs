//! Scripted end-to-end session against an in-memory ledger.

use anyhow::{anyhow, Result};
use colored::Colorize;
use ed25519_dalek::SigningKey;
use pairswap::{math, Address, Ledger, PermitSignature, TokenBehavior, U256};
use rand::rngs::OsRng;

fn e18(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

/// Render a UQ112.112 value with six fractional digits.
fn fmt_uq112(value: U256) -> String {
    let integer = value >> 112usize;
    let fraction = (value - (integer << 112usize)) * U256::from(1_000_000u64) >> 112usize;
    format!("{integer}.{:06}", fraction.low_u64())
}

fn step(title: &str) {
    println!("\n{} {}", "==>".cyan().bold(), title.bold());
}

pub fn run(fee_recipient: bool, amount0: u64, amount1: u64) -> Result<()> {
    let mut ledger = Ledger::new(1);

    let lp_key = SigningKey::generate(&mut OsRng);
    let lp = Address::from_verifying_key(&lp_key.verifying_key());
    let trader = Address::from_verifying_key(&SigningKey::generate(&mut OsRng).verifying_key());
    let governance = Address::from_verifying_key(&SigningKey::generate(&mut OsRng).verifying_key());
    let treasury = Address::from_verifying_key(&SigningKey::generate(&mut OsRng).verifying_key());

    step("Deploy tokens and factory");
    let token_a = ledger.deploy_token("TKA", TokenBehavior::Standard);
    let token_b = ledger.deploy_token("TKB", TokenBehavior::Standard);
    let factory = ledger.deploy_factory(governance);
    println!("  TKA      {token_a}");
    println!("  TKB      {token_b}");
    println!("  factory  {factory}");
    if fee_recipient {
        ledger.set_fee_to(factory, governance, treasury)?;
        println!("  protocol fee -> {}", treasury.to_string().yellow());
    }

    step("Create the pool");
    let pair = ledger.create_pair(factory, token_a, token_b)?;
    let state = ledger.pair(pair)?;
    let (token0, token1) = (state.token0(), state.token1());
    println!("  pool     {}", pair.to_string().green());
    println!("  token0   {token0}");
    println!("  token1   {token1}");

    step(&format!("Add liquidity ({amount0} token0, {amount1} token1)"));
    ledger.fund(token0, lp, e18(amount0))?;
    ledger.fund(token1, lp, e18(amount1))?;
    ledger.transfer(token0, lp, pair, e18(amount0))?;
    ledger.transfer(token1, lp, pair, e18(amount1))?;
    let liquidity = ledger.mint(pair, lp, lp)?;
    let (r0, r1, _) = ledger.get_reserves(pair)?;
    println!("  shares minted  {}", liquidity.to_string().green());
    println!("  reserves       ({r0}, {r1})");

    step("Swap 1 token0 for token1");
    let amount_in = e18(1);
    let quoted = math::quote_out(amount_in, r0, r1).map_err(|e| anyhow!("quote: {e:?}"))?;
    ledger.fund(token0, trader, amount_in)?;
    ledger.transfer(token0, trader, pair, amount_in)?;
    ledger.swap(pair, trader, U256::zero(), quoted, trader, &[])?;
    let (r0, r1, _) = ledger.get_reserves(pair)?;
    println!("  amount out     {}", quoted.to_string().green());
    println!("  reserves       ({r0}, {r1})");

    step("Advance the clock and read the oracle");
    let before = ledger.price_cumulatives(pair)?;
    ledger.advance_time(60);
    ledger.sync(pair, trader)?;
    let after = ledger.price_cumulatives(pair)?;
    let twap0 = (after.0 - before.0) / U256::from(60u64);
    let twap1 = (after.1 - before.1) / U256::from(60u64);
    println!("  TWAP token0 in token1  {}", fmt_uq112(twap0).green());
    println!("  TWAP token1 in token0  {}", fmt_uq112(twap1).green());

    step("Redeem the position via permit");
    let shares = ledger.balance_of(pair, lp)?;
    let nonce = ledger.share_nonce(pair, lp)?;
    let deadline = ledger.timestamp() + 600;
    let digest = ledger
        .pair(pair)?
        .shares()
        .permit_digest(lp, trader, shares, nonce, deadline);
    let signature = PermitSignature::sign(&lp_key, &digest);
    ledger.permit(pair, lp, trader, shares, deadline, &signature)?;
    ledger.transfer_from(pair, trader, lp, pair, shares)?;
    let (out0, out1) = ledger.burn(pair, trader, lp)?;
    println!("  shares burned  {shares}");
    println!(
        "  returned       ({}, {})",
        out0.to_string().green(),
        out1.to_string().green()
    );

    if fee_recipient {
        let fee_shares = ledger.balance_of(pair, treasury)?;
        println!("  treasury fee shares  {}", fee_shares.to_string().yellow());
    }

    step("Final balances");
    println!("  LP token0   {}", ledger.balance_of(token0, lp)?);
    println!("  LP token1   {}", ledger.balance_of(token1, lp)?);
    println!("  pool shares outstanding  {}", ledger.total_supply(pair)?);
    println!("\n{}", "Demo complete.".green().bold());
    Ok(())
}
