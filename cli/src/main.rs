//! Pairswap CLI - drive the AMM core against an in-memory ledger.
//!
//! `demo` runs a scripted end-to-end session (deploy, add liquidity, swap,
//! read the oracle, redeem); `quote` prices a swap from raw reserves;
//! `pair-address` computes the deterministic pool address offline.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pairswap::{math, pair_address, sort_tokens, Address, U256};

mod demo;

#[derive(Parser)]
#[command(name = "pairswap")]
#[command(about = "Constant-product AMM core - demo and quoting tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output (engine debug logging)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session: deploy, add liquidity, swap, oracle, redeem
    Demo {
        /// Enable the protocol fee and mint its share to a treasury account
        #[arg(long)]
        fee_recipient: bool,

        /// Initial token0 deposit, in whole tokens (18 decimals)
        #[arg(long, default_value_t = 5)]
        amount0: u64,

        /// Initial token1 deposit, in whole tokens (18 decimals)
        #[arg(long, default_value_t = 10)]
        amount1: u64,
    },

    /// Price a swap from raw reserves (0.3% fee included)
    Quote {
        /// Input-side reserve, raw units
        #[arg(long)]
        reserve_in: u128,

        /// Output-side reserve, raw units
        #[arg(long)]
        reserve_out: u128,

        /// Input amount, raw units
        #[arg(long)]
        amount_in: u128,
    },

    /// Compute the deterministic pool address for a token pair
    PairAddress {
        /// Factory address (hex, 0x-prefixed or bare)
        factory: String,

        /// First token address
        token_a: String,

        /// Second token address
        token_b: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_module("pairswap", log::LevelFilter::Trace);
    }
    builder.init();

    match cli.command {
        Commands::Demo {
            fee_recipient,
            amount0,
            amount1,
        } => demo::run(fee_recipient, amount0, amount1),
        Commands::Quote {
            reserve_in,
            reserve_out,
            amount_in,
        } => quote(reserve_in, reserve_out, amount_in),
        Commands::PairAddress {
            factory,
            token_a,
            token_b,
        } => print_pair_address(&factory, &token_a, &token_b),
    }
}

fn quote(reserve_in: u128, reserve_out: u128, amount_in: u128) -> Result<()> {
    let out = math::quote_out(U256::from(amount_in), reserve_in, reserve_out)
        .map_err(|e| anyhow!("quote failed: {e:?}"))?;
    let spot = U256::from(amount_in) * U256::from(reserve_out) / U256::from(reserve_in);
    println!("{}", "Swap quote".bold());
    println!("  reserves      {reserve_in} -> {reserve_out}");
    println!("  amount in     {amount_in}");
    println!("  amount out    {}", out.to_string().green());
    println!("  vs. spot      {spot} (slippage + 0.3% fee)");
    Ok(())
}

fn print_pair_address(factory: &str, token_a: &str, token_b: &str) -> Result<()> {
    let factory: Address = factory.parse().map_err(|e| anyhow!("factory: {e}"))?;
    let token_a: Address = token_a.parse().map_err(|e| anyhow!("token_a: {e}"))?;
    let token_b: Address = token_b.parse().map_err(|e| anyhow!("token_b: {e}"))?;
    let (token0, token1) = sort_tokens(token_a, token_b);
    let pair = pair_address(factory, token0, token1);
    println!("{}", "Deterministic pool address".bold());
    println!("  token0   {token0}");
    println!("  token1   {token1}");
    println!("  pool     {}", pair.to_string().green());
    Ok(())
}
