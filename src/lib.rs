//! Constant-product AMM core.
//!
//! A factory deterministically instantiates two-token liquidity pools;
//! each pool issues a fungible share token against deposited reserves,
//! settles swaps under the fee-adjusted x·y=k invariant, and publishes a
//! time-weighted price oracle feed. Everything runs inside a
//! single-threaded transactional [`ledger::Ledger`] that routes calls to
//! contracts by address and rolls back failed entry points wholesale.
//!
//! The numeric core lives in the `swap_model` crate; this crate owns the
//! state machines and the trust boundary toward external tokens.

pub mod address;
pub mod error;
pub mod event;
pub mod factory;
pub mod ledger;
pub mod pair;
pub mod token;

pub use address::{keccak256, pair_address, pair_code_hash, Address};
pub use error::EngineError;
pub use event::{Event, EventRecord};
pub use factory::{sort_tokens, FactoryState};
pub use ledger::{BorrowerAction, Contract, ExternalToken, FlashBorrower, Ledger, TokenBehavior};
pub use pair::PairState;
pub use token::{PermitSignature, ShareToken, TOKEN_DECIMALS, TOKEN_NAME, TOKEN_SYMBOL};

pub use swap_model::{
    self, math, uq112, MathError, MAX_RESERVE, MINIMUM_LIQUIDITY, SWAP_FEE_DENOMINATOR,
    SWAP_FEE_NUMERATOR, U256,
};
