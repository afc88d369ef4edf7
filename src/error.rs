//! Failure kinds for every guarded entry point.
//!
//! Every error aborts the current entry point; the ledger rolls back all
//! state the call mutated, including event records. There is no retry at
//! this layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Reentrant call while the pool latch is held
    #[error("LOCKED: reentrant call on a guarded pool")]
    Locked,

    /// Observed balance exceeds the 112-bit reserve range, or a checked
    /// computation overflowed
    #[error("OVERFLOW: value outside the supported range")]
    Overflow,

    /// Computed liquidity rounds to zero
    #[error("INSUFFICIENT_LIQUIDITY_MINTED")]
    InsufficientLiquidityMinted,

    /// A redeemed amount rounds to zero
    #[error("INSUFFICIENT_LIQUIDITY_BURNED")]
    InsufficientLiquidityBurned,

    /// Swap requested with both outputs zero
    #[error("INSUFFICIENT_OUTPUT_AMOUNT")]
    InsufficientOutputAmount,

    /// Requested output is not covered by reserves
    #[error("INSUFFICIENT_LIQUIDITY")]
    InsufficientLiquidity,

    /// Swap recipient collides with a reserve token
    #[error("INVALID_TO")]
    InvalidTo,

    /// Swap concluded with both inputs zero
    #[error("INSUFFICIENT_INPUT_AMOUNT")]
    InsufficientInputAmount,

    /// Post-swap constant-product invariant violated
    #[error("K: constant-product invariant violated")]
    K,

    /// External token call returned non-success
    #[error("TRANSFER_FAILED: external token rejected the transfer")]
    TransferFailed,

    /// Factory asked to pair a token with itself
    #[error("IDENTICAL_ADDRESSES")]
    IdenticalAddresses,

    /// Factory asked to pair the zero address
    #[error("ZERO_ADDRESS")]
    ZeroAddress,

    /// A pool already exists for this token pair
    #[error("PAIR_EXISTS")]
    PairExists,

    /// Caller lacks authority for this operation
    #[error("FORBIDDEN")]
    Forbidden,

    /// Permit deadline has passed
    #[error("EXPIRED: permit deadline has passed")]
    Expired,

    /// Permit signature is malformed, unverifiable, or from the wrong signer
    #[error("INVALID_SIGNATURE")]
    InvalidSignature,

    /// Sender balance too low for a share transfer or burn
    #[error("insufficient share balance")]
    InsufficientBalance,

    /// Spender allowance too low for a delegated transfer
    #[error("insufficient share allowance")]
    InsufficientAllowance,

    /// No contract deployed at the named address
    #[error("unknown contract address")]
    UnknownContract,
}
