//! Transactional execution environment for pools and their collaborators.
//!
//! The ledger owns every contract instance behind an address-keyed table
//! and routes calls by address: external tokens, factories, pools, and
//! scripted flash borrowers. Each public entry point is atomic: state is
//! snapshotted on entry and restored if the call returns an error, so a
//! failed operation leaves no observable trace (event records included).
//! Nested entry points snapshot independently, which is what lets a
//! reentrant attempt fail with `LOCKED` while the outer call decides
//! whether to survive it.

use std::collections::BTreeMap;

use log::trace;
use swap_model::U256;

use crate::address::{keccak256, Address};
use crate::error::EngineError;
use crate::event::{Event, EventRecord};
use crate::factory::FactoryState;
use crate::pair::PairState;

/// How an external token responds to `transfer`.
///
/// The pool treats a call as successful iff the call itself succeeded and
/// the returned data is either empty or decodes to boolean true; these
/// variants exercise each arm of that contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBehavior {
    /// Moves the value and returns `true`.
    Standard,
    /// Moves the value and returns no data.
    MissingReturn,
    /// Moves nothing and returns `false`.
    ReturnsFalse,
    /// The call itself fails.
    Reverting,
    /// Moves the value minus a fee taken in transit (fee burned).
    FeeOnTransfer { fee_bps: u16 },
}

/// An external fungible token, outside the pool's trust boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalToken {
    pub symbol: String,
    pub behavior: TokenBehavior,
    total_supply: U256,
    balances: BTreeMap<Address, U256>,
}

impl ExternalToken {
    fn new(symbol: &str, behavior: TokenBehavior) -> Self {
        ExternalToken {
            symbol: symbol.to_string(),
            behavior,
            total_supply: U256::zero(),
            balances: BTreeMap::new(),
        }
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }
}

/// One step of a flash borrower's scripted callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowerAction {
    /// Pay `amount` of `token` from the borrower's balance to the pool.
    Repay { token: Address, amount: U256 },
    /// Attempt a nested swap on the calling pool.
    ReenterSwap { amount0_out: U256, amount1_out: U256 },
    /// Attempt a nested mint on the calling pool.
    ReenterMint,
    /// Attempt a nested burn on the calling pool.
    ReenterBurn,
    /// Attempt a nested skim on the calling pool.
    ReenterSkim,
    /// Attempt a nested sync on the calling pool.
    ReenterSync,
}

/// A contract that takes the swap callback and runs a fixed plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashBorrower {
    pub plan: Vec<BorrowerAction>,
}

/// Everything that can live at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contract {
    Token(ExternalToken),
    Factory(FactoryState),
    Pair(PairState),
    Borrower(FlashBorrower),
}

/// The single-threaded transactional world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    chain_id: u64,
    timestamp: u64,
    deploy_nonce: u64,
    contracts: BTreeMap<Address, Contract>,
    events: Vec<EventRecord>,
}

impl Ledger {
    pub fn new(chain_id: u64) -> Self {
        Ledger {
            chain_id,
            timestamp: 1_600_000_000,
            deploy_nonce: 0,
            contracts: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_time(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.timestamp = self.timestamp.saturating_add(seconds);
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Deployment
    // ------------------------------------------------------------------

    /// Deploy an external token with the given transfer behavior.
    pub fn deploy_token(&mut self, symbol: &str, behavior: TokenBehavior) -> Address {
        let address = self.next_address(b"token");
        self.contracts
            .insert(address, Contract::Token(ExternalToken::new(symbol, behavior)));
        address
    }

    /// Deploy a flash borrower with a scripted callback plan.
    pub fn deploy_borrower(&mut self, plan: Vec<BorrowerAction>) -> Address {
        let address = self.next_address(b"borrower");
        self.contracts
            .insert(address, Contract::Borrower(FlashBorrower { plan }));
        address
    }

    /// Swap out an external token's transfer behavior (deploy-time wiring
    /// for misbehaving-token scenarios).
    pub fn set_token_behavior(
        &mut self,
        token: Address,
        behavior: TokenBehavior,
    ) -> Result<(), EngineError> {
        self.token_state_mut(token)?.behavior = behavior;
        Ok(())
    }

    /// Faucet: mint external token units to an account.
    pub fn fund(&mut self, token: Address, to: Address, value: U256) -> Result<(), EngineError> {
        let state = self.token_state_mut(token)?;
        state.total_supply = state
            .total_supply
            .checked_add(value)
            .ok_or(EngineError::Overflow)?;
        let credited = state
            .balance_of(to)
            .checked_add(value)
            .ok_or(EngineError::Overflow)?;
        state.balances.insert(to, credited);
        self.emit(
            token,
            Event::Transfer {
                from: Address::ZERO,
                to,
                value,
            },
        );
        Ok(())
    }

    pub(crate) fn next_address(&mut self, tag: &[u8]) -> Address {
        let mut preimage = Vec::with_capacity(tag.len() + 8);
        preimage.extend_from_slice(tag);
        preimage.extend_from_slice(&self.deploy_nonce.to_be_bytes());
        self.deploy_nonce += 1;
        Address::from_digest(keccak256(&preimage))
    }

    // ------------------------------------------------------------------
    // Token surface (external tokens and pool shares)
    // ------------------------------------------------------------------

    /// Balance of `owner` at a token or pool address.
    pub fn balance_of(&self, token: Address, owner: Address) -> Result<U256, EngineError> {
        match self.contracts.get(&token) {
            Some(Contract::Token(t)) => Ok(t.balance_of(owner)),
            Some(Contract::Pair(p)) => Ok(p.shares.balance_of(owner)),
            _ => Err(EngineError::UnknownContract),
        }
    }

    /// Total supply of a token or pool-share token.
    pub fn total_supply(&self, token: Address) -> Result<U256, EngineError> {
        match self.contracts.get(&token) {
            Some(Contract::Token(t)) => Ok(t.total_supply),
            Some(Contract::Pair(p)) => Ok(p.shares.total_supply()),
            _ => Err(EngineError::UnknownContract),
        }
    }

    /// Caller-initiated transfer on a token or pool-share token.
    pub fn transfer(
        &mut self,
        token: Address,
        caller: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EngineError> {
        self.transact(|led| match led.token_transfer_raw(token, caller, to, value)? {
            Some(false) => Err(EngineError::TransferFailed),
            _ => Ok(()),
        })
    }

    /// Set a pool-share allowance.
    pub fn approve(
        &mut self,
        pair: Address,
        caller: Address,
        spender: Address,
        value: U256,
    ) -> Result<(), EngineError> {
        self.transact(|led| {
            led.pair_state_mut(pair)?.shares.approve(caller, spender, value);
            led.emit(
                pair,
                Event::Approval {
                    owner: caller,
                    spender,
                    value,
                },
            );
            Ok(())
        })
    }

    /// Delegated pool-share transfer.
    pub fn transfer_from(
        &mut self,
        pair: Address,
        caller: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EngineError> {
        self.transact(|led| {
            led.pair_state_mut(pair)?
                .shares
                .transfer_from(caller, from, to, value)?;
            led.emit(pair, Event::Transfer { from, to, value });
            Ok(())
        })
    }

    /// Approval by signature on a pool-share token.
    pub fn permit(
        &mut self,
        pair: Address,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: u64,
        signature: &crate::token::PermitSignature,
    ) -> Result<(), EngineError> {
        let now = self.timestamp;
        self.transact(|led| {
            led.pair_state_mut(pair)?
                .shares
                .permit(now, owner, spender, value, deadline, signature)?;
            led.emit(
                pair,
                Event::Approval {
                    owner,
                    spender,
                    value,
                },
            );
            Ok(())
        })
    }

    /// Pool-share allowance.
    pub fn allowance(
        &self,
        pair: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, EngineError> {
        Ok(self.pair_state(pair)?.shares.allowance(owner, spender))
    }

    /// Pool-share permit nonce.
    pub fn share_nonce(&self, pair: Address, owner: Address) -> Result<u64, EngineError> {
        Ok(self.pair_state(pair)?.shares.nonce_of(owner))
    }

    // ------------------------------------------------------------------
    // Internal plumbing shared by pool and factory entry points
    // ------------------------------------------------------------------

    /// Run `f` atomically: on error, contract state and the event log are
    /// restored to their state at entry.
    pub(crate) fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let contracts = self.contracts.clone();
        let event_mark = self.events.len();
        match f(self) {
            Ok(value) => Ok(value),
            Err(error) => {
                self.contracts = contracts;
                self.events.truncate(event_mark);
                Err(error)
            }
        }
    }

    pub(crate) fn emit(&mut self, emitter: Address, event: Event) {
        trace!(target: "pairswap", "{emitter}: {event:?}");
        self.events.push(EventRecord { emitter, event });
    }

    /// Raw token call: moves value according to the target's semantics and
    /// reports the returned data (`None` for empty, `Some(bool)` for an
    /// explicit flag). `Err` means the call itself failed.
    pub(crate) fn token_transfer_raw(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<Option<bool>, EngineError> {
        match self.contracts.get_mut(&token) {
            Some(Contract::Token(state)) => {
                let behavior = state.behavior;
                match behavior {
                    TokenBehavior::ReturnsFalse => Ok(Some(false)),
                    TokenBehavior::Reverting => Err(EngineError::TransferFailed),
                    TokenBehavior::Standard
                    | TokenBehavior::MissingReturn
                    | TokenBehavior::FeeOnTransfer { .. } => {
                        let debited = state
                            .balance_of(from)
                            .checked_sub(value)
                            .ok_or(EngineError::InsufficientBalance)?;
                        let credited_value = match behavior {
                            TokenBehavior::FeeOnTransfer { fee_bps } => {
                                let fee = value * U256::from(fee_bps) / U256::from(10_000u64);
                                state.total_supply = state.total_supply - fee;
                                value - fee
                            }
                            _ => value,
                        };
                        state.balances.insert(from, debited);
                        let credited = state
                            .balance_of(to)
                            .checked_add(credited_value)
                            .ok_or(EngineError::Overflow)?;
                        state.balances.insert(to, credited);
                        self.emit(
                            token,
                            Event::Transfer {
                                from,
                                to,
                                value: credited_value,
                            },
                        );
                        match behavior {
                            TokenBehavior::MissingReturn => Ok(None),
                            _ => Ok(Some(true)),
                        }
                    }
                }
            }
            Some(Contract::Pair(state)) => {
                state.shares.transfer(from, to, value)?;
                self.emit(token, Event::Transfer { from, to, value });
                Ok(Some(true))
            }
            _ => Err(EngineError::UnknownContract),
        }
    }

    /// The pool's safe-transfer helper: success iff the call succeeded and
    /// the returned data is empty or decodes to true.
    pub(crate) fn safe_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EngineError> {
        match self.token_transfer_raw(token, from, to, value) {
            Ok(None) | Ok(Some(true)) => Ok(()),
            Ok(Some(false)) => Err(EngineError::TransferFailed),
            Err(EngineError::UnknownContract) => Err(EngineError::UnknownContract),
            Err(_) => Err(EngineError::TransferFailed),
        }
    }

    /// Dispatch the swap callback to `to`, running its scripted plan. The
    /// callback carries `(sender, amount0_out, amount1_out, data)`; a
    /// scripted borrower keys only off its plan.
    pub(crate) fn invoke_swap_callback(
        &mut self,
        to: Address,
        pair: Address,
        _sender: Address,
        _amount0_out: U256,
        _amount1_out: U256,
        _data: &[u8],
    ) -> Result<(), EngineError> {
        let plan = match self.contracts.get(&to) {
            Some(Contract::Borrower(b)) => b.plan.clone(),
            _ => return Err(EngineError::UnknownContract),
        };
        trace!(target: "pairswap", "swap callback to {to} ({} steps)", plan.len());
        for action in plan {
            match action {
                BorrowerAction::Repay { token, amount } => {
                    match self.token_transfer_raw(token, to, pair, amount)? {
                        Some(false) => return Err(EngineError::TransferFailed),
                        _ => {}
                    }
                }
                BorrowerAction::ReenterSwap {
                    amount0_out: a0,
                    amount1_out: a1,
                } => {
                    self.swap(pair, to, a0, a1, to, &[])?;
                }
                BorrowerAction::ReenterMint => {
                    self.mint(pair, to, to)?;
                }
                BorrowerAction::ReenterBurn => {
                    self.burn(pair, to, to)?;
                }
                BorrowerAction::ReenterSkim => {
                    self.skim(pair, to, to)?;
                }
                BorrowerAction::ReenterSync => {
                    self.sync(pair, to)?;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// Read-only view of a pool.
    pub fn pair(&self, address: Address) -> Result<&PairState, EngineError> {
        self.pair_state(address)
    }

    /// Read-only view of a factory.
    pub fn factory(&self, address: Address) -> Result<&FactoryState, EngineError> {
        self.factory_state(address)
    }

    pub(crate) fn insert_contract(&mut self, address: Address, contract: Contract) {
        self.contracts.insert(address, contract);
    }

    pub(crate) fn contract(&self, address: Address) -> Option<&Contract> {
        self.contracts.get(&address)
    }

    pub(crate) fn pair_state(&self, address: Address) -> Result<&PairState, EngineError> {
        match self.contracts.get(&address) {
            Some(Contract::Pair(state)) => Ok(state),
            _ => Err(EngineError::UnknownContract),
        }
    }

    pub(crate) fn pair_state_mut(&mut self, address: Address) -> Result<&mut PairState, EngineError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::Pair(state)) => Ok(state),
            _ => Err(EngineError::UnknownContract),
        }
    }

    pub(crate) fn factory_state(&self, address: Address) -> Result<&FactoryState, EngineError> {
        match self.contracts.get(&address) {
            Some(Contract::Factory(state)) => Ok(state),
            _ => Err(EngineError::UnknownContract),
        }
    }

    pub(crate) fn factory_state_mut(
        &mut self,
        address: Address,
    ) -> Result<&mut FactoryState, EngineError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::Factory(state)) => Ok(state),
            _ => Err(EngineError::UnknownContract),
        }
    }

    fn token_state_mut(&mut self, address: Address) -> Result<&mut ExternalToken, EngineError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::Token(state)) => Ok(state),
            _ => Err(EngineError::UnknownContract),
        }
    }
}
