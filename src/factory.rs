//! Pool registry and fee governance.
//!
//! One pool per unordered token pair, created at a deterministic address
//! anyone can compute offline from the factory and the sorted tokens.
//! The `fee_to_setter` identity governs the protocol-fee recipient.

use std::collections::BTreeMap;

use log::debug;

use crate::address::{pair_address, Address};
use crate::error::EngineError;
use crate::event::Event;
use crate::ledger::{Contract, Ledger};
use crate::pair::PairState;

/// Registry state for one factory instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryState {
    pub(crate) address: Address,
    pub(crate) fee_to: Address,
    pub(crate) fee_to_setter: Address,
    pub(crate) pairs: BTreeMap<(Address, Address), Address>,
    pub(crate) all_pairs: Vec<Address>,
}

impl FactoryState {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Protocol-fee recipient; the zero address disables the fee.
    pub fn fee_to(&self) -> Address {
        self.fee_to
    }

    pub fn fee_to_setter(&self) -> Address {
        self.fee_to_setter
    }

    /// Registered pool for a token pair, in either order.
    pub fn pair_for(&self, token_a: Address, token_b: Address) -> Option<Address> {
        self.pairs.get(&(token_a, token_b)).copied()
    }

    /// Every pool this factory created, in creation order.
    pub fn all_pairs(&self) -> &[Address] {
        &self.all_pairs
    }

    pub fn all_pairs_length(&self) -> u64 {
        self.all_pairs.len() as u64
    }
}

/// Order two token addresses by byte comparison.
pub fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

impl Ledger {
    /// Deploy a factory governed by `fee_to_setter`. The protocol fee
    /// starts disabled.
    pub fn deploy_factory(&mut self, fee_to_setter: Address) -> Address {
        let address = self.next_address(b"factory");
        self.insert_contract(
            address,
            Contract::Factory(FactoryState {
                address,
                fee_to: Address::ZERO,
                fee_to_setter,
                pairs: BTreeMap::new(),
                all_pairs: Vec::new(),
            }),
        );
        address
    }

    /// Create the pool for a token pair and register it symmetrically.
    pub fn create_pair(
        &mut self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, EngineError> {
        self.transact(|led| {
            if token_a == token_b {
                return Err(EngineError::IdenticalAddresses);
            }
            let (token0, token1) = sort_tokens(token_a, token_b);
            if token0.is_zero() {
                return Err(EngineError::ZeroAddress);
            }
            if led.factory_state(factory)?.pairs.contains_key(&(token0, token1)) {
                return Err(EngineError::PairExists);
            }

            let pair = pair_address(factory, token0, token1);
            if led.contract(pair).is_some() {
                return Err(EngineError::PairExists);
            }
            let chain_id = led.chain_id();
            led.insert_contract(pair, Contract::Pair(PairState::new(factory, pair, chain_id)));
            led.initialize_pair(pair, factory, token0, token1)?;

            let state = led.factory_state_mut(factory)?;
            state.pairs.insert((token0, token1), pair);
            state.pairs.insert((token1, token0), pair);
            state.all_pairs.push(pair);
            let pair_count = state.all_pairs.len() as u64;

            led.emit(
                factory,
                Event::PairCreated {
                    token0,
                    token1,
                    pair,
                    pair_count,
                },
            );
            debug!(target: "pairswap", "create_pair factory={factory} pair={pair} ({token0}, {token1})");
            Ok(pair)
        })
    }

    /// Point the protocol fee at a recipient, or at zero to disable it.
    pub fn set_fee_to(
        &mut self,
        factory: Address,
        caller: Address,
        fee_to: Address,
    ) -> Result<(), EngineError> {
        self.transact(|led| {
            let state = led.factory_state_mut(factory)?;
            if caller != state.fee_to_setter {
                return Err(EngineError::Forbidden);
            }
            state.fee_to = fee_to;
            Ok(())
        })
    }

    /// Hand fee governance to a new setter.
    pub fn set_fee_to_setter(
        &mut self,
        factory: Address,
        caller: Address,
        fee_to_setter: Address,
    ) -> Result<(), EngineError> {
        self.transact(|led| {
            let state = led.factory_state_mut(factory)?;
            if caller != state.fee_to_setter {
                return Err(EngineError::Forbidden);
            }
            state.fee_to_setter = fee_to_setter;
            Ok(())
        })
    }

    /// Registered pool for a token pair, in either order.
    pub fn pair_for(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Option<Address>, EngineError> {
        Ok(self.factory_state(factory)?.pair_for(token_a, token_b))
    }

    /// Number of pools this factory has created.
    pub fn all_pairs_length(&self, factory: Address) -> Result<u64, EngineError> {
        Ok(self.factory_state(factory)?.all_pairs_length())
    }
}
