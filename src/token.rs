//! Pool-share token: balances, allowances, and approval by signature.
//!
//! Every pool embeds one of these. The typed-data `permit` path binds
//! `(owner, spender, value, nonce, deadline)` under a domain separator
//! derived from the token name, version "1", the chain id, and the pool
//! address; the signed digest prefixes `0x19 0x01` before the domain
//! separator and the struct hash.

use std::collections::BTreeMap;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use swap_model::U256;

use crate::address::{keccak256, Address, ADDRESS_SIZE};
use crate::error::EngineError;

pub const TOKEN_NAME: &str = "Pairswap V1";
pub const TOKEN_SYMBOL: &str = "PSW-V1";
pub const TOKEN_DECIMALS: u8 = 18;

/// Fungible pool-share accounting for a single pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareToken {
    total_supply: U256,
    balances: BTreeMap<Address, U256>,
    allowances: BTreeMap<(Address, Address), U256>,
    nonces: BTreeMap<Address, u64>,
    domain_separator: [u8; 32],
}

impl ShareToken {
    pub fn new(chain_id: u64, contract: Address) -> Self {
        ShareToken {
            total_supply: U256::zero(),
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            nonces: BTreeMap::new(),
            domain_separator: domain_separator(chain_id, contract),
        }
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn nonce_of(&self, owner: Address) -> u64 {
        self.nonces.get(&owner).copied().unwrap_or_default()
    }

    pub fn domain_separator(&self) -> [u8; 32] {
        self.domain_separator
    }

    /// Issue new shares to `to`.
    pub fn mint(&mut self, to: Address, value: U256) -> Result<(), EngineError> {
        self.total_supply = self
            .total_supply
            .checked_add(value)
            .ok_or(EngineError::Overflow)?;
        let balance = self.balance_of(to);
        let credited = balance.checked_add(value).ok_or(EngineError::Overflow)?;
        self.balances.insert(to, credited);
        Ok(())
    }

    /// Destroy shares held by `from`.
    pub fn burn(&mut self, from: Address, value: U256) -> Result<(), EngineError> {
        let balance = self.balance_of(from);
        let debited = balance
            .checked_sub(value)
            .ok_or(EngineError::InsufficientBalance)?;
        self.balances.insert(from, debited);
        self.total_supply = self
            .total_supply
            .checked_sub(value)
            .ok_or(EngineError::Overflow)?;
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, value: U256) {
        self.allowances.insert((owner, spender), value);
    }

    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), EngineError> {
        let debited = self
            .balance_of(from)
            .checked_sub(value)
            .ok_or(EngineError::InsufficientBalance)?;
        self.balances.insert(from, debited);
        let credited = self
            .balance_of(to)
            .checked_add(value)
            .ok_or(EngineError::Overflow)?;
        self.balances.insert(to, credited);
        Ok(())
    }

    /// Delegated transfer. A `U256::MAX` allowance is infinite and is not
    /// decremented on spend.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EngineError> {
        let allowance = self.allowance(from, spender);
        if allowance != U256::MAX {
            let remaining = allowance
                .checked_sub(value)
                .ok_or(EngineError::InsufficientAllowance)?;
            self.allowances.insert((from, spender), remaining);
        }
        self.transfer(from, to, value)
    }

    /// Approval by signature. Verifies a typed-data signature over the
    /// current nonce, consumes the nonce, and sets the allowance.
    pub fn permit(
        &mut self,
        now: u64,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: u64,
        signature: &PermitSignature,
    ) -> Result<(), EngineError> {
        if now > deadline {
            return Err(EngineError::Expired);
        }
        let nonce = self.nonce_of(owner);
        let digest = self.permit_digest(owner, spender, value, nonce, deadline);
        let signer = signature.recover(&digest);
        if signer.is_zero() || signer != owner {
            return Err(EngineError::InvalidSignature);
        }
        self.nonces.insert(owner, nonce + 1);
        self.approve(owner, spender, value);
        Ok(())
    }

    /// The digest a permit signature must cover.
    pub fn permit_digest(
        &self,
        owner: Address,
        spender: Address,
        value: U256,
        nonce: u64,
        deadline: u64,
    ) -> [u8; 32] {
        let mut struct_input = Vec::with_capacity(32 * 6);
        struct_input.extend_from_slice(&permit_typehash());
        struct_input.extend_from_slice(&abi_word_address(owner));
        struct_input.extend_from_slice(&abi_word_address(spender));
        struct_input.extend_from_slice(&abi_word_u256(value));
        struct_input.extend_from_slice(&abi_word_u64(nonce));
        struct_input.extend_from_slice(&abi_word_u64(deadline));
        let struct_hash = keccak256(&struct_input);

        let mut preimage = Vec::with_capacity(2 + 32 + 32);
        preimage.extend_from_slice(&[0x19, 0x01]);
        preimage.extend_from_slice(&self.domain_separator);
        preimage.extend_from_slice(&struct_hash);
        keccak256(&preimage)
    }
}

/// A permit signature: the signer's verifying key plus an ed25519
/// signature over the permit digest. The recovered signer is the address
/// derived from the key when verification succeeds, or zero otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitSignature {
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

impl PermitSignature {
    pub fn sign(key: &SigningKey, digest: &[u8; 32]) -> Self {
        let signature = key.sign(digest);
        PermitSignature {
            public_key: key.verifying_key().to_bytes(),
            signature: signature.to_bytes(),
        }
    }

    pub fn recover(&self, digest: &[u8; 32]) -> Address {
        let Ok(key) = VerifyingKey::from_bytes(&self.public_key) else {
            return Address::ZERO;
        };
        let signature = Signature::from_bytes(&self.signature);
        if key.verify_strict(digest, &signature).is_ok() {
            Address::from_verifying_key(&key)
        } else {
            Address::ZERO
        }
    }
}

fn permit_typehash() -> [u8; 32] {
    keccak256(b"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)")
}

fn domain_separator(chain_id: u64, contract: Address) -> [u8; 32] {
    let mut input = Vec::with_capacity(32 * 5);
    input.extend_from_slice(&keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    ));
    input.extend_from_slice(&keccak256(TOKEN_NAME.as_bytes()));
    input.extend_from_slice(&keccak256(b"1"));
    input.extend_from_slice(&abi_word_u64(chain_id));
    input.extend_from_slice(&abi_word_address(contract));
    keccak256(&input)
}

fn abi_word_address(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[32 - ADDRESS_SIZE..].copy_from_slice(address.as_bytes());
    word
}

fn abi_word_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn abi_word_u256(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}
