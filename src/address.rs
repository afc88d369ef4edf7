//! Contract and account identities.
//!
//! Addresses are 20 bytes, ordered by byte comparison. Account addresses
//! derive from ed25519 verifying keys; pool addresses derive from the
//! factory and the ordered token pair, so anyone can compute a pool's
//! address offline without querying the factory.

use core::fmt;
use core::str::FromStr;

use ed25519_dalek::VerifyingKey;
use sha3::{Digest, Keccak256};

pub const ADDRESS_SIZE: usize = 20;

/// A 20-byte contract or account identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const ZERO: Address = Address([0; ADDRESS_SIZE]);

    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; ADDRESS_SIZE]
    }

    /// Account address for an ed25519 verifying key: the last 20 bytes of
    /// the key's Keccak-256 hash.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self::from_digest(keccak256(key.as_bytes()))
    }

    /// Truncate a 32-byte digest to its trailing 20 bytes.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[12..]);
        Address(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| "invalid hex string")?;
        let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| "address must be 20 bytes")?;
        Ok(Address(bytes))
    }
}

/// Keccak-256 of a byte string.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Tag hash standing in for the pool's init code in address derivation.
pub fn pair_code_hash() -> [u8; 32] {
    keccak256(b"pairswap/pair/v1")
}

/// Deterministic pool address for an ordered token pair:
/// `keccak256(0xff ++ factory ++ keccak256(token0 ++ token1) ++ code_hash)`,
/// truncated to 20 bytes. Bijective per (factory, ordered pair).
pub fn pair_address(factory: Address, token0: Address, token1: Address) -> Address {
    let mut salt_input = [0u8; ADDRESS_SIZE * 2];
    salt_input[..ADDRESS_SIZE].copy_from_slice(token0.as_bytes());
    salt_input[ADDRESS_SIZE..].copy_from_slice(token1.as_bytes());
    let salt = keccak256(&salt_input);

    let mut preimage = Vec::with_capacity(1 + ADDRESS_SIZE + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(factory.as_bytes());
    preimage.extend_from_slice(&salt);
    preimage.extend_from_slice(&pair_code_hash());
    Address::from_digest(keccak256(&preimage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_ordering() {
        let low = Address::new([0x01; 20]);
        let high = Address::new([0x02; 20]);
        assert!(low < high);

        let mut almost = [0x01; 20];
        almost[19] = 0x02;
        assert!(low < Address::new(almost));
    }

    #[test]
    fn test_hex_round_trip() {
        let addr = Address::new([0xab; 20]);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
        // bare hex without the prefix also parses
        let parsed: Address = addr.to_hex().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_rejects_malformed_hex() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("zz".repeat(20).parse::<Address>().is_err());
    }

    #[test]
    fn test_pair_address_depends_on_every_input() {
        let f = Address::new([1; 20]);
        let a = Address::new([2; 20]);
        let b = Address::new([3; 20]);

        let base = pair_address(f, a, b);
        assert_ne!(base, pair_address(f, b, a));
        assert_ne!(base, pair_address(Address::new([9; 20]), a, b));
        assert_ne!(base, pair_address(f, a, Address::new([4; 20])));
        // derivation is a pure function
        assert_eq!(base, pair_address(f, a, b));
    }
}
