//! secp256k1 accounts: address derivation, deterministic signing and recovery.

use core::fmt;

use alloy_primitives::{Address, FixedBytes, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::{
    convert::parse_private_key,
    error::{Eip7702Error, Eip7702Result},
};

pub fn keccak256_bytes(bytes: &[u8]) -> B256 {
    let mut h = Keccak256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut b = [0u8; 32];
    b.copy_from_slice(out.as_slice());
    FixedBytes(b)
}

/// Recoverable signature split into the fields transactions carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub y_parity: u8,
    pub r: U256,
    pub s: U256,
}

/// A key pair held for the duration of one build.
pub struct Account {
    key: SigningKey,
    address: Address,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("address", &self.address).finish_non_exhaustive()
    }
}

impl Account {
    /// Rejects keys that are zero or not below the curve order.
    pub fn from_bytes(bytes: &[u8]) -> Eip7702Result<Self> {
        if bytes.len() != 32 {
            return Err(Eip7702Error::Signing(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(bytes)
            .map_err(|_| Eip7702Error::Signing("private key is out of range".to_string()))?;
        let address = public_key_to_address(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn from_hex(input: &str) -> Eip7702Result<Self> {
        Self::from_bytes(&parse_private_key(input)?)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest with an RFC 6979 nonce; `s` is always in the lower half order.
    pub fn sign_hash(&self, hash: &B256) -> Eip7702Result<RecoverableSignature> {
        let (mut signature, mut recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| Eip7702Error::Signing(e.to_string()))?;

        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }
        if recovery_id.is_x_reduced() {
            return Err(Eip7702Error::Signing("recovery id out of range".to_string()));
        }

        let (r, s) = signature.split_bytes();
        Ok(RecoverableSignature {
            y_parity: recovery_id.is_y_odd() as u8,
            r: U256::from_be_slice(r.as_slice()),
            s: U256::from_be_slice(s.as_slice()),
        })
    }
}

/// Address of the key that produced `(y_parity, r, s)` over `hash`.
pub fn recover_address(hash: &B256, y_parity: u8, r: U256, s: U256) -> Eip7702Result<Address> {
    if y_parity > 1 {
        return Err(Eip7702Error::InvalidSignature(format!("y parity {y_parity} is not 0 or 1")));
    }
    let recovery_id = RecoveryId::new(y_parity == 1, false);
    let signature = Signature::from_scalars(r.to_be_bytes::<32>(), s.to_be_bytes::<32>())
        .map_err(|e| Eip7702Error::InvalidSignature(e.to_string()))?;
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
        .map_err(|e| Eip7702Error::InvalidSignature(e.to_string()))?;
    Ok(public_key_to_address(&key))
}

fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256_bytes(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            ::hex::encode(keccak256_bytes(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn derives_known_addresses() {
        let account = Account::from_hex(ANVIL_0).unwrap();
        assert_eq!(
            account.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );

        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(
            Account::from_bytes(&one).unwrap().address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn rejects_invalid_keys() {
        assert!(matches!(Account::from_bytes(&[0u8; 32]), Err(Eip7702Error::Signing(_))));
        assert!(matches!(Account::from_bytes(&[0xffu8; 32]), Err(Eip7702Error::Signing(_))));
        assert!(matches!(Account::from_bytes(&[1u8; 31]), Err(Eip7702Error::Signing(_))));
        assert!(matches!(Account::from_hex("not hex"), Err(Eip7702Error::Signing(_))));
    }

    #[test]
    fn signatures_are_deterministic_and_recoverable() {
        let account = Account::from_hex(ANVIL_0).unwrap();
        let hash = keccak256_bytes(b"set code");
        let first = account.sign_hash(&hash).unwrap();
        let second = account.sign_hash(&hash).unwrap();
        assert_eq!(first, second);
        assert!(first.y_parity <= 1);

        let half_order = U256::from_be_slice(&::hex::decode(
            "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0",
        )
        .unwrap());
        assert!(first.s <= half_order);

        let recovered = recover_address(&hash, first.y_parity, first.r, first.s).unwrap();
        assert_eq!(recovered, account.address());
    }

    #[test]
    fn debug_output_hides_key() {
        let account = Account::from_hex(ANVIL_0).unwrap();
        let debug = format!("{account:?}");
        assert!(!debug.contains("ac0974be"));
        assert!(debug.contains("address"));
    }

    #[test]
    fn rejects_bad_parity() {
        let hash = keccak256_bytes(b"x");
        assert!(recover_address(&hash, 2, U256::from(1u64), U256::from(1u64)).is_err());
    }
}
