//! EIP-7702 authorization tuples: signing hash, signing and recovery.
//!
//! The signed payload is `keccak256(0x05 || rlp([chain_id, address, nonce]))`. The magic
//! byte keeps it disjoint from transaction signing hashes and personal-message hashes.

use alloy_primitives::{Address, B256};
use setcode_types::{AuthorizationTuple, ChainScope, SignedAuthorization, AUTHORIZATION_MAGIC};
use tracing::debug;

use crate::{
    account::{keccak256_bytes, recover_address, Account},
    convert::parse_address,
    error::{Eip7702Error, Eip7702Result, RlpError},
    rlp::{encode_list, RlpItem},
};

/// Build an unsigned tuple, refusing a concrete chain id of `0`.
pub fn authorization_tuple(
    scope: ChainScope,
    delegate: Address,
    nonce: u64,
) -> Eip7702Result<AuthorizationTuple> {
    if scope == ChainScope::Chain(0) {
        return Err(Eip7702Error::InvalidChainId);
    }
    Ok(AuthorizationTuple { chain_id: scope.chain_id(), address: delegate, nonce })
}

/// `rlp([chain_id, address, nonce])`.
pub fn authorization_rlp(tuple: &AuthorizationTuple) -> Result<Vec<u8>, RlpError> {
    encode_list(&[
        RlpItem::from_u64(tuple.chain_id),
        RlpItem::address(tuple.address),
        RlpItem::from_u64(tuple.nonce),
    ])
}

/// Digest the authority signs.
pub fn authorization_signing_hash(tuple: &AuthorizationTuple) -> Eip7702Result<B256> {
    let rlp = authorization_rlp(tuple)?;
    let mut buf = Vec::with_capacity(1 + rlp.len());
    buf.push(AUTHORIZATION_MAGIC);
    buf.extend_from_slice(&rlp);
    Ok(keccak256_bytes(&buf))
}

/// Sign an already validated tuple with the authority's key.
pub fn sign_authorization(
    authority: &Account,
    tuple: &AuthorizationTuple,
) -> Eip7702Result<SignedAuthorization> {
    let hash = authorization_signing_hash(tuple)?;
    let sig = authority.sign_hash(&hash)?;
    debug!(
        authority = %authority.address(),
        delegate = %tuple.address,
        chain_id = tuple.chain_id,
        nonce = tuple.nonce,
        %hash,
        "signed authorization"
    );
    Ok(SignedAuthorization { inner: *tuple, y_parity: sig.y_parity, r: sig.r, s: sig.s })
}

/// Validate user input and sign an authorization delegating `authority` to `delegate`.
///
/// `delegate` is checked before any key material is touched.
pub fn build_authorization(
    authority: &Account,
    scope: ChainScope,
    delegate: &str,
    nonce: u64,
) -> Eip7702Result<SignedAuthorization> {
    let delegate = parse_address(delegate)?;
    let tuple = authorization_tuple(scope, delegate, nonce)?;
    sign_authorization(authority, &tuple)
}

/// Address that signed `auth`.
pub fn recover_authority(auth: &SignedAuthorization) -> Eip7702Result<Address> {
    let hash = authorization_signing_hash(&auth.inner)?;
    recover_address(&hash, auth.y_parity, auth.r, auth.s)
}

pub fn verify_authorization(auth: &SignedAuthorization, expected: Address) -> Eip7702Result<bool> {
    Ok(recover_authority(auth)? == expected)
}

/// Authorization-list entry: `[chain_id, address, nonce, y_parity, r, s]`.
pub(crate) fn signed_authorization_item(auth: &SignedAuthorization) -> RlpItem {
    RlpItem::list(vec![
        RlpItem::from_u64(auth.inner.chain_id),
        RlpItem::address(auth.inner.address),
        RlpItem::from_u64(auth.inner.nonce),
        RlpItem::from_u64(u64::from(auth.y_parity)),
        RlpItem::from_u256(auth.r),
        RlpItem::from_u256(auth.s),
    ])
}

pub(crate) fn signed_authorization_from_item(item: &RlpItem) -> Result<SignedAuthorization, RlpError> {
    let fields = item.as_fixed_list(6)?;
    Ok(SignedAuthorization {
        inner: AuthorizationTuple {
            chain_id: fields[0].as_u64()?,
            address: fields[1].as_address()?,
            nonce: fields[2].as_u64()?,
        },
        y_parity: fields[3].as_u8()?,
        r: fields[4].as_u256()?,
        s: fields[5].as_u256()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rlp::decode;
    use proptest::prelude::*;

    const AUTHORITY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn pinned_signing_hash() {
        let tuple = AuthorizationTuple {
            chain_id: 56,
            address: Address::repeat_byte(0xaa),
            nonce: 3,
        };
        let rlp = authorization_rlp(&tuple).unwrap();
        assert_eq!(
            ::hex::encode(&rlp),
            "d73894aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa03"
        );
        assert_eq!(rlp.len() + 1, 25);
        assert_eq!(
            ::hex::encode(authorization_signing_hash(&tuple).unwrap()),
            "f1f1a9e77c0a917ec0b4004be826cea02f9387a4836d44aad3c9a2677969e3a2"
        );
    }

    #[test]
    fn build_is_deterministic_and_verifiable() {
        let account = Account::from_hex(AUTHORITY).unwrap();
        let delegate = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let a = build_authorization(&account, ChainScope::Chain(56), delegate, 3).unwrap();
        let b = build_authorization(&account, ChainScope::Chain(56), delegate, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.chain_id(), 56);
        assert_eq!(a.nonce(), 3);
        assert!(verify_authorization(&a, account.address()).unwrap());
        assert!(!verify_authorization(&a, Address::ZERO).unwrap());
    }

    #[test]
    fn tampered_tuple_recovers_someone_else() {
        let account = Account::from_hex(AUTHORITY).unwrap();
        let mut auth = build_authorization(
            &account,
            ChainScope::Chain(1),
            "0x1111111111111111111111111111111111111111",
            0,
        )
        .unwrap();
        auth.inner.nonce = 1;
        assert_ne!(recover_authority(&auth).unwrap(), account.address());
    }

    #[test]
    fn malformed_delegate_is_rejected() {
        let account = Account::from_hex(AUTHORITY).unwrap();
        let err = build_authorization(&account, ChainScope::Chain(1), "0x1234", 0).unwrap_err();
        assert!(matches!(err, Eip7702Error::InvalidAddress { .. }));
    }

    #[test]
    fn zero_chain_requires_explicit_any_chain() {
        let account = Account::from_hex(AUTHORITY).unwrap();
        let delegate = "0x1111111111111111111111111111111111111111";
        let err = build_authorization(&account, ChainScope::Chain(0), delegate, 0).unwrap_err();
        assert!(matches!(err, Eip7702Error::InvalidChainId));

        let any = build_authorization(&account, ChainScope::AnyChain, delegate, 0).unwrap();
        assert_eq!(any.chain_id(), 0);
        assert_eq!(any.inner.scope(), ChainScope::AnyChain);
    }

    #[test]
    fn list_entry_round_trips() {
        let account = Account::from_hex(AUTHORITY).unwrap();
        let auth = build_authorization(
            &account,
            ChainScope::Chain(11155111),
            "0x2222222222222222222222222222222222222222",
            42,
        )
        .unwrap();
        let encoded = signed_authorization_item(&auth).encode().unwrap();
        let decoded = signed_authorization_from_item(&decode(&encoded).unwrap()).unwrap();
        assert_eq!(decoded, auth);
    }

    proptest! {
        #[test]
        fn signing_is_deterministic_and_recovers_signer(
            key in any::<[u8; 32]>(),
            chain_id in 1..=u64::MAX,
            delegate in any::<[u8; 20]>(),
            nonce in any::<u64>(),
        ) {
            let account = Account::from_bytes(&key);
            prop_assume!(account.is_ok());
            let account = account.unwrap();
            let tuple =
                authorization_tuple(ChainScope::Chain(chain_id), Address::from(delegate), nonce)
                    .unwrap();

            let first = sign_authorization(&account, &tuple).unwrap();
            let second = sign_authorization(&account, &tuple).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(recover_authority(&first).unwrap(), account.address());
        }
    }
}
