use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Domain separator prepended to the RLP of an authorization tuple before hashing.
pub const AUTHORIZATION_MAGIC: u8 = 0x05;

/// EIP-2718 type byte of a set-code (type-4) transaction.
pub const SET_CODE_TX_TYPE: u8 = 0x04;

/// EIP-2718 type byte of a dynamic-fee (type-2) transaction.
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// Which chains an authorization is valid on.
///
/// The "any chain" form encodes as chain id `0` on the wire. It has to be requested
/// explicitly: a `Chain(0)` scope is rejected by the builder instead of silently
/// widening to every chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainScope {
    Chain(u64),
    AnyChain,
}

impl ChainScope {
    /// Chain id as written into the tuple.
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Chain(id) => *id,
            Self::AnyChain => 0,
        }
    }

    /// Whether an authorization in this scope may be embedded in a transaction for `chain_id`.
    pub fn admits(&self, chain_id: u64) -> bool {
        match self {
            Self::Chain(id) => *id == chain_id,
            Self::AnyChain => true,
        }
    }
}

/// Unsigned `(chainId, address, nonce)` triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationTuple {
    /// `0` only for authorizations built with [`ChainScope::AnyChain`].
    pub chain_id: u64,
    /// Contract whose code the authority delegates to.
    pub address: Address,
    /// Authority's transaction count at build time.
    pub nonce: u64,
}

impl AuthorizationTuple {
    pub fn scope(&self) -> ChainScope {
        if self.chain_id == 0 {
            ChainScope::AnyChain
        } else {
            ChainScope::Chain(self.chain_id)
        }
    }
}

/// Authorization tuple plus the authority's recoverable signature over its signing hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    #[serde(flatten)]
    pub inner: AuthorizationTuple,
    pub y_parity: u8,
    pub r: U256,
    pub s: U256,
}

impl SignedAuthorization {
    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    pub fn nonce(&self) -> u64 {
        self.inner.nonce
    }
}

/// EIP-2930 access list entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_chain_scope_is_zero_on_the_wire() {
        assert_eq!(ChainScope::AnyChain.chain_id(), 0);
        assert!(ChainScope::AnyChain.admits(56));
        assert!(ChainScope::Chain(56).admits(56));
        assert!(!ChainScope::Chain(1).admits(56));
    }

    #[test]
    fn tuple_scope_round_trips_through_chain_id() {
        let tuple = AuthorizationTuple { chain_id: 0, address: Address::ZERO, nonce: 1 };
        assert_eq!(tuple.scope(), ChainScope::AnyChain);
        let tuple = AuthorizationTuple { chain_id: 8453, ..tuple };
        assert_eq!(tuple.scope(), ChainScope::Chain(8453));
    }

    #[test]
    fn signed_authorization_serializes_flat() {
        let signed = SignedAuthorization {
            inner: AuthorizationTuple { chain_id: 1, address: Address::ZERO, nonce: 7 },
            y_parity: 1,
            r: U256::from(2u64),
            s: U256::from(3u64),
        };
        let value = serde_json::to_value(signed).unwrap();
        assert_eq!(value["chainId"], 1);
        assert_eq!(value["nonce"], 7);
        assert_eq!(value["yParity"], 1);
    }
}
