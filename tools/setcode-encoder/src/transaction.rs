//! Type-4 (set-code) transaction assembly, plus the explicit type-2 fallback for
//! networks that do not accept set-code envelopes.

use alloy_primitives::{Address, Bytes, B256, U256};
use setcode_types::{
    AccessListItem, SignedAuthorization, EIP1559_TX_TYPE, SET_CODE_TX_TYPE,
};
use tracing::{debug, warn};

use crate::{
    account::{keccak256_bytes, recover_address, Account, RecoverableSignature},
    authorization::{signed_authorization_from_item, signed_authorization_item},
    error::{Eip7702Error, Eip7702Result, RlpError},
    planner::CompiledPlan,
    rlp::{decode, encode_list, RlpItem},
};

/// Fee, gas and replay fields shared by both envelope types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxFields {
    pub chain_id: u64,
    /// Sender (relayer) nonce.
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub access_list: Vec<AccessListItem>,
}

/// What the transaction does once the authorization is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxCall {
    pub authority: Address,
    pub delegated: Option<DelegatedCall>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegatedCall {
    pub delegate: Address,
    pub plan: CompiledPlan,
}

impl TxCall {
    /// Authorization only: an empty call to the authority.
    pub fn bare(authority: Address) -> Self {
        Self { authority, delegated: None }
    }

    pub fn with_plan(authority: Address, delegate: Address, plan: CompiledPlan) -> Self {
        Self { authority, delegated: Some(DelegatedCall { delegate, plan }) }
    }

    /// `(to, value, data)`. An empty plan falls back to the bare form.
    pub fn destination(&self) -> (Address, U256, Bytes) {
        match &self.delegated {
            Some(call) if !call.plan.is_empty() => {
                (call.delegate, call.plan.value, call.plan.data.clone())
            }
            _ => (self.authority, U256::ZERO, Bytes::new()),
        }
    }
}

/// Sender signature over an envelope's signing hash.
pub type TxSignature = RecoverableSignature;

/// EIP-7702 transaction, signed or awaiting the sender's signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
    pub authorization_list: Vec<SignedAuthorization>,
    pub signature: Option<TxSignature>,
}

impl TransactionEnvelope {
    pub fn validate(&self) -> Eip7702Result<()> {
        check_authorizations(self.chain_id, &self.authorization_list)
    }

    fn body_items(&self) -> Vec<RlpItem> {
        vec![
            RlpItem::from_u64(self.chain_id),
            RlpItem::from_u64(self.nonce),
            RlpItem::from_u128(self.max_priority_fee_per_gas),
            RlpItem::from_u128(self.max_fee_per_gas),
            RlpItem::from_u64(self.gas_limit),
            RlpItem::address(self.to),
            RlpItem::from_u256(self.value),
            RlpItem::bytes(self.data.to_vec()),
            access_list_item(&self.access_list),
            RlpItem::list(self.authorization_list.iter().map(signed_authorization_item).collect()),
        ]
    }

    /// `keccak256(0x04 || rlp(body))`.
    pub fn signing_hash(&self) -> Eip7702Result<B256> {
        Ok(keccak256_bytes(&typed_payload(SET_CODE_TX_TYPE, &self.body_items())?))
    }

    pub fn with_signature(mut self, signature: TxSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Sign with the sending account, replacing any previous signature.
    pub fn sign(self, sender: &Account) -> Eip7702Result<Self> {
        let hash = self.signing_hash()?;
        let signature = sender.sign_hash(&hash)?;
        Ok(self.with_signature(signature))
    }

    /// Broadcastable `0x04 || rlp(body ++ [y_parity, r, s])`.
    pub fn encode(&self) -> Eip7702Result<Bytes> {
        let signature = self.signature.ok_or(Eip7702Error::Unsigned)?;
        let mut items = self.body_items();
        push_signature(&mut items, &signature);
        Ok(typed_payload(SET_CODE_TX_TYPE, &items)?.into())
    }

    pub fn decode(raw: &[u8]) -> Eip7702Result<Self> {
        let items = decode_typed(raw, SET_CODE_TX_TYPE, 13)?;
        let authorization_list = items[9]
            .as_list()?
            .iter()
            .map(signed_authorization_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            chain_id: items[0].as_u64()?,
            nonce: items[1].as_u64()?,
            max_priority_fee_per_gas: items[2].as_u128()?,
            max_fee_per_gas: items[3].as_u128()?,
            gas_limit: items[4].as_u64()?,
            to: items[5].as_address()?,
            value: items[6].as_u256()?,
            data: Bytes::copy_from_slice(items[7].as_bytes()?),
            access_list: access_list_from_item(&items[8])?,
            authorization_list,
            signature: Some(signature_from_items(&items[10..13])?),
        })
    }

    /// Hash of the encoded envelope, as reported by nodes.
    pub fn tx_hash(&self) -> Eip7702Result<B256> {
        Ok(keccak256_bytes(&self.encode()?))
    }

    /// Address of the account that signed (and pays for) this envelope.
    pub fn recover_sender(&self) -> Eip7702Result<Address> {
        let signature = self.signature.ok_or(Eip7702Error::Unsigned)?;
        recover_address(&self.signing_hash()?, signature.y_parity, signature.r, signature.s)
    }
}

/// Assemble a set-code envelope around `authorization_list`.
///
/// With a `sender` the envelope comes back signed; without one it is left unsigned so its
/// [`TransactionEnvelope::signing_hash`] can be signed elsewhere.
pub fn build_transaction(
    sender: Option<&Account>,
    fields: TxFields,
    call: &TxCall,
    authorization_list: Vec<SignedAuthorization>,
) -> Eip7702Result<TransactionEnvelope> {
    let (to, value, data) = call.destination();
    let envelope = TransactionEnvelope {
        chain_id: fields.chain_id,
        nonce: fields.nonce,
        max_priority_fee_per_gas: fields.max_priority_fee_per_gas,
        max_fee_per_gas: fields.max_fee_per_gas,
        gas_limit: fields.gas_limit,
        to,
        value,
        data,
        access_list: fields.access_list,
        authorization_list,
        signature: None,
    };
    envelope.validate()?;

    let Some(sender) = sender else {
        return Ok(envelope);
    };
    let envelope = envelope.sign(sender)?;
    debug!(
        sender = %sender.address(),
        %to,
        authorizations = envelope.authorization_list.len(),
        "signed set-code transaction"
    );
    Ok(envelope)
}

/// Conventional dynamic-fee transaction used when set-code envelopes are unavailable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackTransfer {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
    pub signature: Option<TxSignature>,
}

impl FallbackTransfer {
    fn body_items(&self) -> Vec<RlpItem> {
        vec![
            RlpItem::from_u64(self.chain_id),
            RlpItem::from_u64(self.nonce),
            RlpItem::from_u128(self.max_priority_fee_per_gas),
            RlpItem::from_u128(self.max_fee_per_gas),
            RlpItem::from_u64(self.gas_limit),
            RlpItem::address(self.to),
            RlpItem::from_u256(self.value),
            RlpItem::bytes(self.data.to_vec()),
            access_list_item(&self.access_list),
        ]
    }

    /// `keccak256(0x02 || rlp(body))`.
    pub fn signing_hash(&self) -> Eip7702Result<B256> {
        Ok(keccak256_bytes(&typed_payload(EIP1559_TX_TYPE, &self.body_items())?))
    }

    pub fn sign(mut self, sender: &Account) -> Eip7702Result<Self> {
        let hash = self.signing_hash()?;
        self.signature = Some(sender.sign_hash(&hash)?);
        Ok(self)
    }

    pub fn encode(&self) -> Eip7702Result<Bytes> {
        let signature = self.signature.ok_or(Eip7702Error::Unsigned)?;
        let mut items = self.body_items();
        push_signature(&mut items, &signature);
        Ok(typed_payload(EIP1559_TX_TYPE, &items)?.into())
    }

    pub fn decode(raw: &[u8]) -> Eip7702Result<Self> {
        let items = decode_typed(raw, EIP1559_TX_TYPE, 12)?;
        Ok(Self {
            chain_id: items[0].as_u64()?,
            nonce: items[1].as_u64()?,
            max_priority_fee_per_gas: items[2].as_u128()?,
            max_fee_per_gas: items[3].as_u128()?,
            gas_limit: items[4].as_u64()?,
            to: items[5].as_address()?,
            value: items[6].as_u256()?,
            data: Bytes::copy_from_slice(items[7].as_bytes()?),
            access_list: access_list_from_item(&items[8])?,
            signature: Some(signature_from_items(&items[9..12])?),
        })
    }

    pub fn tx_hash(&self) -> Eip7702Result<B256> {
        Ok(keccak256_bytes(&self.encode()?))
    }

    /// The advisory note carried in `data`.
    pub fn note(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Whether the target network accepts set-code envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkCapabilities {
    pub supports_set_code: bool,
}

/// Result of [`assemble`]; the fallback is never returned silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assembled {
    SetCode(TransactionEnvelope),
    Fallback { transfer: FallbackTransfer, reason: String },
}

impl Assembled {
    pub fn encode(&self) -> Eip7702Result<Bytes> {
        match self {
            Self::SetCode(envelope) => envelope.encode(),
            Self::Fallback { transfer, .. } => transfer.encode(),
        }
    }

    pub fn tx_hash(&self) -> Eip7702Result<B256> {
        match self {
            Self::SetCode(envelope) => envelope.tx_hash(),
            Self::Fallback { transfer, .. } => transfer.tx_hash(),
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Self::SetCode(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Build and sign either a set-code envelope or, on networks without type-4 support, a
/// zero-value type-2 transaction to the authority whose data is an advisory note.
///
/// Authorizations are validated against `fields.chain_id` in both cases.
pub fn assemble(
    capabilities: NetworkCapabilities,
    sender: &Account,
    fields: TxFields,
    call: &TxCall,
    authorization_list: Vec<SignedAuthorization>,
) -> Eip7702Result<Assembled> {
    if capabilities.supports_set_code {
        return build_transaction(Some(sender), fields, call, authorization_list)
            .map(Assembled::SetCode);
    }

    let chain_id = fields.chain_id;
    check_authorizations(chain_id, &authorization_list)?;

    let delegates: Vec<String> =
        authorization_list.iter().map(|a| a.address().to_string()).collect();
    let reason = format!("chain {chain_id} does not accept set-code (type 4) transactions");
    let note = format!(
        "EIP-7702 delegation of {} to {} not applied: {reason}",
        call.authority,
        delegates.join(",")
    );
    warn!(chain_id, authority = %call.authority, "falling back to a type-2 transfer");

    let transfer = FallbackTransfer {
        chain_id,
        nonce: fields.nonce,
        max_priority_fee_per_gas: fields.max_priority_fee_per_gas,
        max_fee_per_gas: fields.max_fee_per_gas,
        gas_limit: fields.gas_limit,
        to: call.authority,
        value: U256::ZERO,
        data: Bytes::from(note.into_bytes()),
        access_list: fields.access_list,
        signature: None,
    }
    .sign(sender)?;
    Ok(Assembled::Fallback { transfer, reason })
}

/// At least one authorization, each scoped to `chain_id` or to any chain.
fn check_authorizations(chain_id: u64, list: &[SignedAuthorization]) -> Eip7702Result<()> {
    if list.is_empty() {
        return Err(Eip7702Error::MissingAuthorization);
    }
    for (index, auth) in list.iter().enumerate() {
        if !auth.inner.scope().admits(chain_id) {
            return Err(Eip7702Error::NetworkMismatch {
                index,
                authorization: auth.chain_id(),
                transaction: chain_id,
            });
        }
    }
    Ok(())
}

fn typed_payload(tx_type: u8, items: &[RlpItem]) -> Result<Vec<u8>, RlpError> {
    let rlp = encode_list(items)?;
    let mut buf = Vec::with_capacity(1 + rlp.len());
    buf.push(tx_type);
    buf.extend_from_slice(&rlp);
    Ok(buf)
}

fn decode_typed(raw: &[u8], tx_type: u8, fields: usize) -> Eip7702Result<Vec<RlpItem>> {
    let (first, rest) = raw
        .split_first()
        .ok_or_else(|| Eip7702Error::MalformedEnvelope("empty input".to_string()))?;
    if *first != tx_type {
        return Err(Eip7702Error::MalformedEnvelope(format!(
            "expected type {tx_type:#04x}, found {first:#04x}"
        )));
    }
    let item = decode(rest)?;
    Ok(item.as_fixed_list(fields)?.to_vec())
}

fn push_signature(items: &mut Vec<RlpItem>, signature: &TxSignature) {
    items.push(RlpItem::from_u64(u64::from(signature.y_parity)));
    items.push(RlpItem::from_u256(signature.r));
    items.push(RlpItem::from_u256(signature.s));
}

fn signature_from_items(items: &[RlpItem]) -> Result<TxSignature, RlpError> {
    Ok(TxSignature {
        y_parity: items[0].as_u8()?,
        r: items[1].as_u256()?,
        s: items[2].as_u256()?,
    })
}

fn access_list_item(access_list: &[AccessListItem]) -> RlpItem {
    RlpItem::list(
        access_list
            .iter()
            .map(|entry| {
                RlpItem::list(vec![
                    RlpItem::address(entry.address),
                    RlpItem::list(
                        entry.storage_keys.iter().map(|k| RlpItem::bytes(k.to_vec())).collect(),
                    ),
                ])
            })
            .collect(),
    )
}

fn access_list_from_item(item: &RlpItem) -> Result<Vec<AccessListItem>, RlpError> {
    item.as_list()?
        .iter()
        .map(|entry| {
            let fields = entry.as_fixed_list(2)?;
            let storage_keys = fields[1]
                .as_list()?
                .iter()
                .map(RlpItem::as_b256)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AccessListItem { address: fields[0].as_address()?, storage_keys })
        })
        .collect()
}
