//! Recursive-length-prefix codec.
//!
//! Only the subset Ethereum uses is supported: byte strings and (nested) lists.
//! Integers are written as minimal big-endian byte strings, zero as the empty string.
//! Decoding is strict and rejects every non-canonical form, so `encode(decode(x)) == x`
//! holds for any input `decode` accepts.

use alloy_primitives::{Address, B256, U256};

use crate::error::RlpError;

/// Largest payload (string body or list body) the codec will write or read.
pub const MAX_RLP_PAYLOAD: usize = 16 * 1024 * 1024;

/// Deepest list nesting accepted by the decoder.
pub const MAX_RLP_DEPTH: usize = 32;

const STRING_OFFSET: u8 = 0x80;
const LIST_OFFSET: u8 = 0xc0;
const SHORT_LIMIT: usize = 55;

/// A decoded RLP value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn list(items: Vec<RlpItem>) -> Self {
        Self::List(items)
    }

    pub fn from_u64(value: u64) -> Self {
        Self::Bytes(trim_leading_zeros(&value.to_be_bytes()).to_vec())
    }

    pub fn from_u128(value: u128) -> Self {
        Self::Bytes(trim_leading_zeros(&value.to_be_bytes()).to_vec())
    }

    pub fn from_u256(value: U256) -> Self {
        Self::Bytes(trim_leading_zeros(&value.to_be_bytes::<32>()).to_vec())
    }

    /// Signed entry point for integers that come from user input.
    pub fn from_i128(value: i128) -> Result<Self, RlpError> {
        if value < 0 {
            return Err(RlpError::NegativeInteger(value));
        }
        Ok(Self::from_u128(value as u128))
    }

    pub fn address(address: Address) -> Self {
        Self::Bytes(address.to_vec())
    }

    /// Encode this item.
    pub fn encode(&self) -> Result<Vec<u8>, RlpError> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RlpError> {
        match self {
            Self::Bytes(bytes) => {
                if bytes.len() == 1 && bytes[0] < STRING_OFFSET {
                    out.push(bytes[0]);
                } else {
                    put_header(out, STRING_OFFSET, bytes.len())?;
                    out.extend_from_slice(bytes);
                }
            }
            Self::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    item.encode_into(&mut payload)?;
                }
                put_header(out, LIST_OFFSET, payload.len())?;
                out.extend_from_slice(&payload);
            }
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> Result<&[u8], RlpError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::List(_) => Err(RlpError::ExpectedBytes),
        }
    }

    pub fn as_list(&self) -> Result<&[RlpItem], RlpError> {
        match self {
            Self::List(items) => Ok(items),
            Self::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }

    /// List with exactly `len` items.
    pub fn as_fixed_list(&self, len: usize) -> Result<&[RlpItem], RlpError> {
        let items = self.as_list()?;
        if items.len() != len {
            return Err(RlpError::UnexpectedItemCount { expected: len, found: items.len() });
        }
        Ok(items)
    }

    pub fn as_u64(&self) -> Result<u64, RlpError> {
        let bytes = self.as_integer_bytes(8)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn as_u128(&self) -> Result<u128, RlpError> {
        let bytes = self.as_integer_bytes(16)?;
        Ok(bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
    }

    pub fn as_u256(&self) -> Result<U256, RlpError> {
        let bytes = self.as_integer_bytes(32)?;
        Ok(U256::from_be_slice(bytes))
    }

    pub fn as_u8(&self) -> Result<u8, RlpError> {
        let bytes = self.as_integer_bytes(1)?;
        Ok(bytes.first().copied().unwrap_or(0))
    }

    pub fn as_address(&self) -> Result<Address, RlpError> {
        let bytes = self.as_bytes()?;
        if bytes.len() != 20 {
            return Err(RlpError::UnexpectedLength { expected: 20, found: bytes.len() });
        }
        Ok(Address::from_slice(bytes))
    }

    pub fn as_b256(&self) -> Result<B256, RlpError> {
        let bytes = self.as_bytes()?;
        if bytes.len() != 32 {
            return Err(RlpError::UnexpectedLength { expected: 32, found: bytes.len() });
        }
        Ok(B256::from_slice(bytes))
    }

    fn as_integer_bytes(&self, max_len: usize) -> Result<&[u8], RlpError> {
        let bytes = self.as_bytes()?;
        if bytes.first() == Some(&0) {
            return Err(RlpError::LeadingZeros);
        }
        if bytes.len() > max_len {
            return Err(RlpError::Overflow(max_len as u32 * 8));
        }
        Ok(bytes)
    }
}

/// Encode a list of items: the top-level shape of every payload this crate signs.
pub fn encode_list(items: &[RlpItem]) -> Result<Vec<u8>, RlpError> {
    let mut payload = Vec::new();
    for item in items {
        item.encode_into(&mut payload)?;
    }
    let mut out = Vec::with_capacity(payload.len() + 9);
    put_header(&mut out, LIST_OFFSET, payload.len())?;
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode exactly one item spanning all of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<RlpItem, RlpError> {
    let mut i = 0usize;
    let item = read_item(bytes, &mut i, 0)?;
    if i != bytes.len() {
        return Err(RlpError::TrailingBytes(bytes.len() - i));
    }
    Ok(item)
}

pub(crate) fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn put_header(out: &mut Vec<u8>, offset: u8, len: usize) -> Result<(), RlpError> {
    if len > MAX_RLP_PAYLOAD {
        return Err(RlpError::TooLong(len));
    }
    if len <= SHORT_LIMIT {
        out.push(offset + len as u8);
    } else {
        let be = (len as u64).to_be_bytes();
        let len_bytes = trim_leading_zeros(&be);
        out.push(offset + SHORT_LIMIT as u8 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }
    Ok(())
}

fn read_item(bytes: &[u8], i: &mut usize, depth: usize) -> Result<RlpItem, RlpError> {
    let prefix = *bytes.get(*i).ok_or(RlpError::Truncated)?;
    *i += 1;

    match prefix {
        0x00..=0x7f => Ok(RlpItem::Bytes(vec![prefix])),
        0x80..=0xb7 => {
            let len = usize::from(prefix - STRING_OFFSET);
            let body = read_slice(bytes, i, len)?;
            if len == 1 && body[0] < STRING_OFFSET {
                return Err(RlpError::NonCanonical);
            }
            Ok(RlpItem::Bytes(body.to_vec()))
        }
        0xb8..=0xbf => {
            let len = read_long_length(bytes, i, usize::from(prefix - 0xb7))?;
            Ok(RlpItem::Bytes(read_slice(bytes, i, len)?.to_vec()))
        }
        0xc0..=0xf7 => {
            let len = usize::from(prefix - LIST_OFFSET);
            read_list(bytes, i, len, depth)
        }
        0xf8..=0xff => {
            let len = read_long_length(bytes, i, usize::from(prefix - 0xf7))?;
            read_list(bytes, i, len, depth)
        }
    }
}

fn read_list(bytes: &[u8], i: &mut usize, len: usize, depth: usize) -> Result<RlpItem, RlpError> {
    if depth >= MAX_RLP_DEPTH {
        return Err(RlpError::TooDeep(MAX_RLP_DEPTH));
    }
    let payload = read_slice(bytes, i, len)?;
    let mut items = Vec::new();
    let mut j = 0usize;
    while j < payload.len() {
        items.push(read_item(payload, &mut j, depth + 1)?);
    }
    Ok(RlpItem::List(items))
}

fn read_long_length(bytes: &[u8], i: &mut usize, len_of_len: usize) -> Result<usize, RlpError> {
    let raw = read_slice(bytes, i, len_of_len)?;
    if raw[0] == 0 {
        return Err(RlpError::NonCanonical);
    }
    let len = raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    if len <= SHORT_LIMIT as u64 {
        return Err(RlpError::NonCanonical);
    }
    if len > MAX_RLP_PAYLOAD as u64 {
        return Err(RlpError::TooLong(len as usize));
    }
    Ok(len as usize)
}

fn read_slice<'a>(bytes: &'a [u8], i: &mut usize, len: usize) -> Result<&'a [u8], RlpError> {
    let end = i.checked_add(len).ok_or(RlpError::Truncated)?;
    if bytes.len() < end {
        return Err(RlpError::Truncated);
    }
    let out = &bytes[*i..end];
    *i = end;
    Ok(out)
}
