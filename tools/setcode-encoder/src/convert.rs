//! Hex and byte conversions for user-supplied identifiers.

use alloy_primitives::{Address, Bytes};

use crate::error::{Eip7702Error, Eip7702Result};

fn strip_0x(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

/// Parse a 20-byte account identifier, with or without `0x`.
///
/// Mixed-case input is accepted without checksum enforcement.
pub fn parse_address(input: &str) -> Eip7702Result<Address> {
    let digits = strip_0x(input);
    if digits.is_empty() {
        return Err(Eip7702Error::invalid_address(input, "empty"));
    }
    let bytes =
        hex::decode(digits).map_err(|e| Eip7702Error::invalid_address(input, e.to_string()))?;
    if bytes.len() != 20 {
        return Err(Eip7702Error::invalid_address(
            input,
            format!("expected 20 bytes, got {}", bytes.len()),
        ));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a possibly empty hex byte string, with or without `0x`.
pub fn parse_hex_bytes(field: &'static str, input: &str) -> Eip7702Result<Bytes> {
    let digits = strip_0x(input);
    let bytes = hex::decode(digits)
        .map_err(|e| Eip7702Error::InvalidHex { field, reason: e.to_string() })?;
    Ok(Bytes::from(bytes))
}

/// Parse a 32-byte secp256k1 private key.
///
/// Errors never echo the key material.
pub fn parse_private_key(input: &str) -> Eip7702Result<[u8; 32]> {
    let bytes = hex::decode(strip_0x(input))
        .map_err(|_| Eip7702Error::Signing("private key is not valid hex".to_string()))?;
    let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        Eip7702Error::Signing(format!("private key must be 32 bytes, got {}", bytes.len()))
    })?;
    Ok(key)
}

/// `0x`-prefixed lower-case hex.
pub fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}
