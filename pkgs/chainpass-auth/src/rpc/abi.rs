//! Solidity ABI encoding for the registry's three functions

use keccak_hash::keccak;

use crate::address::Address;
use crate::error::AuthError;

/// ABI word size in bytes
const WORD: usize = 32;

/// Selector of the standard `Error(string)` revert payload
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// First four bytes of the Keccak-256 hash of a canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash.0[0], hash.0[1], hash.0[2], hash.0[3]]
}

/// Call data for a function without arguments
pub fn encode_call(signature: &str) -> String {
    format!("0x{}", hex::encode(selector(signature)))
}

/// Call data for a function taking one `address`
pub fn encode_address_call(signature: &str, address: &Address) -> String {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&[0u8; WORD - 20]);
    data.extend_from_slice(address.as_bytes());
    format!("0x{}", hex::encode(data))
}

/// Call data for a function taking one `string`
pub fn encode_string_call(signature: &str, value: &str) -> String {
    let bytes = value.as_bytes();
    let padded_len = bytes.len().div_ceil(WORD) * WORD;

    let mut data = Vec::with_capacity(4 + 2 * WORD + padded_len);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&uint_word(WORD as u64));
    data.extend_from_slice(&uint_word(bytes.len() as u64));
    data.extend_from_slice(bytes);
    data.resize(4 + 2 * WORD + padded_len, 0);
    format!("0x{}", hex::encode(data))
}

/// Decode a returned `bool`
pub fn decode_bool(hex_data: &str) -> Result<bool, AuthError> {
    let bytes = decode_hex(hex_data)?;
    if bytes.len() < WORD {
        return Err(abi_error(format!(
            "bool return needs {} bytes, got {}",
            WORD,
            bytes.len()
        )));
    }
    Ok(bytes[..WORD].iter().any(|b| *b != 0))
}

/// Decode a returned `string`
pub fn decode_string(hex_data: &str) -> Result<String, AuthError> {
    let bytes = decode_hex(hex_data)?;
    decode_string_at(&bytes, 0)
}

/// Extract the message of an `Error(string)` revert payload
pub fn decode_revert_reason(hex_data: &str) -> Option<String> {
    let bytes = decode_hex(hex_data).ok()?;
    if bytes.len() < 4 || bytes[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    decode_string_at(&bytes[4..], 0).ok()
}

fn decode_string_at(bytes: &[u8], head: usize) -> Result<String, AuthError> {
    let offset = read_usize(bytes, head)?;
    let len = read_usize(bytes, offset)?;
    let start = offset + WORD;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| abi_error(format!("string of {} bytes overruns return data", len)))?;

    String::from_utf8(bytes[start..end].to_vec())
        .map_err(|e| abi_error(format!("string is not UTF-8: {}", e)))
}

fn read_usize(bytes: &[u8], at: usize) -> Result<usize, AuthError> {
    let word = at
        .checked_add(WORD)
        .and_then(|end| bytes.get(at..end))
        .ok_or_else(|| abi_error(format!("no word at offset {}", at)))?;

    // Anything beyond 8 bytes cannot be a real offset or length
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(abi_error(format!("word at offset {} is too large", at)));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| abi_error(format!("word at offset {} is too large", at)))
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn decode_hex(hex_data: &str) -> Result<Vec<u8>, AuthError> {
    let digits = hex_data.strip_prefix("0x").unwrap_or(hex_data);
    hex::decode(digits).map_err(|e| abi_error(format!("invalid hex: {}", e)))
}

fn abi_error(message: String) -> AuthError {
    AuthError::Unavailable(format!("malformed registry response: {}", message))
}
