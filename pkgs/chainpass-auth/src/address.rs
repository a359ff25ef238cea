//! Chain addresses used as account identities and contract locations

use std::fmt;
use std::str::FromStr;

use keccak_hash::keccak;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AuthError;

/// Length of an EVM address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// A 20-byte EVM address
///
/// Parsing accepts any hex case with a `0x` prefix; equality is byte equality,
/// so `0xABC...` and `0xabc...` are the same account. `Display` renders the
/// EIP-55 mixed-case checksum form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Build an address from raw bytes
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derive the address controlled by an uncompressed secp256k1 public key
    ///
    /// Accepts either the 65-byte SEC1 form (leading `0x04`) or the bare
    /// 64-byte X||Y coordinates.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, AuthError> {
        let xy_coordinates = match public_key.len() {
            65 if public_key[0] == 0x04 => &public_key[1..],
            64 => public_key,
            len => {
                return Err(AuthError::InvalidAddress(format!(
                    "public key must be 64 or 65 bytes, got {}",
                    len
                )))
            }
        };

        // Last 20 bytes of the Keccak-256 hash
        let hash = keccak(xy_coordinates);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&hash.0[12..32]);

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex, the form JSON-RPC requests use
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 checksummed representation
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash.0[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AuthError::InvalidAddress(format!("missing 0x prefix: {}", s)))?;

        if digits.len() != ADDRESS_LENGTH * 2 {
            return Err(AuthError::InvalidAddress(format!(
                "expected {} hex digits, got {}: {}",
                ADDRESS_LENGTH * 2,
                digits.len(),
                s
            )));
        }

        let decoded = hex::decode(digits)
            .map_err(|e| AuthError::InvalidAddress(format!("{}: {}", s, e)))?;
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&decoded);

        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
