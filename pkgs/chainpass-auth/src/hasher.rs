//! Credential fingerprint derivation
//!
//! The fingerprint is standard base64 of `"<username>:<password>"` taken over
//! Latin-1 code units, which is what a browser's `btoa` produces. Registered
//! fingerprints are compared by value, so this encoding must not change.
//!
//! This is an encoding, not a hash: anyone who reads the registry can
//! recover both the username and the password.

use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Separator between username and password in the encoded payload
pub const CREDENTIAL_SEPARATOR: char = ':';

/// Opaque credential token stored in and compared against the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    /// Wrap a value read back from the registry
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint for a username/password pair
pub fn fingerprint(username: &str, password: &str) -> CredentialFingerprint {
    let payload = format!("{}{}{}", username, CREDENTIAL_SEPARATOR, password);
    CredentialFingerprint(general_purpose::STANDARD.encode(latin1_bytes(&payload)))
}

/// One byte per code point up to U+00FF; wider code points fall back to
/// their UTF-8 bytes so every input has a fingerprint
fn latin1_bytes(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len());
    for c in s.chars() {
        if (c as u32) <= 0xFF {
            bytes.push(c as u32 as u8);
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_btoa() {
        // btoa("alice:secret1")
        assert_eq!(fingerprint("alice", "secret1").as_str(), "YWxpY2U6c2VjcmV0MQ==");
        // btoa("user:pass")
        assert_eq!(fingerprint("user", "pass").as_str(), "dXNlcjpwYXNz");
    }

    #[test]
    fn test_latin1_code_units() {
        // btoa("é:ü") encodes U+00E9 and U+00FC as single bytes
        assert_eq!(fingerprint("é", "ü").as_str(), "6Tr8");
    }

    #[test]
    fn test_wide_characters_are_encoded() {
        let fp = fingerprint("用户", "密码");
        assert!(!fp.as_str().is_empty());
        assert_eq!(fp, fingerprint("用户", "密码"));
    }

    #[test]
    fn test_separator_position_matters() {
        assert_ne!(fingerprint("ab", "c"), fingerprint("a", "bc"));
    }
}
