//! Error types for session establishment and registry operations

use thiserror::Error;

use crate::types::{AccountIdentity, NetworkId};

/// EIP-1193 code for a request the user refused in the wallet
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 code for a request the wallet has not authorized
pub const UNAUTHORIZED_CODE: i64 = 4100;

/// Errors raised by the wallet, the registry, or session setup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No wallet available: {0}")]
    WalletUnavailable(String),

    #[error("No account granted by the wallet")]
    NoAccountGranted,

    #[error("Registry not deployed on current network (ID: {0})")]
    UnsupportedNetwork(NetworkId),

    #[error("{message}")]
    ProviderRejected { code: i64, message: String },

    #[error("{0}")]
    UserRejected(String),

    #[error("{message}")]
    ChainError { code: i64, message: String },

    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Address {0} is already registered")]
    DuplicateRegistration(AccountIdentity),

    #[error("Address {0} is not registered")]
    NotRegistered(AccountIdentity),

    #[error("Incorrect credentials")]
    CredentialMismatch,

    #[error("Wallet is not connected")]
    Disconnected,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid registry artifact: {0}")]
    Artifact(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Provider or chain error code, when the failure carries one
    pub fn code(&self) -> Option<i64> {
        match self {
            AuthError::UserRejected(_) => Some(USER_REJECTED_CODE),
            AuthError::ProviderRejected { code, .. } | AuthError::ChainError { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Startup and binding errors are fatal to session establishment
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::WalletUnavailable(_)
                | AuthError::NoAccountGranted
                | AuthError::UnsupportedNetwork(_)
        )
    }

    /// Human-readable status text for a failed flow
    pub fn status_message(&self) -> String {
        match self.code() {
            Some(code) => format!("Error {}: {}", code, self),
            None => format!("Error: {}", self),
        }
    }
}
