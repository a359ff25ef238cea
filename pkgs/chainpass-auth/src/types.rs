//! Shared data types: account identity, network identity, session and flow state

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// The address a wallet authenticates as; the registry's lookup key
pub type AccountIdentity = Address;

/// Network identifier as reported by `net_version` (e.g. "1", "5777")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for NetworkId {
    fn from(id: u64) -> Self {
        Self::new(id.to_string())
    }
}

/// Which account the session is currently authenticated as
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected(AccountIdentity),
}

impl SessionState {
    pub fn account(&self) -> Option<&AccountIdentity> {
        match self {
            SessionState::Connected(account) => Some(account),
            SessionState::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }
}

/// Which flow a status belongs to; selects the display text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Registration,
    Login,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::Registration => f.write_str("registration"),
            FlowKind::Login => f.write_str("login"),
        }
    }
}

/// UI-facing progress of a registration or login flow
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(String),
    AlreadyRegistered,
    NotRegistered,
    CredentialMismatch,
}

impl FlowStatus {
    /// Terminal states end a submission; `Idle` and `Pending` do not
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowStatus::Idle | FlowStatus::Pending)
    }

    /// Display text for this status in the given flow
    pub fn message(&self, kind: FlowKind) -> String {
        match (self, kind) {
            (FlowStatus::Idle, _) => String::new(),
            (FlowStatus::Pending, FlowKind::Registration) => {
                "Processing... please confirm in your wallet".to_string()
            }
            (FlowStatus::Pending, FlowKind::Login) => "Verifying credentials...".to_string(),
            (FlowStatus::Succeeded, FlowKind::Registration) => {
                "User registered successfully".to_string()
            }
            (FlowStatus::Succeeded, FlowKind::Login) => "Login successful".to_string(),
            (FlowStatus::Failed(message), _) => message.clone(),
            (FlowStatus::AlreadyRegistered, _) => "This address is already registered".to_string(),
            (FlowStatus::NotRegistered, _) => "This address is not registered".to_string(),
            (FlowStatus::CredentialMismatch, _) => "Incorrect credentials".to_string(),
        }
    }
}
