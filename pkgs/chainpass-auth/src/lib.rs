//! Wallet-bound authentication for Chainpass
//!
//! A user proves identity with the account their wallet controls plus a
//! username/password pair whose fingerprint is stored in an on-chain
//! registry. This crate provides:
//! - Session tracking of the active wallet account
//! - Credential fingerprints compatible with existing registry records
//! - Registration and login flows with observable status
//! - JSON-RPC and in-memory registry and wallet backends

pub mod address;
pub mod config;
pub mod deployment;
pub mod error;
pub mod hasher;
pub mod key_derivation;
pub mod login;
pub mod memory;
pub mod registration;
pub mod registry;
pub mod rpc;
pub mod session;
pub mod status;
pub mod types;
pub mod wallet;

pub use address::Address;
pub use config::AuthConfig;
pub use deployment::{ContractArtifact, RegistryBinding};
pub use error::AuthError;
pub use hasher::{fingerprint, CredentialFingerprint};
pub use key_derivation::{derive_account, derive_accounts};
pub use login::LoginFlow;
pub use memory::{MemoryRegistry, MemoryWallet};
pub use registration::RegistrationFlow;
pub use registry::RegistryGateway;
pub use session::{ListenerGuard, SessionTracker};
pub use types::{AccountIdentity, FlowKind, FlowStatus, NetworkId, SessionState};
pub use wallet::{AccountSubscription, WalletProvider};
