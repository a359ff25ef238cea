//! In-process registry and wallet
//!
//! `MemoryRegistry` enforces the same register-once rule as the contract and
//! counts calls so callers can assert how many mutations were issued.
//! `MemoryWallet` lets the host switch accounts at runtime the way a user
//! would in a browser wallet.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::AuthError;
use crate::hasher::CredentialFingerprint;
use crate::key_derivation;
use crate::registry::RegistryGateway;
use crate::types::{AccountIdentity, NetworkId};
use crate::wallet::{AccountSubscription, WalletProvider};

/// Capacity of the account-change broadcast channel
const ACCOUNT_EVENT_CAPACITY: usize = 16;

/// Registry backed by a map, with call counters and failure injection
#[derive(Default)]
pub struct MemoryRegistry {
    records: Mutex<HashMap<AccountIdentity, CredentialFingerprint>>,
    read_failure: Mutex<Option<AuthError>>,
    register_failure: Mutex<Option<AuthError>>,
    read_calls: AtomicUsize,
    mutating_calls: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `is_registered` or `get_stored_fingerprint` fail
    pub fn fail_next_read(&self, error: AuthError) {
        *self.read_failure.lock() = Some(error);
    }

    /// Make the next `register` fail
    pub fn fail_next_register(&self, error: AuthError) {
        *self.register_failure.lock() = Some(error);
    }

    /// Number of `register` calls received, successful or not
    pub fn mutating_calls(&self) -> usize {
        self.mutating_calls.load(Ordering::SeqCst)
    }

    /// Number of `is_registered` and `get_stored_fingerprint` calls received
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn registered_count(&self) -> usize {
        self.records.lock().len()
    }

    fn take_failure(slot: &Mutex<Option<AuthError>>) -> Result<(), AuthError> {
        match slot.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryGateway for MemoryRegistry {
    async fn is_registered(&self, account: &AccountIdentity) -> Result<bool, AuthError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_failure(&self.read_failure)?;

        Ok(self.records.lock().contains_key(account))
    }

    async fn register(
        &self,
        account: &AccountIdentity,
        fingerprint: &CredentialFingerprint,
    ) -> Result<(), AuthError> {
        self.mutating_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_failure(&self.register_failure)?;

        let mut records = self.records.lock();
        if records.contains_key(account) {
            return Err(AuthError::DuplicateRegistration(*account));
        }
        records.insert(*account, fingerprint.clone());

        debug!("Stored fingerprint for {}", account);
        Ok(())
    }

    async fn get_stored_fingerprint(
        &self,
        account: &AccountIdentity,
    ) -> Result<CredentialFingerprint, AuthError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_failure(&self.read_failure)?;

        self.records
            .lock()
            .get(account)
            .cloned()
            .ok_or(AuthError::NotRegistered(*account))
    }
}

/// Wallet whose granted accounts are set by the host
pub struct MemoryWallet {
    accounts: Mutex<Vec<AccountIdentity>>,
    network_id: NetworkId,
    grant_access: bool,
    events: broadcast::Sender<Vec<AccountIdentity>>,
}

impl MemoryWallet {
    pub fn new(network_id: NetworkId, accounts: Vec<AccountIdentity>) -> Self {
        let (events, _) = broadcast::channel(ACCOUNT_EVENT_CAPACITY);
        Self {
            accounts: Mutex::new(accounts),
            network_id,
            grant_access: true,
            events,
        }
    }

    /// Wallet exposing the first `count` accounts derived from `mnemonic`
    pub fn from_mnemonic(
        network_id: NetworkId,
        mnemonic: &str,
        count: u32,
    ) -> anyhow::Result<Self> {
        let accounts = key_derivation::derive_accounts(mnemonic, count)?;
        info!(
            "Derived {} development account(s) for network {}",
            accounts.len(),
            network_id
        );
        Ok(Self::new(network_id, accounts))
    }

    /// Wallet that refuses every account request, as when the user declines
    pub fn denying(network_id: NetworkId) -> Self {
        let mut wallet = Self::new(network_id, Vec::new());
        wallet.grant_access = false;
        wallet
    }

    pub fn accounts(&self) -> Vec<AccountIdentity> {
        self.accounts.lock().clone()
    }

    /// Replace the account list and notify subscribers
    pub fn set_accounts(&self, accounts: Vec<AccountIdentity>) {
        *self.accounts.lock() = accounts.clone();
        // No subscribers is fine
        let _ = self.events.send(accounts);
    }

    /// Make `account` the active one, keeping the others after it
    pub fn switch_to(&self, account: AccountIdentity) {
        let mut accounts = self.accounts();
        accounts.retain(|a| *a != account);
        accounts.insert(0, account);
        self.set_accounts(accounts);
    }

    /// Report an empty account list, as when the wallet locks
    pub fn disconnect(&self) {
        self.set_accounts(Vec::new());
    }
}

#[async_trait]
impl WalletProvider for MemoryWallet {
    async fn request_accounts(&self) -> Result<Vec<AccountIdentity>, AuthError> {
        if !self.grant_access {
            return Err(AuthError::UserRejected("User rejected the request.".to_string()));
        }
        Ok(self.accounts())
    }

    async fn network_id(&self) -> Result<NetworkId, AuthError> {
        Ok(self.network_id.clone())
    }

    fn subscribe_accounts(&self) -> AccountSubscription {
        AccountSubscription::new(self.events.subscribe())
    }
}
