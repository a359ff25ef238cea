//! Interface to the wallet that owns account identity

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::AuthError;
use crate::types::{AccountIdentity, NetworkId};

/// Wallet collaborator: grants accounts, reports the network, and pushes
/// account changes
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for account access; may prompt the user
    async fn request_accounts(&self) -> Result<Vec<AccountIdentity>, AuthError>;

    /// Network the wallet is currently connected to
    async fn network_id(&self) -> Result<NetworkId, AuthError>;

    /// Subscribe to account-list changes
    fn subscribe_accounts(&self) -> AccountSubscription;
}

/// Receiving end of a wallet's account-change notifications
///
/// Dropping the subscription unsubscribes.
pub struct AccountSubscription {
    receiver: broadcast::Receiver<Vec<AccountIdentity>>,
}

impl AccountSubscription {
    pub fn new(receiver: broadcast::Receiver<Vec<AccountIdentity>>) -> Self {
        Self { receiver }
    }

    /// Wait for the next account list; `None` once the wallet hangs up
    pub async fn next(&mut self) -> Option<Vec<AccountIdentity>> {
        loop {
            match self.receiver.recv().await {
                Ok(accounts) => return Some(accounts),
                // Only the most recent list matters
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Account subscription lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
