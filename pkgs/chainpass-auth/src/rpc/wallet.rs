//! Wallet provider backed by a node's JSON-RPC account management

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::client::{JsonRpcClient, RpcError, METHOD_NOT_FOUND_CODE};
use super::registry::read_error;
use crate::error::{AuthError, USER_REJECTED_CODE};
use crate::types::{AccountIdentity, NetworkId};
use crate::wallet::{AccountSubscription, WalletProvider};

const ACCOUNT_EVENT_CAPACITY: usize = 16;

/// Wallet whose accounts are the ones unlocked on the node
///
/// HTTP JSON-RPC has no push channel, so account changes are detected when
/// the host calls [`RpcWallet::refresh_accounts`].
pub struct RpcWallet {
    client: Arc<JsonRpcClient>,
    known_accounts: Mutex<Vec<AccountIdentity>>,
    events: broadcast::Sender<Vec<AccountIdentity>>,
}

impl RpcWallet {
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        let (events, _) = broadcast::channel(ACCOUNT_EVENT_CAPACITY);
        Self {
            client,
            known_accounts: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Re-read `eth_accounts` and notify subscribers if the list changed
    pub async fn refresh_accounts(&self) -> Result<bool, AuthError> {
        let accounts = self.fetch_accounts("eth_accounts").await?;

        let changed = {
            let mut known = self.known_accounts.lock();
            if *known == accounts {
                false
            } else {
                *known = accounts.clone();
                true
            }
        };

        if changed {
            info!("Wallet accounts changed: {} account(s)", accounts.len());
            let _ = self.events.send(accounts);
        } else {
            debug!("Wallet accounts unchanged");
        }
        Ok(changed)
    }

    async fn fetch_accounts(&self, method: &str) -> Result<Vec<AccountIdentity>, AuthError> {
        let raw: Vec<String> = self
            .client
            .request(method, json!([]))
            .await
            .map_err(wallet_error)?;

        raw.iter().map(|address| address.parse()).collect()
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<AccountIdentity>, AuthError> {
        let accounts = match self.fetch_accounts("eth_requestAccounts").await {
            // Plain nodes do not implement the EIP-1102 request method
            Err(AuthError::ChainError { code, .. }) if code == METHOD_NOT_FOUND_CODE => {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.fetch_accounts("eth_accounts").await?
            }
            other => other?,
        };

        *self.known_accounts.lock() = accounts.clone();
        Ok(accounts)
    }

    async fn network_id(&self) -> Result<NetworkId, AuthError> {
        let id: String = self
            .client
            .request("net_version", json!([]))
            .await
            .map_err(wallet_error)?;
        Ok(NetworkId::new(id))
    }

    fn subscribe_accounts(&self) -> AccountSubscription {
        AccountSubscription::new(self.events.subscribe())
    }
}

fn wallet_error(error: RpcError) -> AuthError {
    match error {
        RpcError::Transport(reason) => {
            AuthError::WalletUnavailable(format!("wallet endpoint unreachable: {}", reason))
        }
        RpcError::Rpc { code, message, .. } if code == USER_REJECTED_CODE => {
            AuthError::UserRejected(message)
        }
        other => read_error(other),
    }
}
