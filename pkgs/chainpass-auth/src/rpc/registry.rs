//! Registry gateway backed by the deployed contract

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::abi;
use super::client::{JsonRpcClient, RpcError};
use crate::config::AuthConfig;
use crate::deployment::RegistryBinding;
use crate::error::{AuthError, UNAUTHORIZED_CODE, USER_REJECTED_CODE};
use crate::hasher::CredentialFingerprint;
use crate::registry::RegistryGateway;
use crate::types::AccountIdentity;

const IS_REGISTERED_SIGNATURE: &str = "isUserRegistered(address)";
const REGISTER_SIGNATURE: &str = "register(string)";
const GET_HASH_SIGNATURE: &str = "getHash()";

/// Code reported for a mined transaction whose status is failure
pub const TRANSACTION_FAILED_CODE: i64 = -32000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

/// Talks to the registry contract through a node's JSON-RPC endpoint
pub struct RpcRegistry {
    client: Arc<JsonRpcClient>,
    binding: RegistryBinding,
    receipt_poll_interval: Duration,
    receipt_poll_attempts: u32,
}

impl RpcRegistry {
    pub fn new(client: Arc<JsonRpcClient>, binding: RegistryBinding, config: &AuthConfig) -> Self {
        Self {
            client,
            binding,
            receipt_poll_interval: config.receipt_poll_interval,
            receipt_poll_attempts: config.receipt_poll_attempts,
        }
    }

    pub fn binding(&self) -> &RegistryBinding {
        &self.binding
    }

    async fn call(&self, from: Option<&AccountIdentity>, data: String) -> Result<String, RpcError> {
        let mut tx = json!({
            "to": self.binding.contract_address.to_lower_hex(),
            "data": data,
        });
        if let Some(from) = from {
            tx["from"] = json!(from.to_lower_hex());
        }
        self.client.request("eth_call", json!([tx, "latest"])).await
    }

    /// An empty return means there is no contract at the bound address
    fn ensure_code(&self, result: &str) -> Result<(), AuthError> {
        if result == "0x" || result.is_empty() {
            return Err(AuthError::Unavailable(format!(
                "no registry contract at {} on network {}",
                self.binding.contract_address, self.binding.network_id
            )));
        }
        Ok(())
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<(), AuthError> {
        for attempt in 1..=self.receipt_poll_attempts {
            let receipt: Option<TransactionReceipt> = self
                .client
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await
                .map_err(read_error)?;

            match receipt {
                Some(receipt) if receipt.status.as_deref() == Some("0x0") => {
                    warn!("Transaction {} reverted", tx_hash);
                    return Err(AuthError::ChainError {
                        code: TRANSACTION_FAILED_CODE,
                        message: format!("transaction {} reverted", tx_hash),
                    });
                }
                Some(receipt) => {
                    info!(
                        "Transaction {} confirmed in block {}",
                        tx_hash,
                        receipt.block_number.as_deref().unwrap_or("<pending>")
                    );
                    return Ok(());
                }
                None => {
                    debug!(
                        "Receipt for {} not available (attempt {}/{})",
                        tx_hash, attempt, self.receipt_poll_attempts
                    );
                    if attempt < self.receipt_poll_attempts {
                        sleep(self.receipt_poll_interval).await;
                    }
                }
            }
        }

        Err(AuthError::Unavailable(format!(
            "transaction {} not confirmed after {} attempts",
            tx_hash, self.receipt_poll_attempts
        )))
    }
}

#[async_trait]
impl RegistryGateway for RpcRegistry {
    #[instrument(skip_all, fields(account = %account))]
    async fn is_registered(&self, account: &AccountIdentity) -> Result<bool, AuthError> {
        let data = abi::encode_address_call(IS_REGISTERED_SIGNATURE, account);
        let result = self.call(None, data).await.map_err(read_error)?;
        self.ensure_code(&result)?;

        abi::decode_bool(&result)
    }

    #[instrument(skip_all, fields(account = %account))]
    async fn register(
        &self,
        account: &AccountIdentity,
        fingerprint: &CredentialFingerprint,
    ) -> Result<(), AuthError> {
        let data = abi::encode_string_call(REGISTER_SIGNATURE, fingerprint.as_str());
        let tx = json!({
            "from": account.to_lower_hex(),
            "to": self.binding.contract_address.to_lower_hex(),
            "data": data,
        });

        let tx_hash: String = self
            .client
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|e| send_error(e, account))?;
        info!("Submitted registration transaction {}", tx_hash);

        self.wait_for_receipt(&tx_hash).await
    }

    #[instrument(skip_all, fields(account = %account))]
    async fn get_stored_fingerprint(
        &self,
        account: &AccountIdentity,
    ) -> Result<CredentialFingerprint, AuthError> {
        let data = abi::encode_call(GET_HASH_SIGNATURE);
        let result = match self.call(Some(account), data).await {
            Ok(result) => result,
            // The contract reverts for callers without a record
            Err(e) if e.is_revert() => return Err(AuthError::NotRegistered(*account)),
            Err(e) => return Err(read_error(e)),
        };
        self.ensure_code(&result)?;

        abi::decode_string(&result).map(CredentialFingerprint::from_stored)
    }
}

/// Map a failed read (call or receipt lookup)
pub(crate) fn read_error(error: RpcError) -> AuthError {
    match error {
        RpcError::Transport(reason) => AuthError::Unavailable(reason),
        RpcError::InvalidResponse(reason) => {
            AuthError::Unavailable(format!("malformed registry response: {}", reason))
        }
        RpcError::Rpc { code, message, .. }
            if code == USER_REJECTED_CODE || code == UNAUTHORIZED_CODE =>
        {
            AuthError::ProviderRejected { code, message }
        }
        RpcError::Rpc { code, message, .. } => AuthError::ChainError { code, message },
    }
}

/// Map a failed transaction submission
fn send_error(error: RpcError, account: &AccountIdentity) -> AuthError {
    if error.is_revert() && error.detail().to_lowercase().contains("already registered") {
        return AuthError::DuplicateRegistration(*account);
    }

    match error {
        RpcError::Rpc { code, message, .. } if code == USER_REJECTED_CODE => {
            AuthError::UserRejected(message)
        }
        other => read_error(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account() -> AccountIdentity {
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap()
    }

    #[test]
    fn test_read_error_mapping() {
        assert!(matches!(
            read_error(RpcError::Transport("connection refused".to_string())),
            AuthError::Unavailable(_)
        ));
        assert!(matches!(
            read_error(RpcError::Rpc {
                code: 4001,
                message: "denied".to_string(),
                data: None
            }),
            AuthError::ProviderRejected { code: 4001, .. }
        ));
        assert!(matches!(
            read_error(RpcError::Rpc {
                code: 4100,
                message: "unauthorized".to_string(),
                data: None
            }),
            AuthError::ProviderRejected { code: 4100, .. }
        ));
        assert!(matches!(
            read_error(RpcError::Rpc {
                code: -32602,
                message: "invalid params".to_string(),
                data: None
            }),
            AuthError::ChainError { code: -32602, .. }
        ));
    }

    #[test]
    fn test_send_error_user_rejected() {
        let err = send_error(
            RpcError::Rpc {
                code: 4001,
                message: "User denied transaction signature".to_string(),
                data: None,
            },
            &account(),
        );
        assert_eq!(
            err,
            AuthError::UserRejected("User denied transaction signature".to_string())
        );
    }

    #[test]
    fn test_send_error_duplicate_from_message() {
        let err = send_error(
            RpcError::Rpc {
                code: -32000,
                message: "VM Exception while processing transaction: revert User already registered"
                    .to_string(),
                data: None,
            },
            &account(),
        );
        assert_eq!(err, AuthError::DuplicateRegistration(account()));
    }

    #[test]
    fn test_send_error_duplicate_from_revert_data() {
        let data = abi::encode_string_call("Error(string)", "User already registered");
        let err = send_error(
            RpcError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
                data: Some(json!(data)),
            },
            &account(),
        );
        assert_eq!(err, AuthError::DuplicateRegistration(account()));
    }

    #[test]
    fn test_send_error_other_revert_is_chain_error() {
        let err = send_error(
            RpcError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
                data: None,
            },
            &account(),
        );
        assert!(matches!(err, AuthError::ChainError { code: 3, .. }));
    }
}
