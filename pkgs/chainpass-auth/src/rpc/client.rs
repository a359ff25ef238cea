//! Minimal JSON-RPC 2.0 client over HTTP

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// JSON-RPC code for an unknown method
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Geth's code for a reverted call
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Errors from a JSON-RPC round trip
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Whether the node reported an execution revert
    pub fn is_revert(&self) -> bool {
        match self {
            RpcError::Rpc { code, message, .. } => {
                *code == EXECUTION_REVERTED_CODE || message.to_lowercase().contains("revert")
            }
            _ => false,
        }
    }

    /// Message plus any decodable revert reason, for substring matching
    pub fn detail(&self) -> String {
        match self {
            RpcError::Rpc { message, data, .. } => {
                let reason = data
                    .as_ref()
                    .and_then(revert_data)
                    .and_then(|hex| super::abi::decode_revert_reason(&hex));
                match reason {
                    Some(reason) => format!("{} ({})", message, reason),
                    None => message.clone(),
                }
            }
            other => other.to_string(),
        }
    }
}

/// Revert data is either a bare hex string or nested under `data`
fn revert_data(data: &Value) -> Option<String> {
    match data {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("data").and_then(revert_data),
        _ => None,
    }
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// JSON-RPC client for an Ethereum node or wallet endpoint
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` with positional `params`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("RPC request #{} {}", id, method);

        let response = self
            .http
            .post(&self.url)
            .json(&Request {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            debug!("RPC request #{} failed: {} {}", id, error.code, error.message);
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        serde_json::from_value(body.result)
            .map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_revert_detection() {
        let geth = RpcError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            data: None,
        };
        assert!(geth.is_revert());

        let ganache = RpcError::Rpc {
            code: -32000,
            message: "VM Exception while processing transaction: revert".to_string(),
            data: None,
        };
        assert!(ganache.is_revert());

        let rejected = RpcError::Rpc {
            code: 4001,
            message: "User denied transaction signature".to_string(),
            data: None,
        };
        assert!(!rejected.is_revert());
        assert!(!RpcError::Transport("refused".to_string()).is_revert());
    }

    #[test]
    fn test_revert_data_nesting() {
        assert_eq!(
            revert_data(&json!({"data": "0x08c379a0"})),
            Some("0x08c379a0".to_string())
        );
        assert_eq!(revert_data(&json!("0xdead")), Some("0xdead".to_string()));
        assert_eq!(revert_data(&json!(42)), None);
    }
}
