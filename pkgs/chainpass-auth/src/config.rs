//! Configuration for connecting to the wallet endpoint and the registry

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Default JSON-RPC endpoint of a local development chain
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Default location of the registry build artifact
pub const DEFAULT_ARTIFACT_PATH: &str = "contracts/Authentication.json";

/// Connection and confirmation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JSON-RPC endpoint serving both wallet and chain methods
    pub rpc_url: String,
    /// Registry build artifact with per-network deployments
    pub artifact_path: PathBuf,
    /// Timeout for a single JSON-RPC request
    pub request_timeout: Duration,
    /// Delay between transaction receipt lookups
    pub receipt_poll_interval: Duration,
    /// Receipt lookups before a registration is reported unconfirmed
    pub receipt_poll_attempts: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            request_timeout: Duration::from_secs(30),
            receipt_poll_interval: Duration::from_secs(1),
            receipt_poll_attempts: 120,
        }
    }
}

impl AuthConfig {
    /// Minimum request timeout: 1 second
    const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);
    /// Maximum request timeout: 5 minutes
    const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    /// Minimum receipt poll interval: 100 milliseconds
    const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// Maximum receipt poll interval: 1 minute
    const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);
    /// Maximum receipt lookups per registration
    const MAX_POLL_ATTEMPTS: u32 = 10_000;

    /// Check every parameter is within range
    ///
    /// # Returns
    /// - `Ok(())` - Configuration is valid
    /// - `Err(String)` - Describes which parameter is invalid and why
    pub fn validate(&self) -> Result<(), String> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(format!(
                "RPC URL must use http or https: {}",
                self.rpc_url
            ));
        }

        if self.artifact_path.as_os_str().is_empty() {
            return Err("Artifact path cannot be empty".to_string());
        }

        if self.request_timeout < Self::MIN_REQUEST_TIMEOUT {
            return Err(format!(
                "Request timeout too short: {:?} (min: {:?})",
                self.request_timeout,
                Self::MIN_REQUEST_TIMEOUT
            ));
        }
        if self.request_timeout > Self::MAX_REQUEST_TIMEOUT {
            return Err(format!(
                "Request timeout too long: {:?} (max: {:?})",
                self.request_timeout,
                Self::MAX_REQUEST_TIMEOUT
            ));
        }

        if self.receipt_poll_interval < Self::MIN_POLL_INTERVAL {
            return Err(format!(
                "Receipt poll interval too short: {:?} (min: {:?})",
                self.receipt_poll_interval,
                Self::MIN_POLL_INTERVAL
            ));
        }
        if self.receipt_poll_interval > Self::MAX_POLL_INTERVAL {
            return Err(format!(
                "Receipt poll interval too long: {:?} (max: {:?})",
                self.receipt_poll_interval,
                Self::MAX_POLL_INTERVAL
            ));
        }

        if self.receipt_poll_attempts == 0 || self.receipt_poll_attempts > Self::MAX_POLL_ATTEMPTS
        {
            return Err(format!(
                "Receipt poll attempts out of range: {} (1..={})",
                self.receipt_poll_attempts,
                Self::MAX_POLL_ATTEMPTS
            ));
        }

        Ok(())
    }

    /// `validate` as an [`AuthError`]
    pub fn check(&self) -> Result<(), AuthError> {
        self.validate().map_err(AuthError::Config)
    }
}
