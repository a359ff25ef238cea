//! Registry build artifact and per-network deployment resolution

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::address::Address;
use crate::error::AuthError;
use crate::types::NetworkId;

/// Functions the registry contract must expose, by name and input types
pub const REQUIRED_FUNCTIONS: [(&str, &[&str]); 3] = [
    ("isUserRegistered", &["address"]),
    ("register", &["string"]),
    ("getHash", &[]),
];

/// One deployment record from the artifact's `networks` map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDeployment {
    pub address: Address,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// Compiled registry contract as emitted by the build toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub abi: Vec<Value>,
    #[serde(default)]
    pub networks: HashMap<String, NetworkDeployment>,
}

/// The registry deployment a session is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryBinding {
    pub network_id: NetworkId,
    pub contract_address: Address,
}

impl ContractArtifact {
    /// Parse an artifact and check it exposes the registry functions
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let artifact: ContractArtifact = serde_json::from_str(json)
            .map_err(|e| AuthError::Artifact(format!("Failed to parse artifact: {}", e)))?;
        artifact.verify_abi()?;
        Ok(artifact)
    }

    /// Read an artifact file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        debug!("Loading registry artifact from {}", path.display());

        let json = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Artifact(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let artifact = Self::from_json(&json)?;

        info!(
            "Loaded artifact {} with {} deployment(s)",
            artifact.contract_name.as_deref().unwrap_or("<unnamed>"),
            artifact.networks.len()
        );
        Ok(artifact)
    }

    /// Build an artifact with a single deployment; used when no artifact file
    /// is at hand
    pub fn single(network_id: NetworkId, address: Address) -> Self {
        let mut networks = HashMap::new();
        networks.insert(
            network_id.as_str().to_string(),
            NetworkDeployment {
                address,
                transaction_hash: None,
            },
        );
        Self {
            contract_name: None,
            abi: Vec::new(),
            networks,
        }
    }

    /// Check every required function appears in the ABI
    ///
    /// An artifact without an ABI passes; there is nothing to check against.
    pub fn verify_abi(&self) -> Result<(), AuthError> {
        if self.abi.is_empty() {
            return Ok(());
        }

        for (name, inputs) in REQUIRED_FUNCTIONS {
            let found = self.abi.iter().any(|entry| {
                entry.get("type").and_then(Value::as_str).unwrap_or("function") == "function"
                    && entry.get("name").and_then(Value::as_str) == Some(name)
                    && input_types(entry) == inputs
            });
            if !found {
                return Err(AuthError::Artifact(format!(
                    "ABI is missing function {}({})",
                    name,
                    inputs.join(",")
                )));
            }
        }

        Ok(())
    }

    /// Resolve the deployment for the connected network
    pub fn resolve(&self, network_id: &NetworkId) -> Result<RegistryBinding, AuthError> {
        let deployment = self
            .networks
            .get(network_id.as_str())
            .ok_or_else(|| AuthError::UnsupportedNetwork(network_id.clone()))?;

        Ok(RegistryBinding {
            network_id: network_id.clone(),
            contract_address: deployment.address,
        })
    }
}

fn input_types(entry: &Value) -> Vec<&str> {
    entry
        .get("inputs")
        .and_then(Value::as_array)
        .map(|inputs| {
            inputs
                .iter()
                .filter_map(|input| input.get("type").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}
