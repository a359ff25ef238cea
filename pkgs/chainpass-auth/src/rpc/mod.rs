//! Ethereum JSON-RPC backend for the registry and the wallet

pub mod abi;
pub mod client;
pub mod registry;
pub mod wallet;

pub use client::{JsonRpcClient, RpcError};
pub use registry::RpcRegistry;
pub use wallet::RpcWallet;
