//! Tests for the JSON-RPC registry and wallet backends
//!
//! A local HTTP node answers each request from a canned handler. These tests
//! cover:
//! - Registry reads through `eth_call`, including empty and reverted results
//! - Registration transactions and receipt polling
//! - Account access with and without `eth_requestAccounts`
//! - Account refresh driving a session

use std::sync::Arc;
use std::time::{Duration, Instant};

use chainpass_auth::rpc::abi;
use chainpass_auth::rpc::registry::TRANSACTION_FAILED_CODE;
use chainpass_auth::rpc::{JsonRpcClient, RpcRegistry, RpcWallet};
use chainpass_auth::{
    fingerprint, AccountIdentity, Address, AuthConfig, AuthError, ContractArtifact,
    CredentialFingerprint, FlowStatus, NetworkId, RegistrationFlow, RegistryBinding,
    RegistryGateway, SessionTracker, WalletProvider,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const NETWORK: &str = "5777";

type Reply = Result<Value, Value>;

/// Local JSON-RPC endpoint answering from a handler
struct TestNode {
    url: String,
    calls: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl TestNode {
    async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let task = {
            let calls = calls.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let calls = calls.clone();
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        serve(socket, calls, handler.as_ref()).await;
                    });
                }
            })
        };

        Self { url, calls, task }
    }

    fn client(&self) -> Arc<JsonRpcClient> {
        Arc::new(JsonRpcClient::new(self.url.clone(), Duration::from_secs(5)).unwrap())
    }

    fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|m| *m == method).count()
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<F>(mut socket: TcpStream, calls: Arc<Mutex<Vec<String>>>, handler: &F)
where
    F: Fn(&str, &Value) -> Reply,
{
    let Some(body) = read_body(&mut socket).await else {
        return;
    };
    let request: Value = serde_json::from_slice(&body).unwrap();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    calls.lock().push(method.clone());

    let reply = match handler(&method, &request["params"]) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "error": error }),
    };
    let payload = reply.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        payload.len(),
        payload
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read one HTTP request and return its body
async fn read_body(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = end + 4;
            if buf.len() >= start + len {
                return Some(buf[start..start + len].to_vec());
            }
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn rpc_error(code: i64, message: &str) -> Value {
    json!({ "code": code, "message": message })
}

fn account(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn contract() -> Address {
    Address::from_bytes([0xaa; 20])
}

fn binding() -> RegistryBinding {
    RegistryBinding {
        network_id: NetworkId::new(NETWORK),
        contract_address: contract(),
    }
}

fn config(interval: Duration, attempts: u32) -> AuthConfig {
    AuthConfig {
        receipt_poll_interval: interval,
        receipt_poll_attempts: attempts,
        ..Default::default()
    }
}

fn registry(node: &TestNode) -> RpcRegistry {
    RpcRegistry::new(
        node.client(),
        binding(),
        &config(Duration::from_millis(10), 3),
    )
}

/// ABI return data for a single `bool`
fn bool_word(value: bool) -> Value {
    json!(format!("0x{:064x}", value as u8))
}

/// ABI return data for a single `string`
fn string_return(value: &str) -> Value {
    // Call data minus "0x" and the 4-byte selector has the return layout
    let call = abi::encode_string_call("f(string)", value);
    json!(format!("0x{}", &call[10..]))
}

/// Which registry function an `eth_call` targets
fn called_function(params: &Value) -> &'static str {
    let data = params[0]["data"].as_str().unwrap_or_default();
    if data.starts_with(&abi::encode_call("isUserRegistered(address)")) {
        "isUserRegistered"
    } else if data.starts_with(&abi::encode_call("getHash()")) {
        "getHash"
    } else if data.starts_with(&abi::encode_call("register(string)")) {
        "register"
    } else {
        "unknown"
    }
}

#[tokio::test]
async fn test_is_registered_reads_contract() {
    let node = TestNode::start(|method, params| {
        assert_eq!(method, "eth_call");
        assert_eq!(params[0]["to"], json!(contract().to_lower_hex()));
        assert_eq!(params[1], json!("latest"));
        assert_eq!(called_function(params), "isUserRegistered");
        Ok(bool_word(true))
    })
    .await;

    assert!(registry(&node).is_registered(&account(1)).await.unwrap());
}

#[tokio::test]
async fn test_empty_call_result_means_no_contract() {
    let node = TestNode::start(|_, _| Ok(json!("0x"))).await;

    let err = registry(&node).is_registered(&account(1)).await.unwrap_err();

    assert!(matches!(err, AuthError::Unavailable(_)));
    assert!(err.to_string().contains("no registry contract"));
}

#[tokio::test]
async fn test_get_hash_reads_as_caller() {
    let stored = fingerprint("alice", "secret1");
    let node = {
        let stored = stored.clone();
        TestNode::start(move |_, params| {
            assert_eq!(called_function(params), "getHash");
            assert_eq!(params[0]["from"], json!(account(1).to_lower_hex()));
            Ok(string_return(stored.as_str()))
        })
        .await
    };

    let result = registry(&node).get_stored_fingerprint(&account(1)).await;

    assert_eq!(result, Ok(stored));
}

#[tokio::test]
async fn test_get_hash_revert_is_not_registered() {
    let node = TestNode::start(|_, _| Err(rpc_error(3, "execution reverted"))).await;

    let result = registry(&node).get_stored_fingerprint(&account(1)).await;

    assert_eq!(result, Err(AuthError::NotRegistered(account(1))));
}

#[tokio::test]
async fn test_register_waits_for_receipt() {
    let receipts = Arc::new(Mutex::new(0));
    let node = {
        let receipts = receipts.clone();
        TestNode::start(move |method, params| match method {
            "eth_sendTransaction" => {
                assert_eq!(params[0]["from"], json!(account(1).to_lower_hex()));
                assert_eq!(params[0]["to"], json!(contract().to_lower_hex()));
                assert_eq!(called_function(params), "register");
                Ok(json!("0xfeed"))
            }
            "eth_getTransactionReceipt" => {
                let mut seen = receipts.lock();
                *seen += 1;
                // Mined on the second lookup
                if *seen < 2 {
                    Ok(Value::Null)
                } else {
                    Ok(json!({ "status": "0x1", "blockNumber": "0x2a" }))
                }
            }
            other => panic!("unexpected method {}", other),
        })
        .await
    };

    let result = registry(&node)
        .register(&account(1), &CredentialFingerprint::from_stored("dXNlcjpwYXNz"))
        .await;

    assert_eq!(result, Ok(()));
    assert_eq!(node.calls_to("eth_getTransactionReceipt"), 2);
}

#[tokio::test]
async fn test_failed_receipt_is_chain_error() {
    let node = TestNode::start(|method, _| match method {
        "eth_sendTransaction" => Ok(json!("0xfeed")),
        _ => Ok(json!({ "status": "0x0", "blockNumber": "0x2a" })),
    })
    .await;

    let err = registry(&node)
        .register(&account(1), &fingerprint("alice", "secret1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::ChainError { code, .. } if code == TRANSACTION_FAILED_CODE
    ));
}

#[tokio::test]
async fn test_unconfirmed_transaction_is_unavailable() {
    let node = TestNode::start(|method, _| match method {
        "eth_sendTransaction" => Ok(json!("0xfeed")),
        _ => Ok(Value::Null),
    })
    .await;

    let err = registry(&node)
        .register(&account(1), &fingerprint("alice", "secret1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unavailable(_)));
    assert!(err.to_string().contains("not confirmed after 3 attempts"));
    assert_eq!(node.calls_to("eth_getTransactionReceipt"), 3);
}

#[tokio::test]
async fn test_last_receipt_attempt_does_not_sleep() {
    let node = TestNode::start(|method, _| match method {
        "eth_sendTransaction" => Ok(json!("0xfeed")),
        _ => Ok(Value::Null),
    })
    .await;
    let registry = RpcRegistry::new(
        node.client(),
        binding(),
        &config(Duration::from_secs(10), 1),
    );

    let started = Instant::now();
    let result = registry
        .register(&account(1), &fingerprint("alice", "secret1"))
        .await;

    assert!(matches!(result, Err(AuthError::Unavailable(_))));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_registration_flow_user_rejects_transaction() {
    let node = TestNode::start(|method, _| match method {
        "eth_call" => Ok(bool_word(false)),
        "eth_sendTransaction" => Err(rpc_error(4001, "User denied transaction signature")),
        other => panic!("unexpected method {}", other),
    })
    .await;
    let session = Arc::new(SessionTracker::new(
        binding(),
        chainpass_auth::SessionState::Connected(account(1)),
    ));
    let registration = RegistrationFlow::new(session, Arc::new(registry(&node)));

    let outcome = registration.submit("alice", "secret1").await;

    assert_eq!(
        outcome,
        FlowStatus::Failed("Error 4001: User denied transaction signature".to_string())
    );
    assert_eq!(node.calls_to("eth_getTransactionReceipt"), 0);
}

#[tokio::test]
async fn test_request_accounts_falls_back_to_eth_accounts() {
    let node = TestNode::start(|method, _| match method {
        "eth_requestAccounts" => Err(rpc_error(-32601, "Method not found")),
        "eth_accounts" => Ok(json!([account(1).to_lower_hex(), account(2).to_checksum()])),
        other => panic!("unexpected method {}", other),
    })
    .await;
    let wallet = RpcWallet::new(node.client());

    let accounts = wallet.request_accounts().await.unwrap();

    assert_eq!(accounts, vec![account(1), account(2)]);
    assert_eq!(node.calls_to("eth_requestAccounts"), 1);
    assert_eq!(node.calls_to("eth_accounts"), 1);
}

#[tokio::test]
async fn test_request_accounts_user_rejected() {
    let node =
        TestNode::start(|_, _| Err(rpc_error(4001, "User rejected the request."))).await;
    let wallet = RpcWallet::new(node.client());

    let err = wallet.request_accounts().await.unwrap_err();

    assert_eq!(
        err,
        AuthError::UserRejected("User rejected the request.".to_string())
    );
}

#[tokio::test]
async fn test_unreachable_wallet_is_fatal() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = Arc::new(JsonRpcClient::new(url, Duration::from_secs(5)).unwrap());
    let wallet = RpcWallet::new(client);
    let artifact = ContractArtifact::single(NetworkId::new(NETWORK), contract());

    let err = SessionTracker::initialize(&wallet, &artifact)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, AuthError::WalletUnavailable(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_refresh_accounts_drives_session() {
    let unlocked: Arc<Mutex<Vec<AccountIdentity>>> = Arc::new(Mutex::new(vec![account(1)]));
    let node = {
        let unlocked = unlocked.clone();
        TestNode::start(move |method, _| match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(unlocked
                .lock()
                .iter()
                .map(|a| a.to_lower_hex())
                .collect::<Vec<_>>())),
            "net_version" => Ok(json!(NETWORK)),
            other => panic!("unexpected method {}", other),
        })
        .await
    };
    let wallet = RpcWallet::new(node.client());
    let artifact = ContractArtifact::single(NetworkId::new(NETWORK), contract());

    let (session, guard) = SessionTracker::start(&wallet, &artifact).await.unwrap();
    assert_eq!(session.current_account(), Some(account(1)));

    // Nothing changed on the node yet
    assert!(!wallet.refresh_accounts().await.unwrap());

    let mut state_rx = session.subscribe();
    state_rx.borrow_and_update();
    *unlocked.lock() = vec![account(2), account(1)];

    assert!(wallet.refresh_accounts().await.unwrap());
    timeout(Duration::from_secs(5), state_rx.changed())
        .await
        .expect("refreshed accounts were not applied")
        .unwrap();
    assert_eq!(session.current_account(), Some(account(2)));

    assert!(!wallet.refresh_accounts().await.unwrap());
    guard.shutdown().await;
}
