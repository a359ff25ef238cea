//! Sign-up and sign-in walkthrough against in-memory backends

use std::sync::Arc;

use anyhow::Result;
use chainpass_auth::{
    Address, ContractArtifact, FlowStatus, LoginFlow, MemoryRegistry, MemoryWallet, NetworkId,
    RegistrationFlow, SessionTracker,
};
use clap::Args;
use tokio::time::{timeout, Duration};
use tracing::info;

/// Well-known development mnemonic used by local chains
pub const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Address the first contract deployed by the development account lands on
const DEV_REGISTRY_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Mnemonic the demo wallet derives its accounts from
    #[arg(long, default_value = DEV_MNEMONIC)]
    mnemonic: String,

    /// Network the demo registry is deployed on
    #[arg(long, default_value = "31337")]
    network: String,

    #[arg(short, long, default_value = "alice")]
    username: String,

    #[arg(short, long, default_value = "secret1")]
    password: String,
}

fn show(step: &str, status: &FlowStatus, message: String) {
    let icon = match status {
        FlowStatus::Succeeded => "✅",
        FlowStatus::Failed(_) => "❌",
        _ => "ℹ️ ",
    };
    println!("{} {:<28} {}", icon, step, message);
}

pub async fn run(args: DemoArgs) -> Result<()> {
    let network = NetworkId::new(args.network);
    let wallet = MemoryWallet::from_mnemonic(network.clone(), &args.mnemonic, 2)?;
    let accounts = wallet.accounts();
    let artifact = ContractArtifact::single(network, DEV_REGISTRY_ADDRESS.parse::<Address>()?);

    let (session, guard) = SessionTracker::start(&wallet, &artifact).await?;
    let registry = Arc::new(MemoryRegistry::new());
    let registration = RegistrationFlow::new(session.clone(), registry.clone());
    let login = LoginFlow::new(session.clone(), registry.clone());

    println!("👤 Connected Account: {}", accounts[0]);

    let status = registration.submit(&args.username, &args.password).await;
    show("register", &status, registration.status_message());

    let status = registration.submit(&args.username, &args.password).await;
    show("register again", &status, registration.status_message());

    let status = login.submit(&args.username, &args.password).await;
    show("login", &status, login.status_message());

    let wrong = format!("{}-wrong", args.password);
    let status = login.submit(&args.username, &wrong).await;
    show("login with wrong password", &status, login.status_message());

    let mut state_rx = session.subscribe();
    state_rx.borrow_and_update();
    wallet.switch_to(accounts[1]);
    timeout(Duration::from_secs(5), state_rx.changed()).await??;
    println!("👤 Account changed to: {}", accounts[1]);
    show("login status after switch", &login.status(), login.status_message());

    let status = login.submit(&args.username, &args.password).await;
    show("login on new account", &status, login.status_message());

    info!(
        "Demo finished with {} registered account(s)",
        registry.registered_count()
    );
    guard.shutdown().await;
    Ok(())
}
