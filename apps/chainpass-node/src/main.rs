//! Command line front end for wallet-bound sign-up and sign-in

mod demo;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chainpass_auth::config::{DEFAULT_ARTIFACT_PATH, DEFAULT_RPC_URL};
use chainpass_auth::rpc::{JsonRpcClient, RpcRegistry, RpcWallet};
use chainpass_auth::{
    AuthConfig, ContractArtifact, FlowStatus, LoginFlow, RegistrationFlow, RegistryGateway,
    SessionTracker,
};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Sign up and sign in with a wallet account")]
struct Cli {
    /// JSON-RPC endpoint of the node holding the wallet accounts
    #[arg(long, default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Registry build artifact with per-network deployments
    #[arg(long, default_value = DEFAULT_ARTIFACT_PATH)]
    artifact: PathBuf,

    /// Request timeout in seconds
    #[arg(short = 't', long, default_value = "30")]
    timeout: u64,

    /// Delay between receipt lookups in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Receipt lookups before a registration is reported unconfirmed
    #[arg(long, default_value = "120")]
    poll_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register credentials for the active account
    Register(CredentialArgs),
    /// Sign in with credentials for the active account
    Login(CredentialArgs),
    /// Show the active account, network and registration state
    Whoami,
    /// Run the sign-up/sign-in scenario against an in-memory registry
    Demo(demo::DemoArgs),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(short, long)]
    username: String,

    #[arg(short, long)]
    password: String,
}

impl Cli {
    fn config(&self) -> AuthConfig {
        AuthConfig {
            rpc_url: self.rpc_url.clone(),
            artifact_path: self.artifact.clone(),
            request_timeout: Duration::from_secs(self.timeout),
            receipt_poll_interval: Duration::from_millis(self.poll_interval_ms),
            receipt_poll_attempts: self.poll_attempts,
        }
    }
}

/// Everything needed to run a flow against a live node
struct Connection {
    session: Arc<SessionTracker>,
    registry: Arc<RpcRegistry>,
}

async fn connect(config: &AuthConfig) -> Result<Connection> {
    config.check()?;

    let artifact = ContractArtifact::load(&config.artifact_path)?;
    let client = Arc::new(
        JsonRpcClient::new(config.rpc_url.clone(), config.request_timeout)
            .context("Failed to create JSON-RPC client")?,
    );
    let wallet = RpcWallet::new(client.clone());

    // One-shot commands do not need to follow account changes
    let session = Arc::new(
        SessionTracker::initialize(&wallet, &artifact)
            .await
            .context("Error initializing")?,
    );
    let registry = Arc::new(RpcRegistry::new(
        client,
        session.binding().clone(),
        config,
    ));

    Ok(Connection { session, registry })
}

/// Print each status change until the flow reaches a terminal state
fn spawn_status_printer(
    mut status_rx: watch::Receiver<FlowStatus>,
    render: impl Fn(&FlowStatus) -> String + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            println!("⏳ {}", render(&status));
            if status.is_terminal() {
                break;
            }
        }
    })
}

fn report(status: &FlowStatus, message: String) -> Result<()> {
    match status {
        FlowStatus::Failed(_) => {
            error!("{}", message);
            anyhow::bail!(message)
        }
        FlowStatus::Succeeded => {
            println!("✅ {}", message);
            Ok(())
        }
        _ => {
            println!("ℹ️  {}", message);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Respect RUST_LOG environment variable, default to INFO level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Command::Register(args) => {
            let conn = connect(&config).await?;
            let flow = RegistrationFlow::new(conn.session.clone(), conn.registry.clone());
            let printer = spawn_status_printer(flow.subscribe(), |s| {
                s.message(chainpass_auth::FlowKind::Registration)
            });

            let status = flow.submit(&args.username, &args.password).await;
            let _ = printer.await;
            report(&status, flow.status_message())
        }
        Command::Login(args) => {
            let conn = connect(&config).await?;
            let flow = LoginFlow::new(conn.session.clone(), conn.registry.clone());
            let printer = spawn_status_printer(flow.subscribe(), |s| {
                s.message(chainpass_auth::FlowKind::Login)
            });

            let status = flow.submit(&args.username, &args.password).await;
            let _ = printer.await;
            report(&status, flow.status_message())
        }
        Command::Whoami => {
            let conn = connect(&config).await?;
            let binding = conn.session.binding();
            let account = conn
                .session
                .current_account()
                .context("Please connect your wallet")?;

            println!("👤 Connected Account: {}", account);
            println!("🌐 Network: {}", binding.network_id);
            println!("📜 Registry: {}", binding.contract_address);

            let registered = conn.registry.is_registered(&account).await?;
            println!(
                "📝 Registered: {}",
                if registered { "yes" } else { "no" }
            );
            info!("whoami complete");
            Ok(())
        }
        Command::Demo(args) => demo::run(args).await,
    }
}
