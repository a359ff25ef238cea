//! Sign-in flow

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::AuthError;
use crate::hasher;
use crate::registry::RegistryGateway;
use crate::session::SessionTracker;
use crate::status::StatusCell;
use crate::types::{AccountIdentity, FlowKind, FlowStatus};

/// Verifies credentials against the fingerprint stored for the session account
///
/// `Idle -> Pending -> {Succeeded | NotRegistered | CredentialMismatch | Failed}`.
///
/// The stored fingerprint is world-readable and reversible, so a successful
/// comparison proves knowledge of the credentials to this client only; it
/// offers no confidentiality.
pub struct LoginFlow {
    session: Arc<SessionTracker>,
    registry: Arc<dyn RegistryGateway>,
    status: Arc<StatusCell>,
}

impl LoginFlow {
    pub fn new(session: Arc<SessionTracker>, registry: Arc<dyn RegistryGateway>) -> Self {
        let status = Arc::new(StatusCell::new(FlowKind::Login));
        session.attach(&status);
        Self {
            session,
            registry,
            status,
        }
    }

    pub fn status(&self) -> FlowStatus {
        self.status.get()
    }

    pub fn status_message(&self) -> String {
        self.status.message()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowStatus> {
        self.status.subscribe()
    }

    /// Submit a sign-in for the current account
    ///
    /// Same stale-result rule as registration: an outcome computed for an
    /// account that is no longer active is returned but not displayed.
    /// This includes a switch away and back to the same account during the
    /// call, which is stricter than comparing the accounts themselves.
    #[instrument(skip_all, fields(flow = "login"))]
    pub async fn submit(&self, username: &str, password: &str) -> FlowStatus {
        let Some((account, generation)) = self.session.snapshot() else {
            warn!("Login submitted without a connected account");
            let outcome = FlowStatus::Failed(AuthError::Disconnected.status_message());
            self.status.set(outcome.clone());
            return outcome;
        };

        if !self
            .session
            .apply_if_current(generation, || self.status.set(FlowStatus::Pending))
        {
            debug!("Account changed before login started, not submitting");
            return FlowStatus::Idle;
        }

        let outcome = self.run(&account, username, password).await;

        let applied = self
            .session
            .apply_if_current(generation, || self.status.set(outcome.clone()));
        if !applied {
            warn!(
                "Account changed during login for {}, discarding {:?}",
                account, outcome
            );
        }
        outcome
    }

    async fn run(&self, account: &AccountIdentity, username: &str, password: &str) -> FlowStatus {
        let fingerprint = hasher::fingerprint(username, password);

        match self.registry.is_registered(account).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Account {} is not registered", account);
                return FlowStatus::NotRegistered;
            }
            Err(e) => return failed(e),
        }

        let stored = match self.registry.get_stored_fingerprint(account).await {
            Ok(stored) => stored,
            Err(AuthError::NotRegistered(_)) => return FlowStatus::NotRegistered,
            Err(e) => return failed(e),
        };

        if stored.as_str().as_bytes() == fingerprint.as_str().as_bytes() {
            info!("Login successful for {}", account);
            FlowStatus::Succeeded
        } else {
            warn!("Credential mismatch for {}", account);
            FlowStatus::CredentialMismatch
        }
    }
}

fn failed(error: AuthError) -> FlowStatus {
    warn!("Login error: {}", error);
    FlowStatus::Failed(error.status_message())
}
