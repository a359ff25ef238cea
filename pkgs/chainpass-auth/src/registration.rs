//! Sign-up flow

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::AuthError;
use crate::hasher;
use crate::registry::RegistryGateway;
use crate::session::SessionTracker;
use crate::status::StatusCell;
use crate::types::{AccountIdentity, FlowKind, FlowStatus};

/// Registers the session account's credentials with the registry
///
/// `Idle -> Pending -> {Succeeded | AlreadyRegistered | Failed}`. Failures
/// become a status; nothing is retried.
pub struct RegistrationFlow {
    session: Arc<SessionTracker>,
    registry: Arc<dyn RegistryGateway>,
    status: Arc<StatusCell>,
}

impl RegistrationFlow {
    pub fn new(session: Arc<SessionTracker>, registry: Arc<dyn RegistryGateway>) -> Self {
        let status = Arc::new(StatusCell::new(FlowKind::Registration));
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

    /// Submit a sign-up for the current account
    ///
    /// Returns the outcome of this submission. If the account changed while
    /// the registry call was in flight, the outcome is returned but not
    /// applied to the displayed status. Any transition counts, so switching
    /// away and back to the same account also discards the outcome; this is
    /// stricter than comparing the account at completion with the account at
    /// submission.
    ///
    /// Returns `Idle` without calling the registry if the account changes
    /// between reading it and marking the flow pending.
    #[instrument(skip_all, fields(flow = "registration"))]
    pub async fn submit(&self, username: &str, password: &str) -> FlowStatus {
        let Some((account, generation)) = self.session.snapshot() else {
            warn!("Registration submitted without a connected account");
            let outcome = FlowStatus::Failed(AuthError::Disconnected.status_message());
            self.status.set(outcome.clone());
            return outcome;
        };

        if !self
            .session
            .apply_if_current(generation, || self.status.set(FlowStatus::Pending))
        {
            debug!("Account changed before registration started, not submitting");
            return FlowStatus::Idle;
        }
        info!("Attempting to register with account: {}", account);

        let outcome = self.run(&account, username, password).await;

        let applied = self
            .session
            .apply_if_current(generation, || self.status.set(outcome.clone()));
        if !applied {
            warn!(
                "Account changed during registration for {}, discarding {:?}",
                account, outcome
            );
        }
        outcome
    }

    async fn run(&self, account: &AccountIdentity, username: &str, password: &str) -> FlowStatus {
        let fingerprint = hasher::fingerprint(username, password);

        match self.registry.is_registered(account).await {
            Ok(true) => {
                info!("Account {} is already registered, skipping register call", account);
                return FlowStatus::AlreadyRegistered;
            }
            Ok(false) => debug!("Account {} is not registered yet", account),
            Err(e) => return failed(e),
        }

        match self.registry.register(account, &fingerprint).await {
            Ok(()) => {
                info!("User registered successfully for {}", account);
                FlowStatus::Succeeded
            }
            // Someone registered this account between the check and the write
            Err(AuthError::DuplicateRegistration(_)) => FlowStatus::AlreadyRegistered,
            Err(e) => failed(e),
        }
    }
}

fn failed(error: AuthError) -> FlowStatus {
    warn!("Registration failed: {}", error);
    FlowStatus::Failed(error.status_message())
}
