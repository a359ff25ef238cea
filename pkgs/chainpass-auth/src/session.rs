//! Session tracking: the single source of truth for the active account

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::deployment::{ContractArtifact, RegistryBinding};
use crate::error::AuthError;
use crate::status::StatusCell;
use crate::types::{AccountIdentity, SessionState};
use crate::wallet::{AccountSubscription, WalletProvider};

/// Tracks which account the session is authenticated as
///
/// The account-change handler is the only writer. Flows read the current
/// account and are reset to `Idle` whenever it changes.
pub struct SessionTracker {
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    binding: RegistryBinding,
    flows: Mutex<Vec<Weak<StatusCell>>>,
}

impl SessionTracker {
    /// Create a tracker in a known state, bound to `binding`
    pub fn new(binding: RegistryBinding, state: SessionState) -> Self {
        let (sender, _) = watch::channel(state);
        Self {
            state: sender,
            generation: AtomicU64::new(0),
            binding,
            flows: Mutex::new(Vec::new()),
        }
    }

    /// Establish the session: request account access, read the network, and
    /// bind the registry deployment for that network
    ///
    /// Errors here are fatal and are not retried.
    #[instrument(skip_all)]
    pub async fn initialize(
        wallet: &dyn WalletProvider,
        artifact: &ContractArtifact,
    ) -> Result<Self, AuthError> {
        info!("Initializing session");

        let accounts = wallet.request_accounts().await.map_err(|e| match e {
            err @ (AuthError::UserRejected(_) | AuthError::ProviderRejected { .. }) => {
                warn!("Wallet refused account access: {}", err);
                AuthError::NoAccountGranted
            }
            AuthError::Unavailable(reason) => AuthError::WalletUnavailable(reason),
            other => other,
        })?;
        let account = *accounts.first().ok_or(AuthError::NoAccountGranted)?;

        let network_id = wallet.network_id().await.map_err(|e| match e {
            AuthError::Unavailable(reason) => AuthError::WalletUnavailable(reason),
            other => other,
        })?;
        let binding = artifact.resolve(&network_id)?;

        info!(
            "Session connected as {} on network {} (registry {})",
            account, binding.network_id, binding.contract_address
        );

        Ok(Self::new(binding, SessionState::Connected(account)))
    }

    /// Initialize and start listening for account changes
    ///
    /// The subscription is taken before accounts are requested so no change
    /// is missed. Dropping the returned guard unsubscribes.
    pub async fn start(
        wallet: &dyn WalletProvider,
        artifact: &ContractArtifact,
    ) -> Result<(Arc<Self>, ListenerGuard), AuthError> {
        let subscription = wallet.subscribe_accounts();
        let session = Arc::new(Self::initialize(wallet, artifact).await?);
        let guard = session.listen(subscription);
        Ok((session, guard))
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_account(&self) -> Option<AccountIdentity> {
        self.state.borrow().account().copied()
    }

    pub fn binding(&self) -> &RegistryBinding {
        &self.binding
    }

    /// Notified on every session state transition
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Incremented on every transition; flows compare it to detect that the
    /// account changed while a call was in flight
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The active account together with the generation it belongs to
    ///
    /// The generation only moves while the state is write-locked, so reading
    /// both under one borrow always yields a matching pair.
    pub fn snapshot(&self) -> Option<(AccountIdentity, u64)> {
        let state = self.state.borrow();
        state
            .account()
            .map(|account| (*account, self.generation.load(Ordering::SeqCst)))
    }

    /// Run `apply` only if no transition happened since `generation`
    ///
    /// Holds the state borrow while `apply` runs, so a concurrent account
    /// change either lands before (and `apply` is skipped) or after (and
    /// resets whatever `apply` wrote).
    pub(crate) fn apply_if_current(&self, generation: u64, apply: impl FnOnce()) -> bool {
        let _state = self.state.borrow();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        apply();
        true
    }

    /// Reconcile with an account list pushed by the wallet
    ///
    /// Returns whether a transition happened. The first account becomes
    /// active; an empty list disconnects; the same account is a no-op.
    pub fn handle_accounts_changed(&self, accounts: &[AccountIdentity]) -> bool {
        let next = match accounts.first() {
            Some(account) => SessionState::Connected(*account),
            None => SessionState::Disconnected,
        };

        // Flows are reset before subscribers are woken, so anyone observing
        // the new state also observes idle flows
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next.clone();
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.reset_flows();
            true
        });

        if !changed {
            debug!("Account change reported the current account, ignoring");
            return false;
        }

        match &next {
            SessionState::Connected(account) => info!("Account changed to: {}", account),
            SessionState::Disconnected => info!("Wallet disconnected, no account available"),
        }
        true
    }

    /// Register a flow status to be reset on account change
    pub(crate) fn attach(&self, status: &Arc<StatusCell>) {
        self.flows.lock().push(Arc::downgrade(status));
    }

    fn reset_flows(&self) {
        let mut flows = self.flows.lock();
        flows.retain(|weak| match weak.upgrade() {
            Some(status) => {
                status.reset();
                true
            }
            None => false,
        });
    }

    /// Drive account changes from `subscription` until the guard is dropped
    pub fn listen(self: &Arc<Self>, mut subscription: AccountSubscription) -> ListenerGuard {
        let session = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(accounts) = subscription.next().await {
                let Some(tracker) = session.upgrade() else {
                    break;
                };
                tracker.handle_accounts_changed(&accounts);
            }
            debug!("Account subscription ended");
        });

        ListenerGuard { task: Some(task) }
    }
}

/// Keeps the account-change listener alive; unsubscribes when dropped
pub struct ListenerGuard {
    task: Option<JoinHandle<()>>,
}

impl ListenerGuard {
    /// Stop listening and wait for the listener task to finish
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        debug!("Account listener shut down");
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
