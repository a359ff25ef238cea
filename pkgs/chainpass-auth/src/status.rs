//! Observable flow status

use tokio::sync::watch;

use crate::types::{FlowKind, FlowStatus};

/// Holds one flow's status and notifies subscribers on change
#[derive(Debug)]
pub struct StatusCell {
    kind: FlowKind,
    sender: watch::Sender<FlowStatus>,
}

impl StatusCell {
    pub fn new(kind: FlowKind) -> Self {
        let (sender, _) = watch::channel(FlowStatus::Idle);
        Self { kind, sender }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn get(&self) -> FlowStatus {
        self.sender.borrow().clone()
    }

    pub fn set(&self, status: FlowStatus) {
        self.sender.send_replace(status);
    }

    /// Return to `Idle`; subscribers are only notified if the status changed
    pub fn reset(&self) {
        self.sender.send_if_modified(|status| {
            if *status == FlowStatus::Idle {
                false
            } else {
                *status = FlowStatus::Idle;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowStatus> {
        self.sender.subscribe()
    }

    /// Display text for the current status
    pub fn message(&self) -> String {
        self.sender.borrow().message(self.kind)
    }
}
