//! Dispatch of server-initiated push events.
//!
//! Inbound envelopes that correlate to no pending request are
//! notifications. Each recognized method tag has its own broadcast
//! channel so consumers declare interest statically; unknown tags are
//! logged in debug and otherwise ignored. Dispatch never blocks
//! request/response correlation and never touches the pending table.

use crate::networking::envelope::ResponseEnvelope;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{event, Level};

const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NotificationKind {
    BalanceUpdate,
    ChannelUpdate,
    Transfer,
    SessionUpdate,
    Unknown,
}

impl NotificationKind {
    pub fn from_method(method: &str) -> NotificationKind {
        match method {
            "bu" => NotificationKind::BalanceUpdate,
            "cu" => NotificationKind::ChannelUpdate,
            "tr" => NotificationKind::Transfer,
            "su" => NotificationKind::SessionUpdate,
            _ => NotificationKind::Unknown,
        }
    }
}

pub struct NotificationHub {
    balance_updates: broadcast::Sender<Value>,
    channel_updates: broadcast::Sender<Value>,
    transfers: broadcast::Sender<Value>,
    session_updates: broadcast::Sender<Value>,
}

impl NotificationHub {
    pub fn new() -> NotificationHub {
        let (balance_updates, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (channel_updates, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (transfers, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (session_updates, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        NotificationHub {
            balance_updates,
            channel_updates,
            transfers,
            session_updates,
        }
    }

    pub fn subscribe_balance_updates(&self) -> broadcast::Receiver<Value> {
        self.balance_updates.subscribe()
    }

    pub fn subscribe_channel_updates(&self) -> broadcast::Receiver<Value> {
        self.channel_updates.subscribe()
    }

    pub fn subscribe_transfers(&self) -> broadcast::Receiver<Value> {
        self.transfers.subscribe()
    }

    pub fn subscribe_session_updates(&self) -> broadcast::Receiver<Value> {
        self.session_updates.subscribe()
    }

    /// Route one uncorrelated envelope to its channel. Returns the kind
    /// it dispatched as.
    pub fn dispatch(&self, envelope: &ResponseEnvelope) -> NotificationKind {
        let kind = NotificationKind::from_method(&envelope.method);
        let channel = match kind {
            NotificationKind::BalanceUpdate => &self.balance_updates,
            NotificationKind::ChannelUpdate => &self.channel_updates,
            NotificationKind::Transfer => &self.transfers,
            NotificationKind::SessionUpdate => &self.session_updates,
            NotificationKind::Unknown => {
                event!(
                    Level::DEBUG,
                    "unhandled notification method {}",
                    envelope.method
                );
                return kind;
            }
        };
        // nobody listening is fine
        let _ = channel.send(envelope.result.clone());
        kind
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        NotificationHub::new()
    }
}
