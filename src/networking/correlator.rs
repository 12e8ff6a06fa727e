//! Request/response correlation.
//!
//! Arbitrarily many logical calls are multiplexed over the one connection.
//! The correlator hands out the next request id, parks each caller on a
//! oneshot until the response bearing the identical id arrives, and
//! enforces the per-request deadline. Responses may arrive in any order;
//! matching is strictly by id, never by arrival order.
//!
//! Settlement is at-most-once: the pending entry is removed on
//! resolution, rejection, or timeout, whichever happens first. A response
//! arriving after its entry is gone is dropped.

use crate::error::Error;
use crate::networking::envelope::ResponseEnvelope;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

type PendingSender = oneshot::Sender<crate::Result<Value>>;

pub struct Correlator {
    pending: Mutex<HashMap<u64, PendingSender>>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl Correlator {
    pub fn new(request_timeout: Duration) -> Correlator {
        Correlator {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            request_timeout,
        }
    }

    /// The next request id. Starts at 1, strictly increasing, never
    /// reused for the lifetime of the client.
    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Park a caller for the given id. Must happen before the request is
    /// written so a fast response cannot race the registration.
    pub async fn register(&self, id: u64) -> oneshot::Receiver<crate::Result<Value>> {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(id, sender);
        receiver
    }

    /// Drop a pending entry, e.g. when the send itself failed.
    pub async fn remove(&self, id: u64) -> bool {
        self.pending.lock().await.remove(&id).is_some()
    }

    /// Settle the pending request matching this envelope, if any.
    /// Returns false when nothing was waiting on the id (a notification,
    /// or a response that arrived after its timeout).
    pub async fn settle(&self, envelope: &ResponseEnvelope) -> bool {
        let waiting = self.pending.lock().await.remove(&envelope.id);
        match waiting {
            Some(sender) => {
                let outcome = if envelope.is_error() {
                    Err(Error::Rpc(envelope.error_message()))
                } else {
                    Ok(envelope.result.clone())
                };
                // the caller may have timed out between removal and here
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Await the settlement of one request, enforcing the deadline.
    pub async fn wait(
        &self,
        id: u64,
        method: &str,
        receiver: oneshot::Receiver<crate::Result<Value>>,
    ) -> crate::Result<Value> {
        match tokio::time::timeout(self.request_timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            // sender dropped without settling: the table was torn down
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.remove(id).await;
                Err(Error::RpcTimeout(String::from(method)))
            }
        }
    }

    /// Reject every pending request. Called when the connection closes so
    /// no caller is left hanging until its timeout.
    pub async fn reject_all(&self) {
        let drained: Vec<(u64, PendingSender)> = self.pending.lock().await.drain().collect();
        for (_, sender) in drained {
            let _ = sender.send(Err(Error::ConnectionClosed));
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
