//! Ownership of the single websocket connection.
//!
//! The transport holds the write half behind a channel (an unbounded
//! sender forwarded into the sink by a spawned task) and feeds everything
//! the read half produces into the client's event loop as
//! [`TransportEvent`]s. It knows nothing about envelopes or sessions;
//! closing the connection is surfaced as an event so the owner can reject
//! pending requests and reset authentication state.

use crate::error::Error;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{event, Level};
use uuid::Uuid;

/// Lifecycle events delivered to the owner of the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// One raw inbound message.
    Message(String),
    /// A read error. Logged by the owner; the connection is about to close.
    Error(String),
    /// The connection is gone. All pending requests must be rejected.
    Closed,
}

type OutboundSender = mpsc::UnboundedSender<tungstenite::Message>;

struct Connection {
    id: Uuid,
    outbound: OutboundSender,
}

pub struct Transport {
    url: String,
    connect_timeout: Duration,
    debug: bool,
    conn: Arc<Mutex<Option<Connection>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Transport {
    pub fn new(
        url: &str,
        connect_timeout: Duration,
        debug: bool,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Transport {
        Transport {
            url: String::from(url),
            connect_timeout,
            debug,
            conn: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Open the connection. A no-op when already open. Waits up to the
    /// connect timeout for the open signal.
    pub async fn connect(&self) -> crate::Result<()> {
        let mut conn = self.conn.lock().await;
        if conn.is_some() {
            return Ok(());
        }

        let url = url::Url::parse(&self.url)?;
        let connect_result = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| Error::ConnectionTimeout)?;
        let (ws_stream, _) = connect_result.map_err(|err| match err {
            tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_) => Error::ConnectionClosed,
            other => Error::WebSocket(other),
        })?;

        let connection_id = Uuid::new_v4();
        event!(Level::INFO, "connected to {} ({})", self.url, connection_id);

        let (write_sink, mut read_stream) = ws_stream.split();
        let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel();

        // writer task: forward the outbound channel into the sink
        tokio::spawn(
            UnboundedReceiverStream::new(outbound_receiver)
                .map(Ok)
                .forward(write_sink)
                .map(move |result| {
                    if let Err(err) = result {
                        event!(
                            Level::ERROR,
                            "error writing to socket {}: {}",
                            connection_id,
                            err
                        );
                    }
                }),
        );

        // reader task: pump inbound messages into the event loop
        let events = self.events.clone();
        let conn_slot = self.conn.clone();
        let debug = self.debug;
        tokio::spawn(async move {
            while let Some(result) = read_stream.next().await {
                match result {
                    Ok(message) => {
                        if message.is_close() {
                            break;
                        }
                        if let Ok(text) = message.into_text() {
                            if text.is_empty() {
                                continue;
                            }
                            if debug {
                                event!(Level::DEBUG, "recv {}", text);
                            }
                            if events.send(TransportEvent::Message(text)).is_err() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        event!(
                            Level::ERROR,
                            "error reading from socket {}: {}",
                            connection_id,
                            err
                        );
                        let _ = events.send(TransportEvent::Error(err.to_string()));
                        break;
                    }
                }
            }
            // only clear our own slot; a reconnect may already own it
            let mut conn_slot = conn_slot.lock().await;
            if conn_slot.as_ref().map(|held| held.id) == Some(connection_id) {
                conn_slot.take();
            }
            drop(conn_slot);
            let _ = events.send(TransportEvent::Closed);
            event!(Level::INFO, "connection {} closed", connection_id);
        });

        *conn = Some(Connection {
            id: connection_id,
            outbound: outbound_sender,
        });
        Ok(())
    }

    /// Write one serialized envelope, connecting first if needed.
    pub async fn send(&self, raw: String) -> crate::Result<()> {
        self.connect().await?;
        if self.debug {
            event!(Level::DEBUG, "send {}", raw);
        }
        let conn = self.conn.lock().await;
        match conn.as_ref() {
            Some(connection) => connection
                .outbound
                .send(tungstenite::Message::Text(raw))
                .map_err(|_| Error::ConnectionClosed),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Start a clean close. The reader task emits `Closed` once the
    /// connection is actually gone.
    pub async fn close(&self) {
        if let Some(connection) = self.conn.lock().await.take() {
            let _ = connection.outbound.send(tungstenite::Message::Close(None));
        }
    }
}
