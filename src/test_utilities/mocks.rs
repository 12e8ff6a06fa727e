//! A scripted Clearline node for tests.
//!
//! `MockNode` listens on a random localhost port and hands every inbound
//! request envelope to a handler, which scripts the node's behavior:
//! respond with one or more envelopes (responses or notifications), echo
//! raw text, close the connection, or stay silent.

use crate::networking::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::time::create_timestamp;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What the node does with one inbound request.
pub enum MockReply {
    /// Send these envelopes back, in order.
    Respond(Vec<ResponseEnvelope>),
    /// Send raw text that need not be a valid envelope.
    RawText(String),
    /// Close the connection.
    Close,
    /// Say nothing.
    Ignore,
}

impl MockReply {
    /// A single response envelope answering the given request id.
    pub fn respond(id: u64, method: &str, result: Value) -> MockReply {
        MockReply::Respond(vec![ResponseEnvelope::new(
            id,
            method,
            result,
            create_timestamp(),
        )])
    }
}

pub type MockHandler = dyn Fn(&RequestEnvelope) -> MockReply + Send + Sync;

pub struct MockNode {
    url: String,
    connections: Arc<AtomicUsize>,
}

impl MockNode {
    pub async fn start(handler: Arc<MockHandler>) -> MockNode {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock node");
        let addr = listener.local_addr().expect("mock node addr");
        let connections = Arc::new(AtomicUsize::new(0));

        let accepted = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                tokio::spawn(async move {
                    let ws_stream = match accept_async(stream).await {
                        Ok(ws_stream) => ws_stream,
                        Err(_) => return,
                    };
                    let (write_sink, mut read_stream) = ws_stream.split();
                    let (sender, receiver) = mpsc::unbounded_channel();
                    tokio::spawn(
                        UnboundedReceiverStream::new(receiver)
                            .map(Ok)
                            .forward(write_sink)
                            .map(|_| ()),
                    );

                    while let Some(Ok(message)) = read_stream.next().await {
                        if message.is_close() {
                            break;
                        }
                        let text = match message.into_text() {
                            Ok(text) if !text.is_empty() => text,
                            _ => continue,
                        };
                        let request = match RequestEnvelope::deserialize(&text) {
                            Ok(request) => request,
                            Err(_) => continue,
                        };
                        match handler(&request) {
                            MockReply::Respond(replies) => {
                                for reply in replies {
                                    let raw = reply.serialize().expect("serialize mock reply");
                                    if sender.send(Message::Text(raw)).is_err() {
                                        return;
                                    }
                                }
                            }
                            MockReply::RawText(raw) => {
                                if sender.send(Message::Text(raw)).is_err() {
                                    return;
                                }
                            }
                            MockReply::Close => {
                                let _ = sender.send(Message::Close(None));
                                break;
                            }
                            MockReply::Ignore => {}
                        }
                    }
                });
            }
        });

        MockNode {
            url: format!("ws://{}", addr),
            connections,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Connections accepted over the node's lifetime.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}
