//! Error types for the Clearline client

use crate::signer::SignError;
use thiserror::Error;

/// Errors surfaced to callers of the client.
///
/// Transport and correlation failures always propagate to the caller that
/// is awaiting the affected request. Authentication soft failures (absent
/// challenge, rejected signature) are recovered internally by the handshake
/// and never appear here individually; only total exhaustion surfaces as
/// `AuthenticationFailed`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("timed out waiting for the connection to open")]
    ConnectionTimeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request {0} timed out")]
    RpcTimeout(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("authentication failed: all domains and signers exhausted")]
    AuthenticationFailed,

    #[error("signer error: {0}")]
    Signer(#[from] SignError),

    #[error("key error: {0}")]
    Key(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
