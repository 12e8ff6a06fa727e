//! Client configuration
//!
//! Everything the client recognizes lives under the `client.*` keys of a
//! settings file, e.g.
//!
//! ```toml
//! [client]
//! url = "wss://node.clearline.network/ws"
//! key = "da79fe6d86347e8f8dc71eb3dbab9ba5623eaaed6c5dd0bb257c0d631faaff16"
//! request_timeout_ms = 15000
//! connect_timeout_ms = 10000
//! auth_domain = "clearline"
//! debug = false
//! ```

use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Configuration for one client / one connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Websocket endpoint of the remote node.
    pub url: String,
    /// Optional hex secret for the default keypair signer.
    pub secret_hex: Option<String>,
    /// Per-request deadline for `call`.
    pub request_timeout_ms: u64,
    /// How long `connect` waits for the open signal.
    pub connect_timeout_ms: u64,
    /// Explicit handshake domain tried before the fallback sequence.
    pub auth_domain: Option<String>,
    /// Echo every raw sent/received envelope.
    pub debug: bool,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> ClientConfig {
        ClientConfig {
            url: url.into(),
            secret_hex: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            auth_domain: None,
            debug: false,
        }
    }

    /// Read recognized options from a settings object. Missing keys keep
    /// their defaults.
    pub fn from_settings(settings: &config::Config) -> ClientConfig {
        let url = settings
            .get::<String>("client.url")
            .unwrap_or_else(|_| String::from("ws://localhost:8546/ws"));
        let mut client_config = ClientConfig::new(url);

        if let Ok(secret_hex) = settings.get::<String>("client.key") {
            client_config.secret_hex = Some(secret_hex);
        }
        if let Ok(timeout) = settings.get::<u64>("client.request_timeout_ms") {
            client_config.request_timeout_ms = timeout;
        }
        if let Ok(timeout) = settings.get::<u64>("client.connect_timeout_ms") {
            client_config.connect_timeout_ms = timeout;
        }
        if let Ok(auth_domain) = settings.get::<String>("client.auth_domain") {
            client_config.auth_domain = Some(auth_domain);
        }
        if let Ok(debug) = settings.get::<bool>("client.debug") {
            client_config.debug = debug;
        }

        client_config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
