/*!
# Welcome to Clearline

Clearline is a settlement network that clears off-chain balance updates
between counterparties and anchors the results on-chain. This crate is the
Rust client for a Clearline node: a single persistent websocket connection
carrying multiplexed RPC traffic in both directions, with a challenge-signing
authentication handshake layered on top.

The client provides:

- request/response correlation over one full-duplex connection
- an authentication state machine with domain and signer fallback
- ephemeral session-key handling for signed application calls
- typed notification channels for server-initiated push events

# Usage

```no_run
use clearline_rust::config::ClientConfig;
use clearline_rust::networking::auth::AuthOptions;
use clearline_rust::networking::client::Client;
use clearline_rust::signer::KeypairSigner;
use std::sync::Arc;

#[tokio::main]
async fn main() -> clearline_rust::Result<()> {
    let mut config = ClientConfig::new("ws://localhost:8546/ws");
    config.debug = true;

    let signer = Arc::new(KeypairSigner::generate());
    let client = Client::new(config, signer);

    client.connect().await?;
    client.authenticate(AuthOptions::new("my-app")).await?;

    let pong = client.call("ping", serde_json::json!({})).await?;
    println!("{}", pong);
    Ok(())
}
```

# Contact

The Clearline Team
dev@clearline.network

*/
pub mod config;
pub mod crypto;
pub mod error;
pub mod keypair;
pub mod networking;
pub mod signer;
pub mod time;

#[cfg(test)]
mod test_setup;
pub mod test_utilities;

pub use crate::error::Error;

/// Convenience Result carrying the crate error taxonomy.
pub type Result<T> = std::result::Result<T, Error>;
