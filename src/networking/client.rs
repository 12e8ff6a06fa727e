//! The Clearline RPC client.
//!
//! One `Client` owns one logical connection: the transport, the
//! correlator, the authentication session, and the notification hub.
//! `call` and `authenticate` are async and may be awaited concurrently
//! from arbitrarily many call sites. Reconnection is not automatic: a
//! caller that needs resilience calls `connect` / `authenticate` again
//! after a close.

use crate::config::ClientConfig;
use crate::error::Error;
use crate::networking::auth::Session;
use crate::networking::correlator::Correlator;
use crate::networking::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::networking::notifications::NotificationHub;
use crate::networking::transport::{Transport, TransportEvent};
use crate::signer::{KeyRef, KeypairSigner, Signer};
use crate::time::create_timestamp;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{event, Level};

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) signer: Arc<dyn Signer>,
    pub(crate) transport: Transport,
    pub(crate) correlator: Correlator,
    pub(crate) session: RwLock<Session>,
    pub(crate) hub: NotificationHub,
    /// Serializes handshakes so concurrent `authenticate` calls collapse
    /// into one.
    pub(crate) auth_gate: Mutex<()>,
}

#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Build a client for one endpoint. Must be called inside a tokio
    /// runtime; the inbound event loop is spawned here.
    pub fn new(config: ClientConfig, signer: Arc<dyn Signer>) -> Client {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let transport = Transport::new(
            &config.url,
            config.connect_timeout(),
            config.debug,
            event_sender,
        );
        let correlator = Correlator::new(config.request_timeout());
        let inner = Arc::new(ClientInner {
            config,
            signer,
            transport,
            correlator,
            session: RwLock::new(Session::default()),
            hub: NotificationHub::new(),
            auth_gate: Mutex::new(()),
        });
        tokio::spawn(run_event_loop(inner.clone(), event_receiver));
        Client { inner }
    }

    /// Build a client with the default keypair signer: the configured
    /// secret when one is present, a freshly generated identity otherwise.
    pub fn from_config(config: ClientConfig) -> crate::Result<Client> {
        let signer: Arc<dyn Signer> = match &config.secret_hex {
            Some(secret_hex) => Arc::new(KeypairSigner::from_secret_hex(secret_hex)?),
            None => Arc::new(KeypairSigner::generate()),
        };
        Ok(Client::new(config, signer))
    }

    /// Open the connection. A no-op when already open; otherwise the
    /// authentication state is reset to unauthenticated first.
    pub async fn connect(&self) -> crate::Result<()> {
        if !self.inner.transport.is_open().await {
            self.inner.session.write().await.reset();
        }
        self.inner.transport.connect().await
    }

    /// Start a clean close. Pending requests are rejected once the close
    /// completes and the authenticated flag is cleared.
    pub async fn close(&self) {
        self.inner.transport.close().await;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.read().await.authenticated
    }

    /// Snapshot of the authentication session state.
    pub async fn session(&self) -> Session {
        self.inner.session.read().await.clone()
    }

    /// Issue a request signed with the active session key when the
    /// connection is authenticated, unsigned otherwise.
    pub async fn call(&self, method: &str, params: Value) -> crate::Result<Value> {
        let keys = match self.inner.session.read().await.active_key() {
            Some(key) => vec![key],
            None => vec![],
        };
        self.call_with_keys(method, params, &keys).await
    }

    /// Issue a request with one signature per given key, computed over
    /// the canonical request payload. An empty list means an unsigned
    /// request.
    pub async fn call_with_keys(
        &self,
        method: &str,
        params: Value,
        keys: &[KeyRef],
    ) -> crate::Result<Value> {
        let id = self.inner.correlator.allocate_id();
        let mut envelope = RequestEnvelope::new(id, method, params, create_timestamp());
        let payload = envelope.signing_payload()?;
        for key in keys {
            envelope
                .signatures
                .push(self.inner.signer.sign_payload(&payload, key)?);
        }
        self.send_and_wait(envelope).await
    }

    /// Issue a request carrying already-computed signatures. Used by the
    /// authentication handshake, whose challenge signatures do not cover
    /// the request tuple.
    pub(crate) async fn request_with_signatures(
        &self,
        method: &str,
        params: Value,
        signatures: Vec<String>,
    ) -> crate::Result<Value> {
        let id = self.inner.correlator.allocate_id();
        let mut envelope = RequestEnvelope::new(id, method, params, create_timestamp());
        envelope.signatures = signatures;
        self.send_and_wait(envelope).await
    }

    async fn send_and_wait(&self, envelope: RequestEnvelope) -> crate::Result<Value> {
        let raw = envelope.serialize()?;
        let receiver = self.inner.correlator.register(envelope.id).await;
        if let Err(err) = self.inner.transport.send(raw).await {
            self.inner.correlator.remove(envelope.id).await;
            return Err(err);
        }
        self.inner
            .correlator
            .wait(envelope.id, &envelope.method, receiver)
            .await
    }

    pub fn subscribe_balance_updates(&self) -> broadcast::Receiver<Value> {
        self.inner.hub.subscribe_balance_updates()
    }

    pub fn subscribe_channel_updates(&self) -> broadcast::Receiver<Value> {
        self.inner.hub.subscribe_channel_updates()
    }

    pub fn subscribe_transfers(&self) -> broadcast::Receiver<Value> {
        self.inner.hub.subscribe_transfers()
    }

    pub fn subscribe_session_updates(&self) -> broadcast::Receiver<Value> {
        self.inner.hub.subscribe_session_updates()
    }
}

/// Consume transport events for the lifetime of the client: correlate
/// first, dispatch the rest, and tear pending state down on close.
async fn run_event_loop(
    inner: Arc<ClientInner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(transport_event) = events.recv().await {
        match transport_event {
            TransportEvent::Message(raw) => handle_inbound(&inner, &raw).await,
            TransportEvent::Error(message) => {
                event!(Level::ERROR, "transport error: {}", message);
            }
            TransportEvent::Closed => {
                inner.correlator.reject_all().await;
                inner.session.write().await.reset();
            }
        }
    }
}

async fn handle_inbound(inner: &ClientInner, raw: &str) {
    let envelope = match ResponseEnvelope::deserialize(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            // uncorrelatable, so it cannot fail any specific caller
            event!(Level::WARN, "dropping malformed message: {}", err);
            return;
        }
    };
    if !inner.correlator.settle(&envelope).await {
        inner.hub.dispatch(&envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::KeypairSigner;
    use crate::test_utilities::mocks::{MockNode, MockReply};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn test_client(url: &str) -> Client {
        let mut config = ClientConfig::new(url);
        config.request_timeout_ms = 2_000;
        config.connect_timeout_ms = 2_000;
        Client::new(config, Arc::new(KeypairSigner::generate()))
    }

    #[tokio::test]
    async fn ping_resolves_with_pong() {
        let node = MockNode::start(Arc::new(|request: &RequestEnvelope| {
            MockReply::respond(request.id, &request.method, json!("pong"))
        }))
        .await;

        let client = test_client(&node.url());
        client.connect().await.unwrap();
        assert_eq!(client.call("ping", json!({})).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn error_responses_reject_with_the_embedded_message() {
        let node = MockNode::start(Arc::new(|request: &RequestEnvelope| {
            MockReply::respond(request.id, "error", json!({"error": "bad params"}))
        }))
        .await;

        let client = test_client(&node.url());
        match client.call("transfer", json!({})).await {
            Err(Error::Rpc(message)) => assert_eq!(message, "bad params"),
            other => panic!("expected rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrent_calls_pair_with_their_own_responses() {
        // the node sits on the first three requests, then answers them in
        // shuffled order, each with its own method echoed back
        use rand::seq::SliceRandom;
        let stash: Arc<StdMutex<Vec<RequestEnvelope>>> = Arc::new(StdMutex::new(vec![]));
        let node = MockNode::start(Arc::new(move |request: &RequestEnvelope| {
            let mut stash = stash.lock().unwrap();
            stash.push(request.clone());
            if stash.len() < 3 {
                return MockReply::Ignore;
            }
            let mut replies: Vec<ResponseEnvelope> = stash
                .iter()
                .map(|held| {
                    ResponseEnvelope::new(held.id, &held.method, json!(held.method.clone()), 0)
                })
                .collect();
            replies.shuffle(&mut rand::thread_rng());
            MockReply::Respond(replies)
        }))
        .await;

        let client = test_client(&node.url());
        client.connect().await.unwrap();

        let (first, second, third) = tokio::join!(
            client.call("first", json!({})),
            client.call("second", json!({})),
            client.call("third", json!({})),
        );
        assert_eq!(first.unwrap(), json!("first"));
        assert_eq!(second.unwrap(), json!("second"));
        assert_eq!(third.unwrap(), json!("third"));
    }

    #[tokio::test]
    async fn close_rejects_every_pending_request() {
        let node = MockNode::start(Arc::new(|request: &RequestEnvelope| {
            match request.method.as_str() {
                "bye" => MockReply::Close,
                _ => MockReply::Ignore,
            }
        }))
        .await;

        let client = test_client(&node.url());
        client.connect().await.unwrap();

        let hung: Vec<_> = (0..3)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.call("hang", json!({})).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // the node closes the connection on this one
        let bye = client.call("bye", json!({})).await;
        assert!(matches!(bye, Err(Error::ConnectionClosed)));

        for handle in hung {
            match handle.await.unwrap() {
                Err(Error::ConnectionClosed) => {}
                other => panic!("expected connection closed, got {:?}", other),
            }
        }
        assert!(!client.is_authenticated().await);
        assert_eq!(client.inner.correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn notifications_reach_their_subscribers() {
        let node = MockNode::start(Arc::new(|request: &RequestEnvelope| {
            MockReply::Respond(vec![
                ResponseEnvelope::new(request.id, &request.method, json!("ok"), 0),
                ResponseEnvelope::new(0, "bu", json!({"asset": "usd", "amount": "7"}), 0),
                ResponseEnvelope::new(0, "zz", json!("ignored"), 0),
            ])
        }))
        .await;

        let client = test_client(&node.url());
        client.connect().await.unwrap();
        let mut balance_updates = client.subscribe_balance_updates();

        client.call("subscribe", json!({})).await.unwrap();
        let update = tokio::time::timeout(Duration::from_secs(2), balance_updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update, json!({"asset": "usd", "amount": "7"}));
    }

    #[tokio::test]
    async fn malformed_inbound_messages_are_dropped() {
        let node = MockNode::start(Arc::new(|request: &RequestEnvelope| {
            if request.method == "first" {
                MockReply::RawText(String::from("not an envelope"))
            } else {
                MockReply::respond(request.id, &request.method, json!("ok"))
            }
        }))
        .await;

        // the garbage reply leaves the first call pending until timeout;
        // the connection and later calls are unaffected
        let mut config = ClientConfig::new(node.url());
        config.request_timeout_ms = 200;
        let client = Client::new(config, Arc::new(KeypairSigner::generate()));
        client.connect().await.unwrap();
        assert!(matches!(
            client.call("first", json!({})).await,
            Err(Error::RpcTimeout(_))
        ));
        assert_eq!(client.call("second", json!({})).await.unwrap(), json!("ok"));
    }

    #[tokio::test]
    async fn from_config_uses_the_configured_secret() {
        let mut config = ClientConfig::new("ws://localhost:0/ws");
        config.secret_hex = Some(String::from(
            "da79fe6d86347e8f8dc71eb3dbab9ba5623eaaed6c5dd0bb257c0d631faaff16",
        ));
        let client = Client::from_config(config).unwrap();
        assert_eq!(
            client.inner.signer.address(),
            "e1hpHsuiRPbzXdCf7smXvAFCnqpvZXcjtxZLMxcATat1"
        );

        let mut config = ClientConfig::new("ws://localhost:0/ws");
        config.secret_hex = Some(String::from("not hex"));
        assert!(Client::from_config(config).is_err());
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let node = MockNode::start(Arc::new(|request: &RequestEnvelope| {
            MockReply::respond(request.id, &request.method, json!("pong"))
        }))
        .await;

        let client = test_client(&node.url());
        client.connect().await.unwrap();
        client.connect().await.unwrap();
        client.call("ping", json!({})).await.unwrap();
        assert_eq!(node.connection_count(), 1);
    }

    #[tokio::test]
    async fn connect_times_out_without_an_open_signal() {
        // a tcp listener that never completes the websocket handshake
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut config = ClientConfig::new(format!("ws://{}", addr));
        config.connect_timeout_ms = 100;
        let client = Client::new(config, Arc::new(KeypairSigner::generate()));
        assert!(matches!(
            client.connect().await,
            Err(Error::ConnectionTimeout)
        ));
    }

    #[tokio::test]
    async fn signed_calls_carry_one_signature_per_key() {
        let node = MockNode::start(Arc::new(|request: &RequestEnvelope| {
            MockReply::respond(request.id, &request.method, json!(request.signatures.len()))
        }))
        .await;

        let signer = Arc::new(KeypairSigner::generate());
        let session_key = signer.create_session_key().unwrap();
        let client = Client::new(ClientConfig::new(node.url()), signer);
        client.connect().await.unwrap();

        let unsigned = client.call_with_keys("ping", json!({}), &[]).await.unwrap();
        assert_eq!(unsigned, json!(0));

        let signed = client
            .call_with_keys(
                "transfer",
                json!({}),
                &[KeyRef::Identity, KeyRef::Session(session_key)],
            )
            .await
            .unwrap();
        assert_eq!(signed, json!(2));
    }
}
