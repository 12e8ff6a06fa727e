//! The authentication handshake.
//!
//! A node only accepts signed application calls on an authenticated
//! session, and the handshake "domain" a node expects its challenge
//! signatures bound to is not reliably knowable from configuration. The
//! handshake therefore probes: an ordered, de-duplicated list of candidate
//! domains, and per challenge two signing strategies in order, the
//! structured signature bound to the candidate domain and then the plain
//! long-term-key signature. "No challenge issued" and "signature rejected" are soft
//! failures to probe past; anything else surfaces immediately.
//!
//! Exhausting every candidate falls back to self-authentication: the
//! long-term address registered as its own session key, plain signer
//! only. Only when that too fails does `authenticate` raise
//! `AuthenticationFailed`.

use crate::error::Error;
use crate::networking::client::Client;
use crate::signer::{AuthIntent, KeyRef, SignError};
use crate::time::create_timestamp;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{event, Level};

/// Domains tried after the configured override and before the
/// application name itself.
pub const AUTH_DOMAIN_CANDIDATES: &[&str] = &["clearline", "clearline.network"];

const DEFAULT_SESSION_TTL_MS: u64 = 3_600_000;
const DEFAULT_SESSION_SCOPE: &str = "app.session";

/// Per-connection authentication state. Owned by the client, written
/// only by the handshake, reset on every close.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub authenticated: bool,
    /// Address of the ephemeral session key signing application calls.
    /// None on a self-authenticated session, which keeps signing with
    /// the long-term key.
    pub session_key: Option<String>,
    pub application: Option<String>,
}

impl Session {
    pub fn reset(&mut self) {
        *self = Session::default();
    }

    /// The key application calls are signed with, when authenticated.
    pub fn active_key(&self) -> Option<KeyRef> {
        if !self.authenticated {
            return None;
        }
        Some(match &self.session_key {
            Some(address) => KeyRef::Session(address.clone()),
            None => KeyRef::Identity,
        })
    }
}

/// Caller-supplied handshake parameters.
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Application name; also the last domain candidate.
    pub application: String,
    pub allowances: Vec<crate::signer::Allowance>,
    /// Session expiry, milliseconds since the unix epoch.
    pub expire: u64,
    pub scope: String,
}

impl AuthOptions {
    pub fn new(application: &str) -> AuthOptions {
        AuthOptions {
            application: String::from(application),
            allowances: vec![],
            expire: create_timestamp() + DEFAULT_SESSION_TTL_MS,
            scope: String::from(DEFAULT_SESSION_SCOPE),
        }
    }
}

/// Soft failures the handshake probes past: the tagged invalid class
/// from the signing capability, and remote rejections of a verify
/// attempt. Everything else is fatal.
fn is_soft_auth_error(err: &Error) -> bool {
    matches!(
        err,
        Error::Rpc(_)
            | Error::Signer(SignError::InvalidChallenge)
            | Error::Signer(SignError::InvalidSignature)
    )
}

impl Client {
    /// Establish an authenticated session. Idempotent: an already
    /// authenticated connection returns immediately with no traffic.
    pub async fn authenticate(&self, options: AuthOptions) -> crate::Result<()> {
        let _gate = self.inner.auth_gate.lock().await;
        if self.inner.session.read().await.authenticated {
            return Ok(());
        }

        // fresh ephemeral key, distinct from the long-term identity
        let session_key = self.inner.signer.create_session_key()?;
        let intent = AuthIntent {
            address: self.inner.signer.address(),
            session_key: session_key.clone(),
            application: options.application.clone(),
            allowances: options.allowances.clone(),
            expire: options.expire,
            scope: options.scope.clone(),
        };

        for domain in self.domain_candidates(&options) {
            let challenge = match self.request_challenge(&domain, &intent).await? {
                Some(challenge) => challenge,
                None => {
                    event!(Level::DEBUG, "domain {} issued no challenge", domain);
                    continue;
                }
            };
            if self.verify_challenge(&domain, &intent, &challenge).await? {
                let mut session = self.inner.session.write().await;
                session.authenticated = true;
                session.session_key = Some(session_key.clone());
                session.application = Some(options.application.clone());
                event!(
                    Level::INFO,
                    "authenticated against domain {} as {}",
                    domain,
                    intent.address
                );
                return Ok(());
            }
        }

        event!(
            Level::INFO,
            "all auth domains exhausted, attempting self-authentication"
        );
        self.self_authenticate(&options, &intent).await
    }

    /// The configured override first, then the fixed fallback sequence,
    /// then the application name; de-duplicated, order preserved.
    fn domain_candidates(&self, options: &AuthOptions) -> Vec<String> {
        let mut candidates: Vec<String> = vec![];
        if let Some(domain) = &self.inner.config.auth_domain {
            candidates.push(domain.clone());
        }
        candidates.extend(AUTH_DOMAIN_CANDIDATES.iter().map(|d| String::from(*d)));
        candidates.push(options.application.clone());

        let mut seen = HashSet::new();
        candidates.retain(|domain| seen.insert(domain.clone()));
        candidates
    }

    /// One unsigned auth request. A missing challenge field means the
    /// domain is non-responsive; a remote error is a business-rule
    /// rejection and fatal.
    async fn request_challenge(
        &self,
        domain: &str,
        intent: &AuthIntent,
    ) -> crate::Result<Option<String>> {
        let params = json!({
            "address": intent.address,
            "session_key": intent.session_key,
            "application": intent.application,
            "allowances": intent.allowances,
            "expire": intent.expire,
            "scope": intent.scope,
            "domain": domain,
        });
        let result = self
            .request_with_signatures("auth_request", params, vec![])
            .await?;
        Ok(result
            .get("challenge")
            .and_then(Value::as_str)
            .map(String::from))
    }

    /// Both signing strategies against one challenge: structured first,
    /// plain on the same domain if the structured attempt is rejected.
    async fn verify_challenge(
        &self,
        domain: &str,
        intent: &AuthIntent,
        challenge: &str,
    ) -> crate::Result<bool> {
        match self.verify_typed(domain, intent, challenge).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) if is_soft_auth_error(&err) => {}
            Err(err) => return Err(err),
        }
        event!(
            Level::DEBUG,
            "structured signature rejected for domain {}, falling back to plain signer",
            domain
        );
        match self.verify_plain(challenge).await {
            Ok(success) => Ok(success),
            Err(err) if is_soft_auth_error(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn verify_typed(
        &self,
        domain: &str,
        intent: &AuthIntent,
        challenge: &str,
    ) -> crate::Result<bool> {
        let signature = self
            .inner
            .signer
            .sign_typed_challenge(domain, intent, challenge)?;
        self.send_verify(challenge, signature).await
    }

    async fn verify_plain(&self, challenge: &str) -> crate::Result<bool> {
        let signature = self.inner.signer.sign_challenge(challenge)?;
        self.send_verify(challenge, signature).await
    }

    async fn send_verify(&self, challenge: &str, signature: String) -> crate::Result<bool> {
        let params = json!({ "challenge": challenge });
        let result = self
            .request_with_signatures("auth_verify", params, vec![signature])
            .await?;
        Ok(result
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Last resort: the long-term address registered as its own session
    /// key, plain signer only, no domain iteration. Success keeps
    /// signing application calls with the long-term key.
    async fn self_authenticate(
        &self,
        options: &AuthOptions,
        intent: &AuthIntent,
    ) -> crate::Result<()> {
        let self_intent = AuthIntent {
            session_key: intent.address.clone(),
            ..intent.clone()
        };
        let challenge = match self
            .request_challenge(&options.application, &self_intent)
            .await?
        {
            Some(challenge) => challenge,
            None => return Err(Error::AuthenticationFailed),
        };
        match self.verify_plain(&challenge).await {
            Ok(true) => {
                let mut session = self.inner.session.write().await;
                session.authenticated = true;
                session.session_key = None;
                session.application = Some(options.application.clone());
                event!(
                    Level::INFO,
                    "self-authenticated as {}",
                    self_intent.address
                );
                Ok(())
            }
            Ok(false) => Err(Error::AuthenticationFailed),
            Err(err) if is_soft_auth_error(&err) => Err(Error::AuthenticationFailed),
            Err(err) => Err(err),
        }
    }
}
