//! # Key Exchange Coordinator
//!
//! Drives the handshake with each peer to a shared secret.
//!
//! ## State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         try_establish(peer)                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  cached Completed session? ──yes──► return cached secret (no-op)       │
//! │          │ no                                                           │
//! │  stored secret for pair?   ──yes──► restore session, return it         │
//! │          │ no                                                           │
//! │          ▼                                                              │
//! │  query_status(peer)                                                    │
//! │     │                                                                   │
//! │     ├── NotStarted ──► key pair (persisted) → initiate → POLL          │
//! │     │     └── initiate rejected, peer initiated meanwhile ─► respond   │
//! │     │                                                                   │
//! │     ├── Initiated                                                      │
//! │     │     ├── initiator value is ours ─────────────────────► POLL      │
//! │     │     └── otherwise (responder) ──► key pair → complete            │
//! │     │                                   → derive from initiator value  │
//! │     │                                                                   │
//! │     └── Completed ──► derive from the other party's value              │
//! │                                                                         │
//! │  POLL: up to max_attempts × { sleep(poll_interval); query_status }     │
//! │        Completed → derive from responder value                         │
//! │        budget exhausted → HandshakeTimeout                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Degradation
//!
//! [`KeyExchangeCoordinator::establish`] never fails: errors are logged and
//! reported as [`HandshakeOutcome::Degraded`] so a conversation can still
//! open. No substitute secret is ever generated.
//!
//! ## Concurrency
//!
//! Sessions live behind a mutex that is never held across an await, so
//! handshakes with different peers interleave freely on one event loop.

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigUint;
use parking_lot::Mutex;

use super::service::{HandshakeState, KeyExchangeService, RemoteStatus};
use super::session::HandshakeSession;
use crate::config::HandshakeConfig;
use crate::crypto::{DomainParams, KeyPair, SharedSecret};
use crate::error::{Error, Result};
use crate::storage::{pair_key, SecretStore};

/// Result of [`KeyExchangeCoordinator::establish`]
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// A shared secret is available
    Established(SharedSecret),
    /// The handshake did not finish; the conversation continues without a key
    Degraded {
        /// Why the handshake stopped
        reason: Error,
    },
}

impl HandshakeOutcome {
    /// The secret, if established
    pub fn secret(&self) -> Option<&SharedSecret> {
        match self {
            HandshakeOutcome::Established(secret) => Some(secret),
            HandshakeOutcome::Degraded { .. } => None,
        }
    }

    /// Whether the handshake degraded
    pub fn is_degraded(&self) -> bool {
        matches!(self, HandshakeOutcome::Degraded { .. })
    }
}

/// Establishes and caches shared secrets per peer
pub struct KeyExchangeCoordinator {
    local: String,
    params: DomainParams,
    service: Arc<dyn KeyExchangeService>,
    store: SecretStore,
    config: HandshakeConfig,
    sessions: Mutex<HashMap<String, HandshakeSession>>,
}

impl KeyExchangeCoordinator {
    /// Create a coordinator for `local` using the standard domain parameters
    pub fn new(
        local: impl Into<String>,
        service: Arc<dyn KeyExchangeService>,
        store: SecretStore,
        config: HandshakeConfig,
    ) -> Self {
        Self::with_params(local, DomainParams::standard(), service, store, config)
    }

    /// Create a coordinator with custom domain parameters
    pub fn with_params(
        local: impl Into<String>,
        params: DomainParams,
        service: Arc<dyn KeyExchangeService>,
        store: SecretStore,
        config: HandshakeConfig,
    ) -> Self {
        Self {
            local: local.into(),
            params,
            service,
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Local identity
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Domain parameters in use
    pub fn params(&self) -> &DomainParams {
        &self.params
    }

    /// Handshake state with `peer` as known locally
    pub fn state(&self, peer: &str) -> HandshakeState {
        self.sessions
            .lock()
            .get(peer)
            .map(HandshakeSession::state)
            .unwrap_or(HandshakeState::NotStarted)
    }

    /// The established secret with `peer`, without contacting the service
    pub fn secret_for(&self, peer: &str) -> Result<Option<SharedSecret>> {
        if let Some(secret) = self.cached_secret(peer) {
            return Ok(Some(secret));
        }
        self.store.shared_secret(&self.pair(peer))
    }

    /// Establish a secret, degrading instead of failing
    pub async fn establish(&self, peer: &str) -> HandshakeOutcome {
        match self.try_establish(peer).await {
            Ok(secret) => HandshakeOutcome::Established(secret),
            Err(reason) => {
                tracing::warn!(
                    peer = %peer,
                    code = reason.code(),
                    error = %reason,
                    "Key exchange degraded; conversation opens without a shared secret"
                );
                HandshakeOutcome::Degraded { reason }
            }
        }
    }

    /// Establish a secret with `peer`
    ///
    /// Re-entering for a completed session returns the cached secret.
    pub async fn try_establish(&self, peer: &str) -> Result<SharedSecret> {
        if peer == self.local {
            return Err(Error::KeyExchangeFailed("cannot exchange keys with self".into()));
        }

        if let Some(secret) = self.cached_secret(peer) {
            tracing::debug!(peer = %peer, "Handshake already completed");
            return Ok(secret);
        }

        let pair = self.pair(peer);
        if let Some(secret) = self.store.shared_secret(&pair)? {
            tracing::debug!(peer = %peer, "Restored shared secret from store");
            self.sessions
                .lock()
                .insert(peer.to_string(), HandshakeSession::restored(peer, secret.clone()));
            return Ok(secret);
        }

        let status = self.query(peer).await?;
        let stored_pair = self.store.key_pair(&pair, &self.params)?;

        match status.state {
            HandshakeState::NotStarted => self.initiate(peer, stored_pair).await,
            HandshakeState::Initiated => {
                let ours = stored_pair
                    .as_ref()
                    .map(|kp| Some(kp.public()) == status.initiator_public.as_ref())
                    .unwrap_or(false);

                match stored_pair {
                    Some(key_pair) if ours => {
                        tracing::debug!(peer = %peer, "Resuming our pending handshake");
                        self.remember(peer, key_pair, HandshakeState::Initiated);
                        self.poll(peer).await
                    }
                    _ => self.respond(peer, &status).await,
                }
            }
            HandshakeState::Completed => {
                let key_pair = stored_pair.ok_or_else(|| {
                    Error::KeyExchangeFailed(format!(
                        "handshake with {} completed remotely but no local exponent is stored",
                        peer
                    ))
                })?;
                let peer_public = Self::other_public(&key_pair, &status)?;
                self.remember(peer, key_pair, HandshakeState::Initiated);
                self.finish(peer, peer_public)
            }
        }
    }

    /// Tear down the session with `peer` and erase its stored material
    pub fn forget(&self, peer: &str) -> Result<()> {
        self.sessions.lock().remove(peer);
        self.store.forget(&self.pair(peer))?;
        tracing::info!(peer = %peer, "Handshake state erased");
        Ok(())
    }

    // ========================================================================
    // PATHS
    // ========================================================================

    async fn initiate(&self, peer: &str, stored: Option<KeyPair>) -> Result<SharedSecret> {
        let key_pair = match stored {
            Some(kp) => kp,
            None => {
                let kp = KeyPair::generate(&self.params)?;
                self.store.put_key_pair(&self.pair(peer), &kp)?;
                kp
            }
        };

        let accepted = self
            .service
            .initiate(peer, self.params.generator(), self.params.prime(), key_pair.public())
            .await?;
        if !accepted {
            // The peer may have initiated between our status query and now
            let status = self.query(peer).await?;
            let theirs = status.state == HandshakeState::Initiated
                && status.initiator_public.is_some()
                && status.initiator_public.as_ref() != Some(key_pair.public());
            if theirs {
                tracing::debug!(peer = %peer, "Peer initiated concurrently; responding");
                return self.respond(peer, &status).await;
            }
            return Err(Error::RemoteServiceError(format!(
                "initiate with {} was not accepted",
                peer
            )));
        }

        tracing::info!(peer = %peer, "Handshake initiated");
        self.remember(peer, key_pair, HandshakeState::Initiated);
        self.poll(peer).await
    }

    async fn respond(&self, peer: &str, status: &RemoteStatus) -> Result<SharedSecret> {
        let initiator_public = status.initiator_public.clone().ok_or_else(|| {
            Error::KeyExchangeFailed(format!("{} initiated without a public value", peer))
        })?;
        self.params.check_public(&initiator_public)?;

        let key_pair = KeyPair::generate(&self.params)?;
        self.store.put_key_pair(&self.pair(peer), &key_pair)?;

        let accepted = self.service.complete(peer, key_pair.public()).await?;
        if !accepted {
            return Err(Error::RemoteServiceError(format!(
                "complete with {} was not accepted",
                peer
            )));
        }

        tracing::debug!(peer = %peer, "Responded to handshake");
        self.remember(peer, key_pair, HandshakeState::Initiated);
        self.finish(peer, initiator_public)
    }

    async fn poll(&self, peer: &str) -> Result<SharedSecret> {
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.poll_interval()).await;

            let status = self.query(peer).await?;
            tracing::debug!(
                peer = %peer,
                attempt,
                max_attempts = attempts,
                state = ?status.state,
                "Polled handshake status"
            );

            if status.state == HandshakeState::Completed {
                let responder_public = status.responder_public.ok_or_else(|| {
                    Error::KeyExchangeFailed(format!("{} completed without a public value", peer))
                })?;
                return self.finish(peer, responder_public);
            }
        }

        Err(Error::HandshakeTimeout {
            peer: peer.to_string(),
            attempts,
        })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    async fn query(&self, peer: &str) -> Result<RemoteStatus> {
        let status = self.service.query_status(peer).await?;
        if let Some(remote) = &status.params {
            if remote != &self.params {
                return Err(Error::KeyExchangeFailed(format!(
                    "{} uses different domain parameters",
                    peer
                )));
            }
        }
        Ok(status)
    }

    fn other_public(key_pair: &KeyPair, status: &RemoteStatus) -> Result<BigUint> {
        let ours = Some(key_pair.public());
        let other = if status.initiator_public.as_ref() == ours {
            status.responder_public.clone()
        } else if status.responder_public.as_ref() == ours {
            status.initiator_public.clone()
        } else {
            None
        };
        other.ok_or_else(|| {
            Error::KeyExchangeFailed("completed handshake does not include our public value".into())
        })
    }

    fn finish(&self, peer: &str, peer_public: BigUint) -> Result<SharedSecret> {
        let secret = {
            let mut sessions = self.sessions.lock();
            let session = sessions.get_mut(peer).ok_or_else(|| {
                Error::Internal(format!("no handshake session for {}", peer))
            })?;
            session.complete(&self.params, peer_public)?.clone()
        };

        self.store.put_shared_secret(&self.pair(peer), &secret)?;
        tracing::info!(peer = %peer, "Handshake completed");
        Ok(secret)
    }

    fn remember(&self, peer: &str, key_pair: KeyPair, state: HandshakeState) {
        let mut session = HandshakeSession::new(peer, key_pair);
        if state >= HandshakeState::Initiated {
            session.mark_initiated();
        }
        self.sessions.lock().insert(peer.to_string(), session);
    }

    fn cached_secret(&self, peer: &str) -> Option<SharedSecret> {
        self.sessions
            .lock()
            .get(peer)
            .and_then(HandshakeSession::shared_secret)
            .cloned()
    }

    fn pair(&self, peer: &str) -> String {
        pair_key(&self.local, peer)
    }
}

impl std::fmt::Debug for KeyExchangeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchangeCoordinator")
            .field("local", &self.local)
            .field("sessions", &self.sessions.lock().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
