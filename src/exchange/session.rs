//! Per-peer handshake state.

use num_bigint::BigUint;

use super::service::HandshakeState;
use crate::crypto::{DomainParams, KeyPair, SharedSecret};
use crate::error::{Error, Result};

/// Handshake with one peer
///
/// The shared secret is present exactly when the state is `Completed`;
/// only [`HandshakeSession::complete`] and [`HandshakeSession::restored`]
/// produce that state.
#[derive(Debug, Clone)]
pub struct HandshakeSession {
    peer: String,
    state: HandshakeState,
    key_pair: Option<KeyPair>,
    peer_public: Option<BigUint>,
    shared_secret: Option<SharedSecret>,
}

impl HandshakeSession {
    /// A fresh session holding the local key pair
    pub fn new(peer: impl Into<String>, key_pair: KeyPair) -> Self {
        Self {
            peer: peer.into(),
            state: HandshakeState::NotStarted,
            key_pair: Some(key_pair),
            peer_public: None,
            shared_secret: None,
        }
    }

    /// A completed session rebuilt from a stored secret
    pub fn restored(peer: impl Into<String>, secret: SharedSecret) -> Self {
        Self {
            peer: peer.into(),
            state: HandshakeState::Completed,
            key_pair: None,
            peer_public: None,
            shared_secret: Some(secret),
        }
    }

    /// Peer identity
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Local public value, if the key pair is still held
    pub fn local_public(&self) -> Option<&BigUint> {
        self.key_pair.as_ref().map(KeyPair::public)
    }

    /// Peer's public value, once known
    pub fn peer_public(&self) -> Option<&BigUint> {
        self.peer_public.as_ref()
    }

    /// The shared secret, present only when completed
    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        self.shared_secret.as_ref()
    }

    /// Whether the handshake finished
    pub fn is_completed(&self) -> bool {
        self.state == HandshakeState::Completed
    }

    /// Record that the initiator's value was published
    pub fn mark_initiated(&mut self) {
        if self.state < HandshakeState::Initiated {
            self.state = HandshakeState::Initiated;
        }
    }

    /// Derive the secret from the peer's public value and complete
    ///
    /// Completing an already-completed session returns the cached secret
    /// without deriving again.
    pub fn complete(&mut self, params: &DomainParams, peer_public: BigUint) -> Result<&SharedSecret> {
        if self.shared_secret.is_none() {
            let key_pair = self.key_pair.as_ref().ok_or_else(|| {
                Error::KeyExchangeFailed(format!("no local key pair for {}", self.peer))
            })?;
            let secret = key_pair.derive(params, &peer_public)?;
            self.peer_public = Some(peer_public);
            self.shared_secret = Some(secret);
            self.state = HandshakeState::Completed;
        }

        self.shared_secret
            .as_ref()
            .ok_or_else(|| Error::Internal("completed session lost its secret".into()))
    }
}
