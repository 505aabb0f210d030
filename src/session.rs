//! # Secure Session
//!
//! One client's view of its conversations: the key exchange, the
//! encryption envelope and chunked transfers wired to a single duplex
//! channel.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SECURE SESSION FLOW                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  open_conversation(peer)                                               │
//! │     └─► coordinator.establish ─┬─ Established ─► encrypted chat         │
//! │                                └─ Degraded ────► no key; sends fail     │
//! │                                                  unless plaintext       │
//! │                                                  fallback is enabled    │
//! │                                                                         │
//! │  send_text(peer, text)                                                 │
//! │     └─► envelope.encrypt(params of the conversation) ─► channel        │
//! │                                                                         │
//! │  handle_inbound(frame)                                                 │
//! │     ├─► envelope      ─► decrypt ─► Message / Undecryptable            │
//! │     ├─► text          ─► Message (unencrypted)                         │
//! │     ├─► file_info     ─► download job registered                       │
//! │     ├─► file_chunk    ─► TransferProgress / TransferComplete           │
//! │     └─► *_error       ─► TransferFailed                                │
//! │                                                                         │
//! │  delete_conversation(peer)                                             │
//! │     └─► handshake session, secret and exponent erased                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A frame that cannot be decrypted or decoded becomes an event, never an
//! error: one bad message does not tear down the session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::crypto::{CipherParams, EncryptedEnvelope, EnvelopeCipher, EnvelopeWire, SharedSecret};
use crate::error::{Error, Result};
use crate::exchange::{HandshakeOutcome, KeyExchangeCoordinator, KeyExchangeService};
use crate::storage::{pair_key, SecretStore};
use crate::transfer::{
    ChunkOutcome, OutgoingFile, TransferDirection, TransferManager, TransferMeta, TransferProgress,
};
use crate::transport::messages::{DownloadRequest, FileInfo, TextMessage};
use crate::transport::{DuplexChannel, InboundMessage, WireMessage};

/// A conversation opened by this session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Pair key shared by both participants
    pub id: String,
    /// The other participant
    pub peer: String,
    /// Cipher negotiated when the conversation was opened
    pub params: CipherParams,
    /// Whether the handshake degraded
    pub degraded: bool,
    /// When the conversation was opened
    pub created_at: i64,
}

/// What an inbound frame meant
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Chat text
    Message {
        /// Sender, when the frame names one
        from: Option<String>,
        /// Message body
        text: String,
        /// Whether it arrived in an envelope
        encrypted: bool,
    },
    /// An envelope that could not be opened
    Undecryptable {
        /// Sender, when the frame names one
        from: Option<String>,
        /// Why decryption failed
        reason: String,
    },
    /// A peer announced an upload to us
    TransferStarted {
        /// Transfer id
        transfer_id: String,
        /// Announced metadata
        meta: TransferMeta,
    },
    /// Download metadata; the job is now registered
    FileInfo(FileInfo),
    /// A chunk was stored or dropped
    TransferProgress {
        /// Transfer id
        transfer_id: String,
        /// Current counters
        progress: TransferProgress,
    },
    /// A transfer met the acceptance threshold
    TransferComplete {
        /// Transfer id
        transfer_id: String,
        /// Announced metadata
        meta: Option<TransferMeta>,
        /// Reassembled bytes
        data: Vec<u8>,
        /// Counters at completion
        progress: TransferProgress,
    },
    /// The channel reported a transfer failure
    TransferFailed {
        /// Jobs that were failed
        transfer_ids: Vec<String>,
        /// Server message
        error: String,
    },
    /// The server stored one of our uploads
    UploadAcknowledged {
        /// Our upload id
        upload_id: String,
        /// Server-assigned file id
        file_id: String,
        /// File name
        file_name: String,
    },
    /// Nothing to do
    Ignored {
        /// Why
        reason: String,
    },
}

/// Secure chat session for one local user
pub struct SecureSession {
    config: CoreConfig,
    coordinator: KeyExchangeCoordinator,
    envelopes: EnvelopeCipher,
    transfers: TransferManager,
    channel: Arc<dyn DuplexChannel>,
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl SecureSession {
    /// Create a session with the standard domain parameters and built-in engine
    pub fn new(
        local: impl Into<String>,
        config: CoreConfig,
        service: Arc<dyn KeyExchangeService>,
        store: SecretStore,
        channel: Arc<dyn DuplexChannel>,
    ) -> Result<Self> {
        let coordinator =
            KeyExchangeCoordinator::new(local, service, store, config.handshake.clone());
        Self::with_components(config, coordinator, EnvelopeCipher::default(), channel)
    }

    /// Create a session from prebuilt parts
    ///
    /// Fails with `InvalidConfig` when the configuration is invalid or the
    /// engine cannot serve the configured cipher.
    pub fn with_components(
        config: CoreConfig,
        coordinator: KeyExchangeCoordinator,
        envelopes: EnvelopeCipher,
        channel: Arc<dyn DuplexChannel>,
    ) -> Result<Self> {
        config.validate()?;
        if !envelopes.engine().supports(&config.cipher) {
            return Err(Error::InvalidConfig(format!(
                "cipher engine cannot serve {}",
                config.cipher
            )));
        }

        Ok(Self {
            transfers: TransferManager::new(config.transfer.clone()),
            config,
            coordinator,
            envelopes,
            channel,
            conversations: RwLock::new(HashMap::new()),
        })
    }

    /// Local identity
    pub fn local(&self) -> &str {
        self.coordinator.local()
    }

    /// Active configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The key exchange coordinator
    pub fn coordinator(&self) -> &KeyExchangeCoordinator {
        &self.coordinator
    }

    /// The transfer manager
    pub fn transfers(&self) -> &TransferManager {
        &self.transfers
    }

    // ========================================================================
    // CONVERSATIONS
    // ========================================================================

    /// Open (or re-open) a conversation, running the key exchange
    ///
    /// Never fails: a handshake that does not finish leaves the
    /// conversation open but degraded.
    pub async fn open_conversation(&self, peer: &str) -> HandshakeOutcome {
        let outcome = self.coordinator.establish(peer).await;
        let degraded = outcome.is_degraded();

        let mut conversations = self.conversations.write();
        let conversation = conversations
            .entry(peer.to_string())
            .or_insert_with(|| Conversation {
                id: pair_key(self.local(), peer),
                peer: peer.to_string(),
                params: self.config.cipher,
                degraded,
                created_at: crate::time::now_timestamp_millis(),
            });
        conversation.degraded = degraded;

        tracing::info!(peer = %peer, degraded, cipher = %conversation.params, "Conversation opened");
        outcome
    }

    /// A conversation opened by this session
    pub fn conversation(&self, peer: &str) -> Option<Conversation> {
        self.conversations.read().get(peer).cloned()
    }

    /// Delete a conversation and erase its key material
    pub fn delete_conversation(&self, peer: &str) -> Result<()> {
        self.conversations.write().remove(peer);
        self.coordinator.forget(peer)
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Send chat text to `peer`
    ///
    /// Encrypted whenever a secret exists. Without one this fails with
    /// `KeyUnavailable`, unless plaintext fallback is enabled and the
    /// conversation's handshake degraded.
    pub async fn send_text(&self, peer: &str, text: &str) -> Result<()> {
        match self.coordinator.secret_for(peer)? {
            Some(secret) => {
                let params = self.params_for(peer);
                let envelope = self.envelopes.encrypt(text.as_bytes(), Some(&secret), &params)?;
                self.channel
                    .send_envelope(&envelope.to_wire(Some(self.local())))
                    .await?;
                tracing::debug!(peer = %peer, "Encrypted message sent");
                Ok(())
            }
            None if self.plaintext_allowed(peer) => {
                tracing::warn!(peer = %peer, "Sending without encryption; handshake degraded");
                self.channel
                    .send_message(&WireMessage::Text(TextMessage {
                        content: text.to_string(),
                        sender_username: Some(self.local().to_string()),
                    }))
                    .await
            }
            None => Err(Error::KeyUnavailable(peer.to_string())),
        }
    }

    /// Interpret one inbound frame
    ///
    /// Only storage failures are returned as errors.
    pub async fn handle_inbound(&self, frame: &str) -> Result<SessionEvent> {
        let inbound = match InboundMessage::decode(frame) {
            Ok(inbound) => inbound,
            Err(Error::MalformedEnvelope(reason)) => {
                tracing::warn!(error = %reason, "Malformed envelope");
                return Ok(SessionEvent::Undecryptable { from: None, reason });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unrecognised frame");
                return Ok(SessionEvent::Ignored {
                    reason: e.to_string(),
                });
            }
        };

        match inbound {
            InboundMessage::Envelope(wire) => self.open_envelope(&wire),
            InboundMessage::Message(message) => Ok(self.dispatch(message)),
        }
    }

    fn open_envelope(&self, wire: &EnvelopeWire) -> Result<SessionEvent> {
        let from = wire.sender_username.clone();
        let Some(sender) = from.as_deref() else {
            return Ok(SessionEvent::Undecryptable {
                from,
                reason: "envelope does not name its sender".into(),
            });
        };

        let secret = self.coordinator.secret_for(sender)?;
        match self.decrypt_text(wire, secret.as_ref(), sender) {
            Ok(text) => Ok(SessionEvent::Message {
                from,
                text,
                encrypted: true,
            }),
            Err(e) => {
                tracing::warn!(peer = %sender, code = e.code(), error = %e, "Undecryptable message");
                Ok(SessionEvent::Undecryptable {
                    from,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn decrypt_text(
        &self,
        wire: &EnvelopeWire,
        secret: Option<&SharedSecret>,
        sender: &str,
    ) -> Result<String> {
        let secret = secret.ok_or_else(|| Error::KeyUnavailable(sender.to_string()))?;
        let envelope = EncryptedEnvelope::from_wire(wire)?;
        let plaintext = self.envelopes.decrypt(&envelope, Some(secret))?;
        String::from_utf8(plaintext)
            .map_err(|e| Error::MalformedEnvelope(format!("plaintext is not UTF-8: {}", e)))
    }

    fn dispatch(&self, message: WireMessage) -> SessionEvent {
        match message {
            WireMessage::Text(text) => SessionEvent::Message {
                from: text.sender_username,
                text: text.content,
                encrypted: false,
            },
            WireMessage::FileUploadInit(init) => match self.transfers.begin_incoming(&init) {
                Ok(()) => SessionEvent::TransferStarted {
                    transfer_id: init.upload_id,
                    meta: TransferMeta {
                        file_name: init.file_name,
                        mime_type: init.mime_type,
                        total_size: init.total_size,
                    },
                },
                Err(e) => ignored(e),
            },
            WireMessage::FileInfo(info) => match self.transfers.begin_download(&info) {
                Ok(()) => SessionEvent::FileInfo(info),
                Err(e) => ignored(e),
            },
            WireMessage::FileChunk(frame) => match self.transfers.receive_chunk(&frame) {
                Ok(ChunkOutcome::Completed {
                    transfer_id,
                    data,
                    progress,
                }) => SessionEvent::TransferComplete {
                    meta: self.transfers.meta(&transfer_id),
                    transfer_id,
                    data,
                    progress,
                },
                Ok(ChunkOutcome::Pending(progress)) => SessionEvent::TransferProgress {
                    transfer_id: frame.transfer_id().unwrap_or_default().to_string(),
                    progress,
                },
                Ok(ChunkOutcome::Dropped { .. }) => {
                    let transfer_id = frame.transfer_id().unwrap_or_default().to_string();
                    SessionEvent::TransferProgress {
                        progress: self.transfers.progress(&transfer_id).unwrap_or_default(),
                        transfer_id,
                    }
                }
                Ok(ChunkOutcome::Ignored) => SessionEvent::Ignored {
                    reason: format!("chunk {} not needed", frame.chunk_index),
                },
                Err(e) => ignored(e),
            },
            WireMessage::FileUploadComplete(done) => {
                if let Err(e) = self.transfers.acknowledge_upload(&done.upload_id) {
                    tracing::debug!(transfer_id = %done.upload_id, error = %e, "Acknowledgement for unknown upload");
                }
                SessionEvent::UploadAcknowledged {
                    upload_id: done.upload_id,
                    file_id: done.file_id,
                    file_name: done.file_name,
                }
            }
            WireMessage::FileUploadError(signal) => SessionEvent::TransferFailed {
                transfer_ids: self.transfers.fail_matching(&signal, TransferDirection::Upload),
                error: signal.error,
            },
            WireMessage::FileDownloadError(signal) => SessionEvent::TransferFailed {
                transfer_ids: self
                    .transfers
                    .fail_matching(&signal, TransferDirection::Download),
                error: signal.error,
            },
            WireMessage::FileDownloadRequest(request) => SessionEvent::Ignored {
                reason: format!("download request for {} is served by the server", request.file_id),
            },
        }
    }

    // ========================================================================
    // FILES
    // ========================================================================

    /// Upload a file as-is; returns the upload id
    pub async fn upload_file(
        &self,
        peer: &str,
        file_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        self.transfers
            .send_file(
                self.channel.as_ref(),
                OutgoingFile {
                    file_name: file_name.to_string(),
                    mime_type: mime_type.to_string(),
                    chat_username: peer.to_string(),
                    data,
                },
            )
            .await
    }

    /// Seal a file in an envelope and upload the serialized envelope
    ///
    /// Fails with `KeyUnavailable` when no secret exists for `peer`.
    pub async fn upload_encrypted_file(
        &self,
        peer: &str,
        file_name: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<String> {
        let secret = self
            .coordinator
            .secret_for(peer)?
            .ok_or_else(|| Error::KeyUnavailable(peer.to_string()))?;
        let params = self.params_for(peer);
        let envelope = self.envelopes.encrypt(data, Some(&secret), &params)?;
        let sealed = serde_json::to_vec(&envelope.to_wire(Some(self.local())))
            .map_err(|e| Error::SerializationError(e.to_string()))?;

        self.upload_file(peer, file_name, mime_type, sealed).await
    }

    /// Open a file received from `peer` through [`Self::upload_encrypted_file`]
    pub fn open_file(&self, peer: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        let wire: EnvelopeWire = serde_json::from_slice(sealed)
            .map_err(|e| Error::MalformedEnvelope(e.to_string()))?;
        let envelope = EncryptedEnvelope::from_wire(&wire)?;
        let secret = self
            .coordinator
            .secret_for(peer)?
            .ok_or_else(|| Error::KeyUnavailable(peer.to_string()))?;
        self.envelopes.decrypt(&envelope, Some(&secret))
    }

    /// Ask the server to stream a stored file
    ///
    /// The download job is registered when `file_info` arrives.
    pub async fn request_download(&self, file_id: &str) -> Result<()> {
        self.channel
            .send_message(&WireMessage::FileDownloadRequest(DownloadRequest {
                file_id: file_id.to_string(),
            }))
            .await
    }

    /// Stop handling a transfer locally
    pub fn cancel_transfer(&self, transfer_id: &str) -> bool {
        self.transfers.cancel(transfer_id)
    }

    /// Fail transfers that saw no activity within the idle timeout
    ///
    /// Meant to be called periodically by the host; returns a
    /// `TransferFailed` event when anything expired.
    pub fn expire_idle_transfers(&self) -> Option<SessionEvent> {
        let transfer_ids = self.transfers.sweep_idle();
        (!transfer_ids.is_empty()).then(|| SessionEvent::TransferFailed {
            transfer_ids,
            error: "transfer idle timeout".into(),
        })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn params_for(&self, peer: &str) -> CipherParams {
        self.conversations
            .read()
            .get(peer)
            .map(|c| c.params)
            .unwrap_or(self.config.cipher)
    }

    fn plaintext_allowed(&self, peer: &str) -> bool {
        self.config.allow_plaintext_fallback
            && self
                .conversations
                .read()
                .get(peer)
                .map(|c| c.degraded)
                .unwrap_or(false)
    }
}

fn ignored(err: Error) -> SessionEvent {
    tracing::debug!(code = err.code(), error = %err, "Frame ignored");
    SessionEvent::Ignored {
        reason: err.to_string(),
    }
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("local", &self.local())
            .field("conversations", &self.conversations.read().len())
            .field("transfers", &self.transfers)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
