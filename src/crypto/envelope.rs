//! # Encryption Envelope
//!
//! Self-describing encrypted payloads: ciphertext, the IV it was sealed
//! with and the cipher parameters, so the receiver decrypts without any
//! prior negotiation.
//!
//! ## Seal / Open
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  seal(plaintext, secret, params)                                       │
//! │  ────────────────────────────────                                       │
//! │   1. key = HKDF(secret, params)                                       │
//! │   2. iv  = OsRng bytes, length from engine.iv_len(params)             │
//! │   3. ct  = engine.encrypt(params, key, iv, plaintext)                 │
//! │   → EncryptedEnvelope { ciphertext: ct, iv, params }                  │
//! │                                                                         │
//! │  open(envelope, secret)                                                │
//! │  ──────────────────────                                                 │
//! │   1. reject empty ciphertext / iv, wrong iv length                    │
//! │   2. key = HKDF(secret, envelope.params)   ← embedded, never default  │
//! │   3. engine.decrypt(envelope.params, key, envelope.iv, ct)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Form
//!
//! ```json
//! {
//!   "encrypted": true,
//!   "content": "<base64 ciphertext>",
//!   "iv": "<base64 iv>",
//!   "encryptionParams": { "algorithm": "aes", "mode": "gcm", "padding": "none", "keySize": 256 },
//!   "senderUsername": "alice"
//! }
//! ```

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::cipher::{AeadEngine, CipherEngine, CipherParams};
use super::dh::SharedSecret;
use super::kdf::derive_envelope_key;
use crate::error::{Error, Result};

/// An encrypted payload with everything needed to open it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Ciphertext, including any authentication tag
    pub ciphertext: Vec<u8>,
    /// IV used for this envelope only
    pub iv: Vec<u8>,
    /// Parameters the envelope was sealed with
    pub params: CipherParams,
}

impl EncryptedEnvelope {
    /// Transport form, optionally naming the sender
    pub fn to_wire(&self, sender: Option<&str>) -> EnvelopeWire {
        EnvelopeWire {
            encrypted: true,
            content: Some(BASE64.encode(&self.ciphertext)),
            iv: Some(BASE64.encode(&self.iv)),
            encryption_params: Some(self.params),
            sender_username: sender.map(str::to_owned),
        }
    }

    /// Decode a transport envelope
    ///
    /// Missing, empty or undecodable fields are [`Error::MalformedEnvelope`].
    pub fn from_wire(wire: &EnvelopeWire) -> Result<Self> {
        let ciphertext = decode_field("content", wire.content.as_deref())?;
        let iv = decode_field("iv", wire.iv.as_deref())?;
        let params = wire
            .encryption_params
            .ok_or_else(|| Error::MalformedEnvelope("missing encryptionParams".into()))?;
        Ok(Self { ciphertext, iv, params })
    }
}

fn decode_field(name: &str, value: Option<&str>) -> Result<Vec<u8>> {
    let encoded = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MalformedEnvelope(format!("missing {}", name)))?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| Error::MalformedEnvelope(format!("{} is not base64: {}", name, e)))?;
    if bytes.is_empty() {
        return Err(Error::MalformedEnvelope(format!("empty {}", name)));
    }
    Ok(bytes)
}

/// Envelope as carried on the duplex channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeWire {
    /// Always `true`; distinguishes envelopes from typed messages
    pub encrypted: bool,
    /// Base64 ciphertext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Base64 IV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    /// Cipher parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_params: Option<CipherParams>,
    /// Sender identity
    #[serde(
        default,
        alias = "senderusername",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_username: Option<String>,
}

// ============================================================================
// ENVELOPE CIPHER
// ============================================================================

/// Seals and opens envelopes through a [`CipherEngine`]
#[derive(Clone)]
pub struct EnvelopeCipher {
    engine: Arc<dyn CipherEngine>,
}

impl Default for EnvelopeCipher {
    fn default() -> Self {
        Self::new(Arc::new(AeadEngine::new()))
    }
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCipher").finish_non_exhaustive()
    }
}

impl EnvelopeCipher {
    /// Use a specific engine
    pub fn new(engine: Arc<dyn CipherEngine>) -> Self {
        Self { engine }
    }

    /// The engine in use
    pub fn engine(&self) -> &dyn CipherEngine {
        self.engine.as_ref()
    }

    /// Encrypt `plaintext` under a fresh random IV
    ///
    /// ## Errors
    ///
    /// - `KeyUnavailable` when `secret` is `None`
    /// - `CipherEngineError` when the engine rejects the parameters or fails
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        secret: Option<&SharedSecret>,
        params: &CipherParams,
    ) -> Result<EncryptedEnvelope> {
        let secret = secret.ok_or_else(|| Error::KeyUnavailable("conversation".into()))?;

        let iv_len = self.engine.iv_len(params).map_err(as_engine_error)?;
        let mut iv = vec![0u8; iv_len];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let key = derive_envelope_key(secret, params).map_err(as_engine_error)?;
        let ciphertext = self.engine.encrypt(params, &key, &iv, plaintext)?;

        Ok(EncryptedEnvelope {
            ciphertext,
            iv,
            params: *params,
        })
    }

    /// Decrypt with the IV and parameters embedded in `envelope`
    ///
    /// ## Errors
    ///
    /// - `KeyUnavailable` when `secret` is `None`
    /// - `MalformedEnvelope` for empty ciphertext or an IV of the wrong length
    /// - `CipherEngineError` for tag mismatches and unsupported parameters
    pub fn decrypt(
        &self,
        envelope: &EncryptedEnvelope,
        secret: Option<&SharedSecret>,
    ) -> Result<Vec<u8>> {
        let secret = secret.ok_or_else(|| Error::KeyUnavailable("conversation".into()))?;

        if envelope.ciphertext.is_empty() {
            return Err(Error::MalformedEnvelope("missing ciphertext".into()));
        }
        if envelope.iv.is_empty() {
            return Err(Error::MalformedEnvelope("missing iv".into()));
        }

        let iv_len = self.engine.iv_len(&envelope.params).map_err(as_engine_error)?;
        if envelope.iv.len() != iv_len {
            return Err(Error::MalformedEnvelope(format!(
                "iv is {} bytes, {} requires {}",
                envelope.iv.len(),
                envelope.params,
                iv_len
            )));
        }

        let key = derive_envelope_key(secret, &envelope.params).map_err(as_engine_error)?;
        self.engine
            .decrypt(&envelope.params, &key, &envelope.iv, &envelope.ciphertext)
    }
}

fn as_engine_error(err: Error) -> Error {
    match err {
        Error::UnsupportedCipher(msg) => Error::CipherEngineError(format!("unsupported: {}", msg)),
        other => other,
    }
}

// ============================================================================
// TESTS
// ============================================================================
