//! # Cipher Engine
//!
//! The symmetric primitive behind every envelope, seen through a narrow
//! contract: given algorithm, mode, padding, key and IV, produce ciphertext
//! or plaintext, or fail.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CIPHER ENGINE CONTRACT                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  CipherParams { algorithm, mode, padding, keySize }                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────┐    iv_len(params)  → bytes of fresh IV needed    │
//! │  │  CipherEngine    │    encrypt(params, key, iv, plaintext)           │
//! │  │  (trait object)  │    decrypt(params, key, iv, ciphertext)          │
//! │  └──────────────────┘                                                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  AeadEngine (built in)                                                 │
//! │    aes/gcm/none        128 or 256 bit keys, 96-bit IV                  │
//! │    chacha20/poly1305   256 bit key, 96-bit IV                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The parameter enums also name the block ciphers, modes and paddings
//! peers may advertise (`camellia`, `magenta`, `cbc`, `pkcs7`, ...) so that
//! such envelopes decode cleanly. An engine that cannot serve a parameter
//! set answers [`Error::UnsupportedCipher`].

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce as AesNonce,
};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};
use serde::{Deserialize, Serialize};

use super::kdf::CipherKey;
use crate::error::{Error, Result};

/// IV length for the built-in AEAD constructions (96 bits)
pub const AEAD_IV_SIZE: usize = 12;

/// Authentication tag appended by the AEAD constructions (128 bits)
pub const AEAD_TAG_SIZE: usize = 16;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Block or stream cipher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherAlgorithm {
    /// AES
    Aes,
    /// ChaCha20
    #[serde(rename = "chacha20")]
    ChaCha20,
    /// Camellia
    Camellia,
    /// MAGENTA
    Magenta,
}

impl CipherAlgorithm {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            CipherAlgorithm::Aes => "aes",
            CipherAlgorithm::ChaCha20 => "chacha20",
            CipherAlgorithm::Camellia => "camellia",
            CipherAlgorithm::Magenta => "magenta",
        }
    }
}

/// Mode of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherMode {
    /// Electronic codebook
    Ecb,
    /// Cipher block chaining
    Cbc,
    /// Propagating CBC
    Pcbc,
    /// Cipher feedback
    Cfb,
    /// Output feedback
    Ofb,
    /// Counter
    Ctr,
    /// Random delta
    #[serde(rename = "randomdelta")]
    RandomDelta,
    /// Galois/counter mode (AEAD)
    Gcm,
    /// Poly1305 authenticator (AEAD, with ChaCha20)
    Poly1305,
}

impl CipherMode {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            CipherMode::Ecb => "ecb",
            CipherMode::Cbc => "cbc",
            CipherMode::Pcbc => "pcbc",
            CipherMode::Cfb => "cfb",
            CipherMode::Ofb => "ofb",
            CipherMode::Ctr => "ctr",
            CipherMode::RandomDelta => "randomdelta",
            CipherMode::Gcm => "gcm",
            CipherMode::Poly1305 => "poly1305",
        }
    }
}

/// Block padding scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    /// No padding (stream and AEAD modes)
    None,
    /// PKCS#7
    Pkcs7,
    /// ISO 10126
    Iso10126,
    /// Zero bytes
    Zeros,
    /// ANSI X9.23
    #[serde(rename = "ansix923")]
    AnsiX923,
}

impl Padding {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Padding::None => "none",
            Padding::Pkcs7 => "pkcs7",
            Padding::Iso10126 => "iso10126",
            Padding::Zeros => "zeros",
            Padding::AnsiX923 => "ansix923",
        }
    }
}

fn default_key_size() -> u16 {
    256
}

/// Cipher parameters recorded in every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherParams {
    /// Cipher
    pub algorithm: CipherAlgorithm,
    /// Mode of operation
    pub mode: CipherMode,
    /// Padding scheme
    pub padding: Padding,
    /// Key size in bits
    #[serde(default = "default_key_size")]
    pub key_size: u16,
}

impl Default for CipherParams {
    fn default() -> Self {
        Self {
            algorithm: CipherAlgorithm::Aes,
            mode: CipherMode::Gcm,
            padding: Padding::None,
            key_size: default_key_size(),
        }
    }
}

impl fmt::Display for CipherParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.algorithm.as_str(),
            self.mode.as_str(),
            self.padding.as_str(),
            self.key_size
        )
    }
}

// ============================================================================
// ENGINE CONTRACT
// ============================================================================

/// Opaque symmetric encrypt/decrypt capability
pub trait CipherEngine: Send + Sync {
    /// IV length the parameter set requires, or `UnsupportedCipher`
    fn iv_len(&self, params: &CipherParams) -> Result<usize>;

    /// Encrypt `plaintext`
    fn encrypt(
        &self,
        params: &CipherParams,
        key: &CipherKey,
        iv: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext`
    fn decrypt(
        &self,
        params: &CipherParams,
        key: &CipherKey,
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Whether the engine can serve `params`
    fn supports(&self, params: &CipherParams) -> bool {
        self.iv_len(params).is_ok()
    }
}

// ============================================================================
// BUILT-IN AEAD ENGINE
// ============================================================================

/// Built-in engine for AES-GCM and ChaCha20-Poly1305
#[derive(Debug, Clone, Copy, Default)]
pub struct AeadEngine;

#[derive(Clone, Copy)]
enum Construction {
    Aes128,
    Aes256,
    ChaCha,
}

impl AeadEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }

    fn select(params: &CipherParams) -> Result<Construction> {
        let unsupported = || Error::UnsupportedCipher(params.to_string());
        if params.padding != Padding::None {
            return Err(unsupported());
        }
        match (params.algorithm, params.mode, params.key_size) {
            (CipherAlgorithm::Aes, CipherMode::Gcm, 128) => Ok(Construction::Aes128),
            (CipherAlgorithm::Aes, CipherMode::Gcm, 256) => Ok(Construction::Aes256),
            (CipherAlgorithm::ChaCha20, CipherMode::Poly1305, 256) => Ok(Construction::ChaCha),
            _ => Err(unsupported()),
        }
    }

    fn check_inputs(params: &CipherParams, key: &CipherKey, iv: &[u8]) -> Result<Construction> {
        let which = Self::select(params)?;
        if key.bits() != usize::from(params.key_size) {
            return Err(Error::CipherEngineError(format!(
                "key is {} bits, parameters call for {}",
                key.bits(),
                params.key_size
            )));
        }
        if iv.len() != AEAD_IV_SIZE {
            return Err(Error::CipherEngineError(format!(
                "IV must be {} bytes, got {}",
                AEAD_IV_SIZE,
                iv.len()
            )));
        }
        Ok(which)
    }
}

fn invalid_key<E: fmt::Display>(e: E) -> Error {
    Error::CipherEngineError(format!("Invalid key: {}", e))
}

fn engine_err(op: &'static str) -> impl Fn(aes_gcm::aead::Error) -> Error {
    move |e| Error::CipherEngineError(format!("{} failed: {}", op, e))
}

impl CipherEngine for AeadEngine {
    fn iv_len(&self, params: &CipherParams) -> Result<usize> {
        Self::select(params).map(|_| AEAD_IV_SIZE)
    }

    fn encrypt(
        &self,
        params: &CipherParams,
        key: &CipherKey,
        iv: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let key_bytes = key.as_bytes();

        match Self::check_inputs(params, key, iv)? {
            Construction::Aes128 => Aes128Gcm::new_from_slice(key_bytes)
                .map_err(invalid_key)?
                .encrypt(AesNonce::from_slice(iv), plaintext)
                .map_err(engine_err("Encryption")),
            Construction::Aes256 => Aes256Gcm::new_from_slice(key_bytes)
                .map_err(invalid_key)?
                .encrypt(AesNonce::from_slice(iv), plaintext)
                .map_err(engine_err("Encryption")),
            Construction::ChaCha => ChaCha20Poly1305::new_from_slice(key_bytes)
                .map_err(invalid_key)?
                .encrypt(ChaChaNonce::from_slice(iv), plaintext)
                .map_err(engine_err("Encryption")),
        }
    }

    fn decrypt(
        &self,
        params: &CipherParams,
        key: &CipherKey,
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        if ciphertext.len() < AEAD_TAG_SIZE {
            return Err(Error::CipherEngineError("Ciphertext too short".into()));
        }

        let key_bytes = key.as_bytes();

        match Self::check_inputs(params, key, iv)? {
            Construction::Aes128 => Aes128Gcm::new_from_slice(key_bytes)
                .map_err(invalid_key)?
                .decrypt(AesNonce::from_slice(iv), ciphertext)
                .map_err(engine_err("Decryption")),
            Construction::Aes256 => Aes256Gcm::new_from_slice(key_bytes)
                .map_err(invalid_key)?
                .decrypt(AesNonce::from_slice(iv), ciphertext)
                .map_err(engine_err("Decryption")),
            Construction::ChaCha => ChaCha20Poly1305::new_from_slice(key_bytes)
                .map_err(invalid_key)?
                .decrypt(ChaChaNonce::from_slice(iv), ciphertext)
                .map_err(engine_err("Decryption")),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
