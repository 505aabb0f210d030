//! # Error Handling
//!
//! Error types for the Parley secure session core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Configuration Errors                                              │
//! │  │   └── InvalidConfig          - Rejected configuration value         │
//! │  │                                                                      │
//! │  ├── Key Exchange Errors                                               │
//! │  │   ├── HandshakeTimeout       - Poll budget exhausted (degrades)     │
//! │  │   ├── KeyExchangeFailed      - Protocol could not proceed           │
//! │  │   ├── RemoteServiceError     - Remote handshake call failed         │
//! │  │   ├── InvalidModulus         - Zero modulus in modular arithmetic   │
//! │  │   └── InvalidNumber          - Unparseable numeric string           │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── KeyUnavailable         - No shared secret for the peer        │
//! │  │   ├── MalformedEnvelope      - Missing / undecodable fields         │
//! │  │   ├── CipherEngineError      - Engine refused to encrypt/decrypt    │
//! │  │   ├── UnsupportedCipher      - Params the engine cannot serve       │
//! │  │   └── KeyDerivationFailed    - HKDF expansion failed                │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageReadError / StorageWriteError                          │
//! │  │   └── DatabaseError                                                 │
//! │  │                                                                      │
//! │  ├── Transport Errors                                                  │
//! │  │   ├── ChannelError           - Transport failure / error signal     │
//! │  │   └── RegistryConflict       - Handler id already registered        │
//! │  │                                                                      │
//! │  └── Transfer Errors                                                   │
//! │      ├── ChunkDecodeError       - Single corrupt chunk (dropped)       │
//! │      ├── InsufficientChunks     - Below acceptance threshold           │
//! │      ├── TransferNotFound       - Unknown transfer id                  │
//! │      └── InvalidTransfer        - Bad chunk size / empty payload       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HandshakeTimeout      → logged, conversation opens degraded            │
//! │  KeyUnavailable        → returned to caller, send is blocked            │
//! │  MalformedEnvelope /                                                    │
//! │  CipherEngineError     → surfaced per message, session stays up         │
//! │  ChunkDecodeError      → slot dropped, transfer continues               │
//! │  InsufficientChunks    → transfer stays pending                         │
//! │  ChannelError          → transfer marked failed, buffers released       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for Parley core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Parley core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors (100-199)
    // ========================================================================

    /// A configuration value was rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Key Exchange Errors (200-299)
    // ========================================================================

    /// The handshake poll budget was exhausted before the peer responded
    #[error("Key exchange with {peer} timed out after {attempts} attempts")]
    HandshakeTimeout {
        /// Peer the handshake was attempted with
        peer: String,
        /// Number of status polls performed
        attempts: u32,
    },

    /// The handshake could not proceed
    #[error("Key exchange failed: {0}")]
    KeyExchangeFailed(String),

    /// A remote key exchange call failed or was rejected
    #[error("Remote key exchange service error: {0}")]
    RemoteServiceError(String),

    /// Modular arithmetic was asked to reduce modulo zero
    #[error("Modulus must be non-zero")]
    InvalidModulus,

    /// A numeric string could not be parsed in the stated radix
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// No shared secret exists for the peer
    #[error("No shared secret available for {0}")]
    KeyUnavailable(String),

    /// An envelope is missing fields or has undecodable fields
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The cipher engine failed to encrypt or decrypt
    #[error("Cipher engine error: {0}")]
    CipherEngineError(String),

    /// The cipher engine does not support the requested parameters
    #[error("Unsupported cipher parameters: {0}")]
    UnsupportedCipher(String),

    /// Key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivationFailed(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    // ========================================================================
    // Transport Errors (500-599)
    // ========================================================================

    /// The duplex channel failed or reported an explicit error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// A handler is already registered under this id
    #[error("Handler already registered: {0}")]
    RegistryConflict(String),

    // ========================================================================
    // Transfer Errors (600-699)
    // ========================================================================

    /// A single chunk payload could not be decoded
    #[error("Chunk {chunk_index} could not be decoded: {reason}")]
    ChunkDecodeError {
        /// Index of the corrupt chunk
        chunk_index: u32,
        /// Decoder message
        reason: String,
    },

    /// Not enough valid chunks to accept the transfer
    #[error("Insufficient chunks: {valid} of {expected} valid")]
    InsufficientChunks {
        /// Present, non-empty chunks
        valid: u32,
        /// Chunks implied by the terminal index
        expected: u32,
    },

    /// No transfer job is registered under this id
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    /// A transfer request was invalid
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Configuration
    /// - 200-299: Key exchange
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 500-599: Transport
    /// - 600-699: Transfer
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_) => 100,

            Error::HandshakeTimeout { .. } => 200,
            Error::KeyExchangeFailed(_) => 201,
            Error::RemoteServiceError(_) => 202,
            Error::InvalidModulus => 203,
            Error::InvalidNumber(_) => 204,

            Error::KeyUnavailable(_) => 300,
            Error::MalformedEnvelope(_) => 301,
            Error::CipherEngineError(_) => 302,
            Error::UnsupportedCipher(_) => 303,
            Error::KeyDerivationFailed(_) => 304,

            Error::StorageReadError(_) => 400,
            Error::StorageWriteError(_) => 401,
            Error::DatabaseError(_) => 402,

            Error::ChannelError(_) => 500,
            Error::RegistryConflict(_) => 501,

            Error::ChunkDecodeError { .. } => 600,
            Error::InsufficientChunks { .. } => 601,
            Error::TransferNotFound(_) => 602,
            Error::InvalidTransfer(_) => 603,

            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
            Error::DeserializationError(_) => 902,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the session usable: the caller may retry,
    /// wait for more data, or continue in a degraded mode.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::HandshakeTimeout { .. }
                | Error::RemoteServiceError(_)
                | Error::ChunkDecodeError { .. }
                | Error::InsufficientChunks { .. }
                | Error::ChannelError(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Error::DeserializationError(err.to_string())
        } else {
            Error::SerializationError(err.to_string())
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::DeserializationError(format!("base64: {}", err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageReadError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
