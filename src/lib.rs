//! # Parley Core
//!
//! The secure-session core of a peer-to-peer encrypted chat client.
//!
//! Three pieces carry the protocol: a Diffie-Hellman key exchange that
//! establishes one shared secret per conversation pair, an encryption
//! envelope that protects messages and files with that secret, and a
//! chunked transfer manager that reassembles files delivered over an
//! unreliable, message-oriented channel.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PARLEY CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                     ┌───────────────────────────┐                       │
//! │                     │      SecureSession        │                       │
//! │                     │  open / send / inbound    │                       │
//! │                     └─────┬─────────┬─────────┬─┘                       │
//! │                           │         │         │                         │
//! │  ┌────────────────────────▼┐ ┌──────▼──────┐ ┌▼──────────────────────┐  │
//! │  │       Exchange          │ │   Crypto    │ │      Transfer         │  │
//! │  │                         │ │             │ │                       │  │
//! │  │ - Coordinator (polling) │ │ - powMod    │ │ - Split / encode      │  │
//! │  │ - Remote service trait  │ │ - DH params │ │ - Reassembly          │  │
//! │  │ - Loopback service      │ │ - HKDF      │ │ - Acceptance policy   │  │
//! │  └───────────┬─────────────┘ │ - Envelope  │ └───────────┬───────────┘  │
//! │              │               └─────────────┘             │              │
//! │  ┌───────────▼─────────────┐               ┌─────────────▼───────────┐  │
//! │  │        Storage          │               │       Transport         │  │
//! │  │                         │               │                         │  │
//! │  │ - SecretStore (pairs)   │               │ - Wire schema           │  │
//! │  │ - Memory / SQLite KV    │               │ - WebSocket / memory    │  │
//! │  └─────────────────────────┘               │ - Handler registry      │  │
//! │                                            └─────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Handshake, transfer and cipher settings
//! - [`crypto`] - Modular arithmetic, Diffie-Hellman, key derivation, envelopes
//! - [`storage`] - Key-value stores and the pair-keyed secret store
//! - [`exchange`] - Handshake state machine and remote service contract
//! - [`transport`] - Wire messages and the duplex channel
//! - [`transfer`] - Chunked file transfer
//! - [`session`] - Everything above wired to one channel
//!
//! ## Failure Model
//!
//! A handshake that does not finish degrades the conversation instead of
//! blocking it. A message that cannot be decrypted is reported on its own.
//! A corrupt chunk is dropped while the transfer continues. Only an
//! explicit error signal from the channel fails a transfer.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod session;
pub mod storage;
/// Millisecond timestamps.
pub mod time;
pub mod transfer;
pub mod transport;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::CoreConfig;
pub use crypto::{CipherParams, EnvelopeCipher, KeyPair, SharedSecret};
pub use error::{Error, Result};
pub use exchange::{HandshakeOutcome, KeyExchangeCoordinator, KeyExchangeService};
pub use session::{Conversation, SecureSession, SessionEvent};
pub use storage::SecretStore;
pub use transfer::TransferManager;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
