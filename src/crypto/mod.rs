//! # Cryptography Module
//!
//! Primitives behind the secure session: the Diffie-Hellman handshake math,
//! key derivation, the cipher engine boundary and message envelopes.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  modular   pow_mod(base, exp, m), radix-explicit parsing               │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  dh        DomainParams (RFC 3526 group 14), KeyPair, SharedSecret     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  kdf       HKDF-SHA256(secret, params) → CipherKey                     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  cipher    CipherEngine trait, AeadEngine (AES-GCM, ChaCha20-Poly1305) │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  envelope  EncryptedEnvelope { ciphertext, iv, params }                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Lifecycle
//!
//! | Material | Lifetime | Storage |
//! |----------|----------|---------|
//! | Private exponent | One handshake per pair | Secret store (hex) |
//! | Shared secret | Until the conversation is deleted | Secret store (base64) |
//! | Envelope key | One seal/open call | Memory only, zeroized |
//! | IV | One envelope | Travels with the envelope |

pub mod cipher;
pub mod dh;
pub mod envelope;
pub mod kdf;
pub mod modular;

pub use cipher::{AeadEngine, CipherAlgorithm, CipherEngine, CipherMode, CipherParams, Padding};
pub use dh::{DomainParams, KeyPair, SharedSecret};
pub use envelope::{EncryptedEnvelope, EnvelopeCipher, EnvelopeWire};
pub use kdf::{derive_envelope_key, CipherKey};
pub use modular::{format_biguint, parse_biguint, pow_mod, Radix};
