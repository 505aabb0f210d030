//! # Key Derivation
//!
//! Turns the raw Diffie-Hellman secret into cipher keys.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 SHARED SECRET → ENVELOPE KEY                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  HKDF-SHA256(                                                          │
//! │    ikm  = shared_secret (len(p) bytes),                                │
//! │    salt = empty,                                                       │
//! │    info = "parley-envelope-v1|<algorithm>|<mode>|<key bits>"           │
//! │  )                                                                     │
//! │                                                                         │
//! │  → key_bits / 8 bytes                                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Binding the cipher parameters into `info` gives every algorithm and key
//! size an independent key, so an envelope sealed under one parameter set
//! never authenticates under another.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher::CipherParams;
use super::dh::SharedSecret;
use crate::error::{Error, Result};

/// Domain separation strings for HKDF
pub mod domain {
    /// Prefix for envelope key derivation
    pub const ENVELOPE_KEY: &str = "parley-envelope-v1";
}

/// Largest key HKDF-SHA256 is asked to produce here
pub const MAX_KEY_BYTES: usize = 64;

/// A symmetric key for the cipher engine
///
/// Zeroized when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherKey(Vec<u8>);

impl CipherKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw key
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bits
    pub fn bits(&self) -> usize {
        self.0.len() * 8
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CipherKey({} bits)", self.bits())
    }
}

/// Info string binding a derived key to its cipher parameters
pub fn envelope_info(params: &CipherParams) -> String {
    format!(
        "{}|{}|{}|{}",
        domain::ENVELOPE_KEY,
        params.algorithm.as_str(),
        params.mode.as_str(),
        params.key_size
    )
}

/// Derive the envelope key for `params` from a shared secret
pub fn derive_envelope_key(secret: &SharedSecret, params: &CipherParams) -> Result<CipherKey> {
    let bits = usize::from(params.key_size);
    if bits == 0 || bits % 8 != 0 || bits / 8 > MAX_KEY_BYTES {
        return Err(Error::UnsupportedCipher(format!(
            "key size {} bits cannot be derived",
            params.key_size
        )));
    }

    let hkdf = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut key = vec![0u8; bits / 8];
    hkdf.expand(envelope_info(params).as_bytes(), &mut key)
        .map_err(|_| Error::KeyDerivationFailed("HKDF expansion failed".into()))?;

    Ok(CipherKey(key))
}

// ============================================================================
// TESTS
// ============================================================================
