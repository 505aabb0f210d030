//! # Secret Store
//!
//! Shared secrets and handshake private exponents, keyed by the sorted
//! user pair so both participants address the same entry.

use std::sync::Arc;

use super::{KeyValueStore, MemoryStore};
use crate::crypto::{DomainParams, KeyPair, SharedSecret};
use crate::error::Result;

/// Key namespaces inside the backing store
pub mod keys {
    /// Prefix for derived shared secrets
    pub const SHARED_SECRET: &str = "dh_shared";

    /// Prefix for persisted private exponents
    pub const PRIVATE_EXPONENT: &str = "dh_private";
}

/// Order-independent identifier for a pair of users
///
/// The identities are sorted lexicographically and joined with `:`.
/// Inside each identity `%` and `:` are percent-escaped, so the separator
/// is unambiguous: `("a:b", "c")` and `("a", "b:c")` get distinct keys
/// while plain names stay readable (`"alice:bob"`).
pub fn pair_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", escape_identity(first), escape_identity(second))
}

fn escape_identity(identity: &str) -> String {
    identity.replace('%', "%25").replace(':', "%3A")
}

fn namespaced(prefix: &str, pair: &str) -> String {
    format!("{}:{}", prefix, pair)
}

/// Handshake material persistence
#[derive(Clone)]
pub struct SecretStore {
    backend: Arc<dyn KeyValueStore>,
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SecretStore {
    /// Wrap a backing store
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    // ========================================================================
    // RAW PAIR-KEY CONTRACT
    // ========================================================================

    /// Write a value under a pair key
    pub fn put(&self, pair: &str, value: &str) -> Result<()> {
        self.backend.put(pair, value)
    }

    /// Read a value under a pair key
    pub fn get(&self, pair: &str) -> Result<Option<String>> {
        self.backend.get(pair)
    }

    /// Remove a value under a pair key
    pub fn delete(&self, pair: &str) -> Result<bool> {
        self.backend.delete(pair)
    }

    // ========================================================================
    // SHARED SECRETS
    // ========================================================================

    /// Persist the shared secret for a pair
    pub fn put_shared_secret(&self, pair: &str, secret: &SharedSecret) -> Result<()> {
        self.put(&namespaced(keys::SHARED_SECRET, pair), &secret.to_base64())
    }

    /// Load the shared secret for a pair
    pub fn shared_secret(&self, pair: &str) -> Result<Option<SharedSecret>> {
        self.get(&namespaced(keys::SHARED_SECRET, pair))?
            .map(|encoded| SharedSecret::from_base64(&encoded))
            .transpose()
    }

    // ========================================================================
    // PRIVATE EXPONENTS
    // ========================================================================

    /// Persist the local private exponent for a pending handshake
    pub fn put_key_pair(&self, pair: &str, key_pair: &KeyPair) -> Result<()> {
        self.put(&namespaced(keys::PRIVATE_EXPONENT, pair), &key_pair.private_hex())
    }

    /// Restore the local key pair for a pending handshake
    pub fn key_pair(&self, pair: &str, params: &DomainParams) -> Result<Option<KeyPair>> {
        self.get(&namespaced(keys::PRIVATE_EXPONENT, pair))?
            .map(|hex| KeyPair::from_private_hex(params, &hex))
            .transpose()
    }

    /// Erase everything stored for a pair
    pub fn forget(&self, pair: &str) -> Result<()> {
        self.delete(&namespaced(keys::SHARED_SECRET, pair))?;
        self.delete(&namespaced(keys::PRIVATE_EXPONENT, pair))?;
        Ok(())
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore").finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use num_bigint::BigUint;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("bob", "alice"), "alice:bob");
        assert_eq!(pair_key("alice", "bob"), "alice:bob");
        assert_ne!(pair_key("ab", "c"), pair_key("a", "bc"));
    }

    #[test]
    fn test_pair_key_separator_in_identity() {
        assert_ne!(pair_key("a:b", "c"), pair_key("a", "b:c"));
        assert_eq!(pair_key("c", "a:b"), "a%3Ab:c");
        // An identity that already looks escaped stays distinct
        assert_ne!(pair_key("a%3Ab", "c"), pair_key("a:b", "c"));
    }

    #[test]
    fn test_shared_secret_storage() {
        let store = SecretStore::in_memory();
        let pair = pair_key("alice", "bob");
        assert!(store.shared_secret(&pair).unwrap().is_none());

        let secret = SharedSecret::from_bytes(vec![5u8; 32]);
        store.put_shared_secret(&pair, &secret).unwrap();
        assert_eq!(store.shared_secret(&pair).unwrap(), Some(secret.clone()));

        // Same value written twice is harmless
        store.put_shared_secret(&pair, &secret).unwrap();
        assert_eq!(store.shared_secret(&pair).unwrap(), Some(secret));
    }

    #[test]
    fn test_key_pair_storage() {
        let store = SecretStore::in_memory();
        let params = DomainParams::new(BigUint::from(23u32), BigUint::from(5u32)).unwrap();
        let pair = pair_key("alice", "bob");

        let kp = KeyPair::from_private(&params, BigUint::from(6u32)).unwrap();
        store.put_key_pair(&pair, &kp).unwrap();

        let restored = store.key_pair(&pair, &params).unwrap().unwrap();
        assert_eq!(restored.public(), &BigUint::from(8u32));
    }

    #[test]
    fn test_forget_erases_pair() {
        let store = SecretStore::new(Arc::new(SqliteStore::open_in_memory().unwrap()));
        let params = DomainParams::standard();
        let pair = pair_key("alice", "bob");

        store.put_shared_secret(&pair, &SharedSecret::from_bytes(vec![1u8; 8])).unwrap();
        store.put_key_pair(&pair, &KeyPair::generate(&params).unwrap()).unwrap();

        store.forget(&pair).unwrap();
        assert!(store.shared_secret(&pair).unwrap().is_none());
        assert!(store.key_pair(&pair, &params).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_secret_is_an_error() {
        let store = SecretStore::in_memory();
        store.put("dh_shared:alice:bob", "***").unwrap();
        assert!(store.shared_secret("alice:bob").is_err());
    }
}
