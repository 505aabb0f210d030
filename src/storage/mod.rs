//! # Storage Module
//!
//! Persistence for handshake material, keyed by user pair.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          STORAGE ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SecretStore                                                           │
//! │  ───────────                                                            │
//! │   pair_key("bob", "alice") == pair_key("alice", "bob") == "alice:bob"  │
//! │                                                                         │
//! │   dh_shared:alice:bob   → base64 shared secret                         │
//! │   dh_private:alice:bob  → hex private exponent                         │
//! │                                                                         │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  KeyValueStore (trait)                                                 │
//! │   ├── MemoryStore   parking_lot RwLock<HashMap>                        │
//! │   └── SqliteStore   single `kv` table, upsert                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes are last-write-wins. Both parties of a handshake derive the same
//! value, so concurrent writers racing on one key store identical bytes.

mod memory;
mod secret_store;
mod sqlite;

pub use memory::MemoryStore;
pub use secret_store::{keys, pair_key, SecretStore};
pub use sqlite::SqliteStore;

use crate::error::Result;

/// A small persistent string-keyed store
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite a value
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value, reporting whether it existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// Check if a key exists
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
