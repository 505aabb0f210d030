//! # Configuration
//!
//! Tunables for the handshake, chunked transfers and the default cipher.
//!
//! ```toml
//! allow_plaintext_fallback = false
//!
//! [handshake]
//! poll_interval_ms = 5000
//! max_attempts = 3
//!
//! [transfer]
//! chunk_size = 65536
//! inter_chunk_delay_ms = 10
//! acceptance_threshold = 0.3
//! idle_timeout_ms = 120000
//!
//! [cipher]
//! algorithm = "aes"
//! mode = "gcm"
//! padding = "none"
//! keySize = 256
//! ```
//!
//! Every section and field is optional; missing values take the defaults
//! shown above.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::crypto::{CipherAlgorithm, CipherMode, CipherParams, Padding};
use crate::error::{Error, Result};

/// Handshake polling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Fixed delay between status polls
    pub poll_interval_ms: u64,
    /// Status polls before the handshake degrades
    pub max_attempts: u32,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            max_attempts: 3,
        }
    }
}

impl HandshakeConfig {
    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Chunked transfer policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per outbound chunk
    pub chunk_size: usize,
    /// Pause between outbound chunks
    pub inter_chunk_delay_ms: u64,
    /// Fraction of valid chunks required to accept a transfer, in `(0, 1]`
    pub acceptance_threshold: f64,
    /// A job with no activity for this long is failed by the idle sweep; 0 disables it
    pub idle_timeout_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            inter_chunk_delay_ms: 10,
            acceptance_threshold: 0.3,
            idle_timeout_ms: 120_000,
        }
    }
}

impl TransferConfig {
    /// Inter-chunk delay as a `Duration`
    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.inter_chunk_delay_ms)
    }
}

/// Configuration for a secure session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// Handshake polling
    pub handshake: HandshakeConfig,
    /// Chunked transfers
    pub transfer: TransferConfig,
    /// Cipher negotiated for new conversations
    #[serde(deserialize_with = "cipher_with_defaults")]
    pub cipher: CipherParams,
    /// Allow plaintext sends on a conversation whose handshake degraded
    pub allow_plaintext_fallback: bool,
}

/// `[cipher]` as written in a config file; every field may be omitted
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CipherSection {
    algorithm: Option<CipherAlgorithm>,
    mode: Option<CipherMode>,
    padding: Option<Padding>,
    key_size: Option<u16>,
}

fn cipher_with_defaults<'de, D>(deserializer: D) -> std::result::Result<CipherParams, D::Error>
where
    D: Deserializer<'de>,
{
    let section = CipherSection::deserialize(deserializer)?;
    let base = CipherParams::default();
    Ok(CipherParams {
        algorithm: section.algorithm.unwrap_or(base.algorithm),
        mode: section.mode.unwrap_or(base.mode),
        padding: section.padding.unwrap_or(base.padding),
        key_size: section.key_size.unwrap_or(base.key_size),
    })
}

impl CoreConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject values no session can run with
    pub fn validate(&self) -> Result<()> {
        if self.handshake.max_attempts == 0 {
            return Err(Error::InvalidConfig("handshake.max_attempts must be at least 1".into()));
        }

        let threshold = self.transfer.acceptance_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "transfer.acceptance_threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.transfer.chunk_size == 0 {
            return Err(Error::InvalidConfig("transfer.chunk_size must be non-zero".into()));
        }

        let bits = self.cipher.key_size;
        if bits == 0 || bits % 8 != 0 {
            return Err(Error::InvalidConfig(format!(
                "cipher.keySize must be a non-zero multiple of 8, got {}",
                bits
            )));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.handshake.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.handshake.max_attempts, 3);
        assert_eq!(config.transfer.chunk_size, 65_536);
        assert_eq!(config.transfer.inter_chunk_delay(), Duration::from_millis(10));
        assert!((config.transfer.acceptance_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.cipher, CipherParams::default());
        assert!(!config.allow_plaintext_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = CoreConfig::from_toml_str(
            r#"
            [transfer]
            acceptance_threshold = 0.9

            [cipher]
            algorithm = "chacha20"
            mode = "poly1305"
            padding = "none"
            "#,
        )
        .unwrap();

        assert!((config.transfer.acceptance_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.transfer.chunk_size, 65_536);
        assert_eq!(config.cipher.algorithm, CipherAlgorithm::ChaCha20);
        assert_eq!(config.cipher.mode, CipherMode::Poly1305);
        assert_eq!(config.cipher.key_size, 256);
        assert_eq!(config.handshake, HandshakeConfig::default());
    }

    #[test]
    fn test_cipher_section_fields_optional() {
        let config = CoreConfig::from_toml_str("[cipher]\nkeySize = 128\n").unwrap();
        assert_eq!(
            config.cipher,
            CipherParams {
                key_size: 128,
                ..CipherParams::default()
            }
        );

        let config = CoreConfig::from_toml_str("[transfer]\nidle_timeout_ms = 0\n").unwrap();
        assert_eq!(config.transfer.idle_timeout_ms, 0);
        assert_eq!(config.cipher, CipherParams::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CoreConfig::default();
        config.transfer.acceptance_threshold = 0.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.transfer.acceptance_threshold = 1.5;
        assert!(config.validate().is_err());

        config.transfer.acceptance_threshold = 1.0;
        assert!(config.validate().is_ok());

        config.transfer.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.handshake.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.cipher.key_size = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            CoreConfig::from_toml_str("handshake = 12"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        std::fs::write(&path, "allow_plaintext_fallback = true\n").unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert!(config.allow_plaintext_fallback);

        assert!(CoreConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
