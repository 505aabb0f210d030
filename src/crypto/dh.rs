//! # Finite-Field Diffie-Hellman
//!
//! Domain parameters, key pairs and shared-secret derivation for the
//! per-conversation handshake.
//!
//! ## Agreement
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Alice                                         Bob                     │
//! │   ─────                                         ───                     │
//! │   a ∈ [2, p-2]                                  b ∈ [2, p-2]            │
//! │   A = g^a mod p  ──────────── A ───────────►                           │
//! │                  ◄─────────── B ────────────    B = g^b mod p           │
//! │                                                                         │
//! │   s = B^a mod p                                 s = A^b mod p           │
//! │                                                                         │
//! │   Both render s as big-endian bytes, left-padded to len(p)             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The process-wide constants are the 2048-bit MODP group from RFC 3526
//! (group 14) with generator 2.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use num_bigint::{BigUint, RandBigInt};
use num_traits::One;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::modular::{format_biguint, parse_biguint, pow_mod, Radix};
use crate::error::{Error, Result};

/// RFC 3526 group 14 prime, big-endian
const MODP_2048_PRIME: [u8; 256] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1, 0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22, 0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B, 0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45, 0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x37, 0xED, 0x6B, 0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5, 0xAE, 0x9F, 0x24, 0x11, 0x7C, 0x4B, 0x1F, 0xE6,
    0x49, 0x28, 0x66, 0x51, 0xEC, 0xE4, 0x5B, 0x3D, 0xC2, 0x00, 0x7C, 0xB8, 0xA1, 0x63, 0xBF, 0x05,
    0x98, 0xDA, 0x48, 0x36, 0x1C, 0x55, 0xD3, 0x9A, 0x69, 0x16, 0x3F, 0xA8, 0xFD, 0x24, 0xCF, 0x5F,
    0x83, 0x65, 0x5D, 0x23, 0xDC, 0xA3, 0xAD, 0x96, 0x1C, 0x62, 0xF3, 0x56, 0x20, 0x85, 0x52, 0xBB,
    0x9E, 0xD5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6D, 0x67, 0x0C, 0x35, 0x4E, 0x4A, 0xBC, 0x98, 0x04,
    0xF1, 0x74, 0x6C, 0x08, 0xCA, 0x18, 0x21, 0x7C, 0x32, 0x90, 0x5E, 0x46, 0x2E, 0x36, 0xCE, 0x3B,
    0xE3, 0x9E, 0x77, 0x2C, 0x18, 0x0E, 0x86, 0x03, 0x9B, 0x27, 0x83, 0xA2, 0xEC, 0x07, 0xA2, 0x8F,
    0xB5, 0xC5, 0x5D, 0xF0, 0x6F, 0x4C, 0x52, 0xC9, 0xDE, 0x2B, 0xCB, 0xF6, 0x95, 0x58, 0x17, 0x18,
    0x39, 0x95, 0x49, 0x7C, 0xEA, 0x95, 0x6A, 0xE5, 0x15, 0xD2, 0x26, 0x18, 0x98, 0xFA, 0x05, 0x10,
    0x15, 0x72, 0x8E, 0x5A, 0x8A, 0xAC, 0xAA, 0x68, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// RFC 3526 group 14 generator
const MODP_2048_GENERATOR: u32 = 2;

// ============================================================================
// DOMAIN PARAMETERS
// ============================================================================

/// Prime and generator shared by every handshake
#[derive(Clone, PartialEq, Eq)]
pub struct DomainParams {
    prime: BigUint,
    generator: BigUint,
}

impl DomainParams {
    /// The 2048-bit MODP group with generator 2
    pub fn standard() -> Self {
        Self {
            prime: BigUint::from_bytes_be(&MODP_2048_PRIME),
            generator: BigUint::from(MODP_2048_GENERATOR),
        }
    }

    /// Custom parameters
    ///
    /// The prime must exceed 3 so that `[2, p-2]` is non-empty, and the
    /// generator must lie in `[2, p-1)`.
    pub fn new(prime: BigUint, generator: BigUint) -> Result<Self> {
        let two = BigUint::from(2u32);
        let three = BigUint::from(3u32);
        if prime <= three {
            return Err(Error::KeyExchangeFailed("prime must be greater than 3".into()));
        }
        if generator < two || generator >= &prime - BigUint::one() {
            return Err(Error::KeyExchangeFailed("generator out of range".into()));
        }
        Ok(Self { prime, generator })
    }

    /// Parse parameters received as strings in a stated radix
    pub fn parse(prime: &str, generator: &str, radix: Radix) -> Result<Self> {
        Self::new(parse_biguint(prime, radix)?, parse_biguint(generator, radix)?)
    }

    /// The prime modulus
    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// The generator
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Byte length of the prime; shared secrets are rendered at this width
    pub fn byte_len(&self) -> usize {
        ((self.prime.bits() + 7) / 8) as usize
    }

    /// Check that a public value lies in `(1, p-1)`
    pub fn check_public(&self, value: &BigUint) -> Result<()> {
        let one = BigUint::one();
        if value <= &one || value >= &(&self.prime - &one) {
            return Err(Error::KeyExchangeFailed("public value out of range".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for DomainParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainParams")
            .field("prime_bits", &self.prime.bits())
            .field("generator", &format_biguint(&self.generator, Radix::Decimal))
            .finish()
    }
}

impl Default for DomainParams {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// KEY PAIR
// ============================================================================

/// A private exponent and its public value `g^x mod p`
#[derive(Clone)]
pub struct KeyPair {
    private: BigUint,
    public: BigUint,
}

impl KeyPair {
    /// Sample a private exponent uniformly from `[2, p-2]` using the OS RNG
    ///
    /// Exponents whose public value the peer would reject (`p-1`) are
    /// resampled.
    pub fn generate(params: &DomainParams) -> Result<Self> {
        let low = BigUint::from(2u32);
        // gen_biguint_range is half-open, so the upper bound is p-1
        let high = params.prime() - BigUint::one();
        loop {
            let private = OsRng.gen_biguint_range(&low, &high);
            let pair = Self::from_private(params, private)?;
            if params.check_public(&pair.public).is_ok() {
                return Ok(pair);
            }
        }
    }

    /// Rebuild a key pair from a persisted private exponent
    pub fn from_private(params: &DomainParams, private: BigUint) -> Result<Self> {
        let public = pow_mod(params.generator(), &private, params.prime())?;
        Ok(Self { private, public })
    }

    /// The public value
    pub fn public(&self) -> &BigUint {
        &self.public
    }

    /// The private exponent as lowercase hex, for persistence
    pub fn private_hex(&self) -> String {
        format_biguint(&self.private, Radix::Hex)
    }

    /// Restore from [`KeyPair::private_hex`] output
    pub fn from_private_hex(params: &DomainParams, hex: &str) -> Result<Self> {
        Self::from_private(params, parse_biguint(hex, Radix::Hex)?)
    }

    /// Derive the shared secret from the other party's public value
    pub fn derive(&self, params: &DomainParams, peer_public: &BigUint) -> Result<SharedSecret> {
        params.check_public(peer_public)?;
        let shared = pow_mod(peer_public, &self.private, params.prime())?;
        Ok(SharedSecret::from_biguint(&shared, params.byte_len()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_bits", &self.public.bits())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SHARED SECRET
// ============================================================================

/// A shared secret derived from the Diffie-Hellman exchange
///
/// Zeroized when dropped. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: Vec<u8>,
}

impl SharedSecret {
    /// Wrap raw secret bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Render a group element as big-endian bytes left-padded to `width`
    pub fn from_biguint(value: &BigUint, width: usize) -> Self {
        let raw = value.to_bytes_be();
        let mut bytes = vec![0u8; width.saturating_sub(raw.len())];
        bytes.extend_from_slice(&raw);
        Self { bytes }
    }

    /// Raw secret bytes (input key material)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encode for storage
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Decode a stored secret
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64.decode(encoded.trim())?;
        if bytes.is_empty() {
            return Err(Error::StorageReadError("stored shared secret is empty".into()));
        }
        Ok(Self { bytes })
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret({} bytes)", self.bytes.len())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_params() -> DomainParams {
        DomainParams::new(BigUint::from(23u32), BigUint::from(5u32)).unwrap()
    }

    #[test]
    fn test_standard_params() {
        let params = DomainParams::standard();
        assert_eq!(params.prime().bits(), 2048);
        assert_eq!(params.byte_len(), 256);
        assert_eq!(params.generator(), &BigUint::from(2u32));

        let from_hex = parse_biguint(
            "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
            Radix::Hex,
        )
        .unwrap();
        let top = params.prime() >> (2048 - 192);
        assert_eq!(top, from_hex);
    }

    #[test]
    fn test_textbook_scenario() {
        let params = toy_params();
        let alice = KeyPair::from_private(&params, BigUint::from(6u32)).unwrap();
        let bob = KeyPair::from_private(&params, BigUint::from(15u32)).unwrap();
        assert_eq!(alice.public(), &BigUint::from(8u32));
        assert_eq!(bob.public(), &BigUint::from(19u32));

        let s_alice = alice.derive(&params, bob.public()).unwrap();
        let s_bob = bob.derive(&params, alice.public()).unwrap();
        assert_eq!(s_alice, s_bob);
        assert_eq!(s_alice.as_bytes(), &[2u8]);
    }

    #[test]
    fn test_generated_pairs_agree() {
        let params = DomainParams::standard();
        let a = KeyPair::generate(&params).unwrap();
        let b = KeyPair::generate(&params).unwrap();

        let s1 = a.derive(&params, b.public()).unwrap();
        let s2 = b.derive(&params, a.public()).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1.as_bytes().len(), 256);
    }

    #[test]
    fn test_private_exponent_in_range() {
        let params = toy_params();
        for _ in 0..200 {
            let pair = KeyPair::generate(&params).unwrap();
            let x = parse_biguint(&pair.private_hex(), Radix::Hex).unwrap();
            assert!(x >= BigUint::from(2u32));
            assert!(x <= BigUint::from(21u32));
            assert!(params.check_public(pair.public()).is_ok());
        }
    }

    #[test]
    fn test_private_hex_restores_pair() {
        let params = DomainParams::standard();
        let pair = KeyPair::generate(&params).unwrap();
        let restored = KeyPair::from_private_hex(&params, &pair.private_hex()).unwrap();
        assert_eq!(pair.public(), restored.public());
    }

    #[test]
    fn test_degenerate_public_rejected() {
        let params = toy_params();
        let pair = KeyPair::from_private(&params, BigUint::from(6u32)).unwrap();
        assert!(pair.derive(&params, &BigUint::from(1u32)).is_err());
        assert!(pair.derive(&params, &BigUint::from(22u32)).is_err());
        assert!(pair.derive(&params, &BigUint::from(0u32)).is_err());
    }

    #[test]
    fn test_invalid_domain_params() {
        assert!(DomainParams::new(BigUint::from(3u32), BigUint::from(2u32)).is_err());
        assert!(DomainParams::new(BigUint::from(23u32), BigUint::from(1u32)).is_err());
        assert!(DomainParams::new(BigUint::from(23u32), BigUint::from(22u32)).is_err());
        assert!(DomainParams::parse("17", "3", Radix::Hex).is_ok());
    }

    #[test]
    fn test_secret_padding() {
        let secret = SharedSecret::from_biguint(&BigUint::from(0x0102u32), 4);
        assert_eq!(secret.as_bytes(), &[0, 0, 1, 2]);
    }

    #[test]
    fn test_secret_base64_and_debug() {
        let secret = SharedSecret::from_bytes(vec![7u8; 32]);
        let restored = SharedSecret::from_base64(&secret.to_base64()).unwrap();
        assert_eq!(secret, restored);
        assert_eq!(format!("{:?}", secret), "SharedSecret(32 bytes)");
        assert!(SharedSecret::from_base64("").is_err());
    }
}
