//! # Modular Arithmetic
//!
//! Arbitrary-precision modular exponentiation over unsigned integers.
//!
//! ## Square-and-Multiply
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 base^exponent mod modulus                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  result = 1, acc = base mod m                                          │
//! │                                                                         │
//! │  for each bit of exponent, least significant first:                    │
//! │      if bit == 1:  result = result * acc mod m                         │
//! │      acc = acc * acc mod m                                             │
//! │                                                                         │
//! │  O(log exponent) multiplications                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Number Representation
//!
//! Values travelling over the wire are strings. The caller always states
//! the radix with [`Radix`]. A string such as `"1234"` is valid in both
//! decimal and hex and means different numbers, so the radix is never
//! guessed from the characters.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Radix of a numeric string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Radix {
    /// Base 10
    Decimal,
    /// Base 16, case-insensitive, optional `0x` prefix
    Hex,
}

impl Radix {
    /// Numeric base
    pub fn base(self) -> u32 {
        match self {
            Radix::Decimal => 10,
            Radix::Hex => 16,
        }
    }
}

/// Parse a numeric string in the given radix
///
/// Surrounding whitespace is ignored. Empty strings and strings with
/// characters outside the radix are rejected.
pub fn parse_biguint(value: &str, radix: Radix) -> Result<BigUint> {
    let trimmed = value.trim();
    let digits = match radix {
        Radix::Hex => trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed),
        Radix::Decimal => trimmed,
    };

    if digits.is_empty() {
        return Err(Error::InvalidNumber("empty numeric string".into()));
    }

    BigUint::parse_bytes(digits.as_bytes(), radix.base()).ok_or_else(|| {
        Error::InvalidNumber(format!("'{}' is not a valid base-{} number", value, radix.base()))
    })
}

/// Render a number in the given radix (lowercase hex, no prefix)
pub fn format_biguint(value: &BigUint, radix: Radix) -> String {
    value.to_str_radix(radix.base())
}

/// Compute `base^exponent mod modulus`
///
/// - `modulus == 0` is rejected with [`Error::InvalidModulus`]
/// - `modulus == 1` yields 0
/// - `exponent == 0` yields `1 mod modulus`
pub fn pow_mod(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> Result<BigUint> {
    if modulus.is_zero() {
        return Err(Error::InvalidModulus);
    }
    if modulus.is_one() {
        return Ok(BigUint::zero());
    }

    let mut result = BigUint::one();
    let mut acc = base % modulus;

    for i in 0..exponent.bits() {
        if exponent.bit(i) {
            result = (&result * &acc) % modulus;
        }
        acc = (&acc * &acc) % modulus;
    }

    Ok(result)
}

/// [`pow_mod`] over numeric strings, all in the same radix
pub fn pow_mod_str(base: &str, exponent: &str, modulus: &str, radix: Radix) -> Result<BigUint> {
    pow_mod(
        &parse_biguint(base, radix)?,
        &parse_biguint(exponent, radix)?,
        &parse_biguint(modulus, radix)?,
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_small_scenario() {
        // Alice and Bob with p = 23, g = 5
        assert_eq!(pow_mod(&n(5), &n(6), &n(23)).unwrap(), n(8));
        assert_eq!(pow_mod(&n(5), &n(15), &n(23)).unwrap(), n(19));
        assert_eq!(pow_mod(&n(19), &n(6), &n(23)).unwrap(), n(2));
        assert_eq!(pow_mod(&n(8), &n(15), &n(23)).unwrap(), n(2));
    }

    #[test]
    fn test_modulus_one_is_zero() {
        assert_eq!(pow_mod(&n(7), &n(3), &n(1)).unwrap(), n(0));
        assert_eq!(pow_mod(&n(7), &n(0), &n(1)).unwrap(), n(0));
    }

    #[test]
    fn test_zero_exponent() {
        assert_eq!(pow_mod(&n(12345), &n(0), &n(23)).unwrap(), n(1));
    }

    #[test]
    fn test_zero_modulus_rejected() {
        assert!(matches!(
            pow_mod(&n(2), &n(3), &n(0)),
            Err(Error::InvalidModulus)
        ));
    }

    #[test]
    fn test_matches_builtin_modpow() {
        let base = parse_biguint("deadbeefcafebabe1234", Radix::Hex).unwrap();
        let exp = parse_biguint("98765432109876543210", Radix::Decimal).unwrap();
        let m = parse_biguint("fffffffffffffffffffffffffffffff1", Radix::Hex).unwrap();
        assert_eq!(pow_mod(&base, &exp, &m).unwrap(), base.modpow(&exp, &m));
    }

    #[test]
    fn test_dh_agreement() {
        let p = n(4_294_967_291); // largest 32-bit prime
        let g = n(2);
        let a = n(1_234_567);
        let b = n(7_654_321);
        let pub_a = pow_mod(&g, &a, &p).unwrap();
        let pub_b = pow_mod(&g, &b, &p).unwrap();
        assert_eq!(
            pow_mod(&pub_a, &b, &p).unwrap(),
            pow_mod(&pub_b, &a, &p).unwrap()
        );
    }

    #[test]
    fn test_radix_is_explicit() {
        // Same characters, different values
        assert_eq!(parse_biguint("1234", Radix::Decimal).unwrap(), n(1234));
        assert_eq!(parse_biguint("1234", Radix::Hex).unwrap(), n(0x1234));
    }

    #[test]
    fn test_parse_rejects_bad_digits() {
        assert!(matches!(
            parse_biguint("12ab", Radix::Decimal),
            Err(Error::InvalidNumber(_))
        ));
        assert!(parse_biguint("", Radix::Hex).is_err());
        assert!(parse_biguint("0x", Radix::Hex).is_err());
    }

    #[test]
    fn test_hex_prefix_and_format() {
        let v = parse_biguint("0xFF", Radix::Hex).unwrap();
        assert_eq!(v, n(255));
        assert_eq!(format_biguint(&v, Radix::Hex), "ff");
        assert_eq!(format_biguint(&v, Radix::Decimal), "255");
    }

    #[test]
    fn test_pow_mod_str() {
        assert_eq!(pow_mod_str("5", "6", "23", Radix::Decimal).unwrap(), n(8));
        assert_eq!(pow_mod_str("5", "f", "17", Radix::Hex).unwrap(), n(19));
    }
}
