use ark_bn254::Fr;
use ark_ff::{BigInteger, One, PrimeField, Zero};
use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

use crate::error::{CoreError, CoreResult};

/// Highest bit index that can be set without the value wrapping the field order.
pub const MAX_SETTABLE_BIT: u64 = 252;

// ---------------------------------------------------------------------------
// FieldElement: BN254 scalar, decimal on the wire
// ---------------------------------------------------------------------------

/// An element of the BN254 scalar field, the native value type of the
/// presentation circuits.
///
/// Serialized as a canonical decimal string. Deserialization also accepts
/// non-negative JSON integers, which older registry and credential documents
/// contain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(Fr);

impl FieldElement {
    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    pub fn one() -> Self {
        Self(Fr::one())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    pub fn from_fr(value: Fr) -> Self {
        Self(value)
    }

    pub fn as_fr(&self) -> &Fr {
        &self.0
    }

    /// The field order as an unsigned integer.
    pub fn modulus() -> BigUint {
        BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be())
    }

    /// Convert an integer that must already be canonical (below the modulus).
    pub fn from_biguint(value: &BigUint) -> CoreResult<Self> {
        if *value >= Self::modulus() {
            return Err(CoreError::InvalidFieldElement(format!(
                "{value} is not below the field order"
            )));
        }
        Ok(Self(Fr::from_be_bytes_mod_order(&value.to_bytes_be())))
    }

    /// Convert an arbitrary integer, reducing it modulo the field order.
    pub fn from_biguint_reduced(value: &BigUint) -> Self {
        Self(Fr::from_be_bytes_mod_order(&value.to_bytes_be()))
    }

    /// Interpret big-endian bytes as an integer reduced modulo the field order.
    pub fn from_be_bytes_reduced(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0.into_bigint().to_bytes_be())
    }

    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(&self.to_biguint()).ok()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    /// Whether bit `index` of the canonical integer representation is set.
    pub fn bit(&self, index: u64) -> bool {
        self.to_biguint().bit(index)
    }

    /// Return a copy with bit `index` set.
    pub fn with_bit(&self, index: u64) -> CoreResult<Self> {
        if index > MAX_SETTABLE_BIT {
            return Err(CoreError::InvalidFieldElement(format!(
                "bit {index} exceeds the packable range 0..={MAX_SETTABLE_BIT}"
            )));
        }
        let mut value = self.to_biguint();
        value.set_bit(index, true);
        Self::from_biguint(&value)
    }

    /// A uniformly distributed element from the OS RNG.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 64];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let value = Self::from_be_bytes_reduced(&bytes);
        bytes.zeroize();
        value
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_biguint())
    }
}

impl FromStr for FieldElement {
    type Err = CoreError;

    /// Strict parse: ASCII digits only, canonical (below the field order).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_decimal(s) {
            return Err(CoreError::InvalidFieldElement(format!(
                "expected a decimal integer, got {s:?}"
            )));
        }
        let value = BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| CoreError::InvalidFieldElement(s.to_string()))?;
        Self::from_biguint(&value)
    }
}

impl Zeroize for FieldElement {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// True for non-empty strings made only of ASCII digits.
pub fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldVisitor;

        impl<'de> de::Visitor<'de> for FieldVisitor {
            type Value = FieldElement;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or non-negative integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldElement, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldElement, E> {
                Ok(FieldElement::from_u64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldElement, E> {
                u64::try_from(v)
                    .map(FieldElement::from_u64)
                    .map_err(|_| E::custom(format!("negative field element {v}")))
            }
        }

        deserializer.deserialize_any(FieldVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BN254_ORDER: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn test_modulus_is_bn254_scalar_order() {
        assert_eq!(FieldElement::modulus().to_string(), BN254_ORDER);
    }

    #[test]
    fn test_decimal_round_trip() {
        let s = "15093063772197360439942670764347374738539884999170539844715519374005555450641";
        let fe: FieldElement = s.parse().unwrap();
        assert_eq!(fe.to_string(), s);
    }

    #[test]
    fn test_rejects_non_canonical_and_non_decimal() {
        assert!(BN254_ORDER.parse::<FieldElement>().is_err());
        assert!("".parse::<FieldElement>().is_err());
        assert!("-1".parse::<FieldElement>().is_err());
        assert!("12a".parse::<FieldElement>().is_err());
        assert!(" 12".parse::<FieldElement>().is_err());
    }

    #[test]
    fn test_reduced_conversion_wraps() {
        let wrapped = FieldElement::modulus() + BigUint::from(5u32);
        assert_eq!(
            FieldElement::from_biguint_reduced(&wrapped),
            FieldElement::from_u64(5)
        );
    }

    #[test]
    fn test_serde_string_and_integer() {
        let fe = FieldElement::from_u64(1234);
        assert_eq!(serde_json::to_string(&fe).unwrap(), "\"1234\"");
        let from_str: FieldElement = serde_json::from_str("\"1234\"").unwrap();
        let from_int: FieldElement = serde_json::from_str("1234").unwrap();
        assert_eq!(from_str, fe);
        assert_eq!(from_int, fe);
        assert!(serde_json::from_str::<FieldElement>("-4").is_err());
    }

    #[test]
    fn test_bits() {
        let fe = FieldElement::zero().with_bit(2).unwrap().with_bit(252).unwrap();
        assert!(fe.bit(2));
        assert!(fe.bit(252));
        assert!(!fe.bit(3));
        assert!(fe.with_bit(253).is_err());
        assert_eq!(FieldElement::zero().with_bit(4).unwrap().to_u64(), Some(16));
    }

    #[test]
    fn test_random_elements_differ() {
        assert_ne!(FieldElement::random(), FieldElement::random());
    }

    #[test]
    fn test_zeroize_clears_value() {
        let mut fe = FieldElement::from_u64(99);
        fe.zeroize();
        assert!(fe.is_zero());
    }
}
