use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, CoreResult};
use crate::field::{is_decimal, FieldElement};

// ---------------------------------------------------------------------------
// AttributeValue: a credential attribute as the issuer wrote it
// ---------------------------------------------------------------------------

/// A plaintext credential attribute.
///
/// Stored as text; JSON integers are accepted on input and kept in their
/// decimal form. How the value enters the field is decided by [`encode`].
///
/// [`encode`]: AttributeValue::encode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AttributeValue(String);

impl AttributeValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric attributes are committed raw rather than content-hashed.
    pub fn is_numeric(&self) -> bool {
        is_decimal(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field encoding: decimal strings raw (reduced), the empty string as zero,
    /// anything else as SHA-256 of its UTF-8 bytes reduced into the field.
    pub fn encode(&self) -> FieldElement {
        if self.0.is_empty() {
            return FieldElement::zero();
        }
        if self.is_numeric() {
            if let Some(value) = num_bigint::BigUint::parse_bytes(self.0.as_bytes(), 10) {
                return FieldElement::from_biguint_reduced(&value);
            }
        }
        FieldElement::from_be_bytes_reduced(&Sha256::digest(self.0.as_bytes()))
    }

    /// The value as an unsigned integer, if it is numeric and fits.
    pub fn as_u64(&self) -> Option<u64> {
        if self.is_numeric() {
            self.0.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        Self(v.to_string())
    }
}

impl From<FieldElement> for AttributeValue {
    fn from(v: FieldElement) -> Self {
        Self(v.to_string())
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttributeVisitor;

        impl<'de> de::Visitor<'de> for AttributeVisitor {
            type Value = AttributeValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer attribute")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<AttributeValue, E> {
                Ok(AttributeValue::from(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<AttributeValue, E> {
                Ok(AttributeValue(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<AttributeValue, E> {
                Ok(AttributeValue::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<AttributeValue, E> {
                Ok(AttributeValue(v.to_string()))
            }
        }

        deserializer.deserialize_any(AttributeVisitor)
    }
}

// ---------------------------------------------------------------------------
// EddsaSignature: {R8, S} over the Baby Jubjub curve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EddsaSignature {
    #[serde(rename = "R8")]
    pub r8: [FieldElement; 2],
    #[serde(rename = "S")]
    pub s: FieldElement,
}

impl EddsaSignature {
    /// The `[R8.x, R8.y, S]` triple the circuits take as a signature input.
    pub fn to_signal_triple(&self) -> [FieldElement; 3] {
        [self.r8[0], self.r8[1], self.s]
    }
}

// ---------------------------------------------------------------------------
// SecretKey: holder or authority signing key, opaque to this crate
// ---------------------------------------------------------------------------

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> CoreResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CoreError::InvalidSecretKey("empty key".into()));
        }
        Ok(Self(key))
    }

    /// Key files hold the key on their first line; the rest is ignored.
    pub fn from_file_contents(contents: &str) -> CoreResult<Self> {
        let line = contents.lines().next().unwrap_or_default().trim();
        Self::new(line)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short non-secret identifier for log lines.
    pub fn fingerprint(&self) -> String {
        hex::encode(&Sha256::digest(self.0.as_bytes())[..4])
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED], fingerprint={})", self.fingerprint())
    }
}

// ---------------------------------------------------------------------------
// Millisecond timestamps, the unit of credential and presentation expiry
// ---------------------------------------------------------------------------

pub const MILLIS_PER_DAY: u64 = 86_400_000;

pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Expiration `days` from now, in milliseconds since the epoch.
pub fn expiration_in_days(days: u32) -> u64 {
    now_millis().saturating_add(u64::from(days) * MILLIS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_attribute_encodes_raw() {
        assert_eq!(
            AttributeValue::from("1234502").encode(),
            FieldElement::from_u64(1234502)
        );
        assert_eq!(AttributeValue::from(7u64).encode(), FieldElement::from_u64(7));
    }

    #[test]
    fn test_empty_attribute_encodes_zero() {
        assert!(AttributeValue::from("").encode().is_zero());
    }

    #[test]
    fn test_string_attribute_is_content_hashed() {
        let a = AttributeValue::from("Alice").encode();
        let b = AttributeValue::from("Alicf").encode();
        assert_ne!(a, b);
        assert_eq!(a, AttributeValue::from("Alice").encode());
        // Leading sign makes it non-numeric
        assert!(!AttributeValue::from("-12").is_numeric());
    }

    #[test]
    fn test_attribute_accepts_json_integers() {
        let values: Vec<AttributeValue> = serde_json::from_str(r#"["a", 12, "13"]"#).unwrap();
        assert_eq!(values[1].as_str(), "12");
        assert_eq!(values[1].as_u64(), Some(12));
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"["a","12","13"]"#);
    }

    #[test]
    fn test_signature_wire_names() {
        let sig = EddsaSignature {
            r8: [FieldElement::from_u64(1), FieldElement::from_u64(2)],
            s: FieldElement::from_u64(3),
        };
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["R8"][1], "2");
        assert_eq!(json["S"], "3");
        assert_eq!(
            sig.to_signal_triple(),
            [
                FieldElement::from_u64(1),
                FieldElement::from_u64(2),
                FieldElement::from_u64(3)
            ]
        );
    }

    #[test]
    fn test_secret_key_first_line_and_redaction() {
        let key = SecretKey::from_file_contents("deadbeef\nsecond line\n").unwrap();
        assert_eq!(key.expose(), "deadbeef");
        let debug = format!("{key:?}");
        assert!(!debug.contains("deadbeef"));
        assert!(debug.contains("REDACTED"));
        assert!(SecretKey::from_file_contents("\n").is_err());
    }

    #[test]
    fn test_expiration_in_days() {
        let before = now_millis();
        let exp = expiration_in_days(2);
        assert!(exp >= before + 2 * MILLIS_PER_DAY);
    }
}
