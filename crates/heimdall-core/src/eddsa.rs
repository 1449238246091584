//! EdDSA over Baby Jubjub with a Poseidon message hash, as circomlib's
//! `signPoseidon`. This is the signature the presentation circuits check for
//! holder challenges and registry roots.
//!
//! circomlib takes the private key as raw bytes and hashes them with
//! blake512. Keys here are 32 bytes: either a 32-byte UTF-8 string, used
//! as is, or `0x` followed by 64 hex digits.

use babyjubjub_rs::{Fr as CurveFr, PrivateKey};
use ff_ce::{PrimeField, PrimeFieldRepr};
use num_bigint::{BigInt, BigUint};

use crate::error::{CoreError, CoreResult};
use crate::field::FieldElement;
use crate::traits::ChallengeSigner;
use crate::types::{EddsaSignature, SecretKey};

pub const SECRET_KEY_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct BabyJubjubSigner;

impl BabyJubjubSigner {
    /// Public key `[x, y]` of `secret_key`.
    pub fn public_key(&self, secret_key: &SecretKey) -> CoreResult<[FieldElement; 2]> {
        let point = private_key(secret_key)?.public();
        Ok([curve_to_field(&point.x)?, curve_to_field(&point.y)?])
    }
}

impl ChallengeSigner for BabyJubjubSigner {
    fn sign(&self, secret_key: &SecretKey, message: &FieldElement) -> CoreResult<EddsaSignature> {
        let key = private_key(secret_key)?;
        let signature = key
            .sign(BigInt::from(message.to_biguint()))
            .map_err(CoreError::Signing)?;

        let s = signature
            .s
            .to_biguint()
            .ok_or_else(|| CoreError::Signing("negative signature scalar".into()))?;
        Ok(EddsaSignature {
            r8: [
                curve_to_field(&signature.r_b8.x)?,
                curve_to_field(&signature.r_b8.y)?,
            ],
            s: FieldElement::from_biguint(&s)?,
        })
    }
}

fn private_key(secret_key: &SecretKey) -> CoreResult<PrivateKey> {
    let raw = secret_key.expose();
    let bytes = match raw.strip_prefix("0x") {
        Some(digits) => hex::decode(digits)
            .map_err(|e| CoreError::InvalidSecretKey(format!("bad hex: {e}")))?,
        None => raw.as_bytes().to_vec(),
    };
    if bytes.len() != SECRET_KEY_BYTES {
        return Err(CoreError::InvalidSecretKey(format!(
            "expected {SECRET_KEY_BYTES} bytes, got {}",
            bytes.len()
        )));
    }
    PrivateKey::import(bytes).map_err(CoreError::InvalidSecretKey)
}

/// The curve's base field is the BN254 scalar field, so coordinates map
/// one to one.
fn curve_to_field(value: &CurveFr) -> CoreResult<FieldElement> {
    let mut bytes = Vec::with_capacity(32);
    value
        .into_repr()
        .write_le(&mut bytes)
        .map_err(|e| CoreError::Signing(e.to_string()))?;
    FieldElement::from_biguint(&BigUint::from_bytes_le(&bytes))
}
