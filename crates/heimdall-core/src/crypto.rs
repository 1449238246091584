use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher as _};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};
use crate::field::FieldElement;
use crate::traits::FieldHasher;
use crate::types::AttributeValue;

/// Largest input arity the circom Poseidon parameters cover.
pub const POSEIDON_MAX_INPUTS: usize = 12;

/// circomlib-compatible Poseidon over BN254, the hash compiled into the
/// presentation circuits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonHasher;

impl FieldHasher for PoseidonHasher {
    fn hash(&self, inputs: &[FieldElement]) -> CoreResult<FieldElement> {
        if inputs.is_empty() || inputs.len() > POSEIDON_MAX_INPUTS {
            return Err(CoreError::Hash(format!(
                "poseidon takes 1..={POSEIDON_MAX_INPUTS} inputs, got {}",
                inputs.len()
            )));
        }
        let mut poseidon = Poseidon::<Fr>::new_circom(inputs.len())
            .map_err(|e| CoreError::Hash(e.to_string()))?;
        let frs: Vec<Fr> = inputs.iter().map(|x| *x.as_fr()).collect();
        let out = poseidon
            .hash(&frs)
            .map_err(|e| CoreError::Hash(e.to_string()))?;
        Ok(FieldElement::from_fr(out))
    }
}

/// SHA-256 over the 32-byte big-endian encodings of the inputs, reduced into
/// the field. Not circuit-compatible; useful where no proof is produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256FieldHasher;

impl FieldHasher for Sha256FieldHasher {
    fn hash(&self, inputs: &[FieldElement]) -> CoreResult<FieldElement> {
        let mut hasher = Sha256::new();
        hasher.update((inputs.len() as u32).to_be_bytes());
        for input in inputs {
            let bytes = input.as_fr().into_bigint().to_bytes_be();
            let mut padded = [0u8; 32];
            padded[32 - bytes.len()..].copy_from_slice(&bytes);
            hasher.update(padded);
        }
        Ok(FieldElement::from_be_bytes_reduced(&hasher.finalize()))
    }
}

/// The tree representation of an attribute: `H([encode(value)])`.
pub fn leaf_digest(hasher: &dyn FieldHasher, value: &AttributeValue) -> CoreResult<FieldElement> {
    hasher.hash(&[value.encode()])
}
