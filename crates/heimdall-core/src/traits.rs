use crate::error::CoreResult;
use crate::field::FieldElement;
use crate::types::{EddsaSignature, SecretKey};

// ---------------------------------------------------------------------------
// FieldHasher: hash a sequence of field elements to one field element
//
// Commitment trees, revocation trees and the link-back binding all go through
// this seam. Presentations only verify inside the circuit when the hasher
// matches the one compiled into it (circomlib Poseidon).
// ---------------------------------------------------------------------------

pub trait FieldHasher: Send + Sync {
    fn hash(&self, inputs: &[FieldElement]) -> CoreResult<FieldElement>;
}

// ---------------------------------------------------------------------------
// ChallengeSigner: EdDSA-style signature over a single field element
//
// Used by holders to sign verifier challenges and by revocation authorities
// to sign registry roots. Signatures are checked inside the circuit, never
// here.
// ---------------------------------------------------------------------------

pub trait ChallengeSigner: Send + Sync {
    fn sign(&self, secret_key: &SecretKey, message: &FieldElement) -> CoreResult<EddsaSignature>;
}
