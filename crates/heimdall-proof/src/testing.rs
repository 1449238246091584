//! In-process stand-ins for the proving backend and the EdDSA signer.
//!
//! [`SimulatedOracle`] evaluates the presentation circuit's relations
//! directly on the witness and emits public signals in the circuit layouts.
//! Its "proof" is a digest over the kind and the signals, so any edit to the
//! signals is caught by `verify`. It proves nothing about zero knowledge and
//! is only meant for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use heimdall_core::{
    ChallengeSigner, CoreResult, EddsaSignature, FieldElement, FieldHasher, SecretKey,
};
use heimdall_cred::{MerkleProof, MAX_LEAF_SIZE, META_SIZE};
use sha2::{Digest, Sha256};

use crate::error::{OracleError, OracleResult};
use crate::oracle::ProvingOracle;
use crate::types::{Groth16Proof, PresentationKind, ProofOutput};
use crate::witness::PresentationWitness;

pub const SIMULATED_PROTOCOL: &str = "simulated";

pub struct SimulatedOracle {
    hasher: Arc<dyn FieldHasher>,
    prove_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl SimulatedOracle {
    pub fn new(hasher: impl FieldHasher + 'static) -> Self {
        Self::with_shared(Arc::new(hasher))
    }

    pub fn with_shared(hasher: Arc<dyn FieldHasher>) -> Self {
        Self {
            hasher,
            prove_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub fn prove_calls(&self) -> usize {
        self.prove_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// The proof the simulated backend issues for `signals`.
    pub fn seal(kind: PresentationKind, signals: &[FieldElement]) -> Groth16Proof {
        let mut digest = Sha256::new();
        digest.update(kind.to_string().as_bytes());
        for signal in signals {
            digest.update(b"|");
            digest.update(signal.to_string().as_bytes());
        }
        Groth16Proof {
            pi_a: vec![FieldElement::from_be_bytes_reduced(&digest.finalize()).to_string()],
            pi_b: Vec::new(),
            pi_c: Vec::new(),
            protocol: SIMULATED_PROTOCOL.into(),
            curve: "bn128".into(),
        }
    }

    fn evaluate(
        &self,
        kind: PresentationKind,
        w: &PresentationWitness,
    ) -> OracleResult<Vec<FieldElement>> {
        let h = self.hasher.as_ref();
        let hash = |inputs: &[FieldElement]| {
            h.hash(inputs).map_err(|e| OracleError::Backend(e.to_string()))
        };
        let holds = |proof: &MerkleProof| {
            proof
                .verify(h)
                .map_err(|e| OracleError::Backend(e.to_string()))
        };

        require(w.meta.len() == META_SIZE, "meta length")?;
        require(w.disclosure_count() == kind.disclosure_count(), "disclosure count")?;

        let meta_proof = w.meta_proof();
        require(holds(&meta_proof)?, "meta inclusion")?;
        require(meta_proof.index() == 0, "meta slot")?;
        require(meta_proof.leaf() == Some(hash(&[w.meta[0]])?), "meta identifier")?;
        let credential_root = meta_proof.root();

        for proof in w.disclosure.proofs() {
            require(holds(&proof)?, "attribute inclusion")?;
            require(proof.root() == credential_root, "attribute commitment")?;
        }

        let expiration_limit = w.meta[5].to_u64().unwrap_or(u64::MAX);
        require(w.expiration <= expiration_limit, "expiration")?;

        let id = w
            .meta[0]
            .to_u64()
            .ok_or_else(|| OracleError::Backend("identifier out of range".into()))?;
        let revocation_proof = w.revocation_proof();
        require(holds(&revocation_proof)?, "revocation inclusion")?;
        require(
            revocation_proof.index() as u64 == id / MAX_LEAF_SIZE,
            "revocation position",
        )?;
        require(
            revocation_proof.leaf() == Some(hash(&[w.revocation_leaf])?),
            "revocation leaf",
        )?;
        let revocation_root = revocation_proof
            .root()
            .ok_or_else(|| OracleError::Backend("empty revocation lemma".into()))?;

        let layout = kind.layout();
        let mut signals = vec![FieldElement::zero(); layout.signal_count()];
        signals[layout.type_hash] = w.meta[1];
        signals[layout.revocation_root] = revocation_root;
        signals[layout.revocation_registry_hash] = w.meta[4];
        signals[layout.revoked] = if w.revocation_leaf.bit(id % MAX_LEAF_SIZE) {
            FieldElement::one()
        } else {
            FieldElement::zero()
        };
        signals[layout.link_back] = hash(&[w.challenge, w.issuer_pk[0], w.issuer_pk[1]])?;
        signals[layout.delegatable] = w.meta[6];
        signals[layout.challenge] = w.challenge;
        signals[layout.expiration] = FieldElement::from_u64(w.expiration);
        for (i, proof) in w.disclosure.proofs().iter().enumerate() {
            if let (Some(slot), Some(leaf)) = (layout.attribute_slot(i), proof.leaf()) {
                signals[slot] = leaf;
            }
        }
        Ok(signals)
    }
}

fn require(holds: bool, constraint: &str) -> OracleResult<()> {
    if holds {
        Ok(())
    } else {
        Err(OracleError::Backend(format!(
            "constraint not satisfied: {constraint}"
        )))
    }
}

#[async_trait]
impl ProvingOracle for SimulatedOracle {
    async fn prove(
        &self,
        kind: PresentationKind,
        witness: &PresentationWitness,
    ) -> OracleResult<ProofOutput> {
        self.prove_calls.fetch_add(1, Ordering::SeqCst);
        let public_signals = self.evaluate(kind, witness)?;
        Ok(ProofOutput {
            proof: Self::seal(kind, &public_signals),
            public_signals,
        })
    }

    async fn verify(
        &self,
        kind: PresentationKind,
        public_signals: &[FieldElement],
        proof: &Groth16Proof,
    ) -> OracleResult<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*proof == Self::seal(kind, public_signals))
    }
}

/// Deterministic `{R8, S}` derived from the key and message with SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicSigner;

impl ChallengeSigner for DeterministicSigner {
    fn sign(&self, secret_key: &SecretKey, message: &FieldElement) -> CoreResult<EddsaSignature> {
        let part = |label: &[u8]| {
            let mut digest = Sha256::new();
            digest.update(label);
            digest.update(secret_key.expose().as_bytes());
            digest.update(message.to_string().as_bytes());
            FieldElement::from_be_bytes_reduced(&digest.finalize())
        };
        Ok(EddsaSignature {
            r8: [part(b"R8x"), part(b"R8y")],
            s: part(b"S"),
        })
    }
}
