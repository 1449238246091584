//! Private circuit inputs.
//!
//! A witness is owned by exactly one presentation, is handed to the oracle by
//! reference and is zeroized on drop. It implements `Serialize` only so the
//! oracle can feed it to a prover; presentations never write it out and its
//! `Debug` output is redacted.

use heimdall_core::FieldElement;
use heimdall_cred::MerkleProof;
use serde::Serialize;
use std::fmt;
use zeroize::Zeroize;

/// Field names follow the circuit input names.
#[derive(Serialize, Zeroize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationWitness {
    pub(crate) path_meta: Vec<u8>,
    pub(crate) lemma_meta: Vec<FieldElement>,
    pub(crate) meta: Vec<FieldElement>,
    pub(crate) expiration: u64,
    pub(crate) signature_meta: [FieldElement; 3],
    #[serde(rename = "issuerPK")]
    pub(crate) issuer_pk: [FieldElement; 2],
    pub(crate) path_revocation: Vec<u8>,
    pub(crate) lemma_revocation: Vec<FieldElement>,
    pub(crate) revocation_leaf: FieldElement,
    pub(crate) challenge: FieldElement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sign_challenge: Option<[FieldElement; 3]>,
    #[serde(flatten)]
    pub(crate) disclosure: DisclosureWitness,
}

impl PresentationWitness {
    pub fn disclosure_count(&self) -> usize {
        self.disclosure.count()
    }

    pub(crate) fn meta_proof(&self) -> MerkleProof {
        MerkleProof {
            path: self.path_meta.clone(),
            lemma: self.lemma_meta.clone(),
        }
    }

    pub(crate) fn revocation_proof(&self) -> MerkleProof {
        MerkleProof {
            path: self.path_revocation.clone(),
            lemma: self.lemma_revocation.clone(),
        }
    }
}

impl Drop for PresentationWitness {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for PresentationWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PresentationWitness([REDACTED], disclosures={})",
            self.disclosure_count()
        )
    }
}

/// Inclusion proofs for the disclosed attributes, shaped per variant:
/// `lemma: [..], path: [..]` for one attribute, nested lists for several.
#[derive(Serialize)]
#[serde(untagged)]
pub enum DisclosureWitness {
    Single {
        lemma: Vec<FieldElement>,
        path: Vec<u8>,
    },
    Multiple {
        lemma: Vec<Vec<FieldElement>>,
        path: Vec<Vec<u8>>,
    },
}

impl DisclosureWitness {
    pub(crate) fn single(proof: MerkleProof) -> Self {
        DisclosureWitness::Single {
            lemma: proof.lemma,
            path: proof.path,
        }
    }

    pub(crate) fn multiple(proofs: Vec<MerkleProof>) -> Self {
        let (lemma, path) = proofs.into_iter().map(|p| (p.lemma, p.path)).unzip();
        DisclosureWitness::Multiple { lemma, path }
    }

    pub fn count(&self) -> usize {
        match self {
            DisclosureWitness::Single { .. } => 1,
            DisclosureWitness::Multiple { lemma, .. } => lemma.len(),
        }
    }

    pub(crate) fn proofs(&self) -> Vec<MerkleProof> {
        match self {
            DisclosureWitness::Single { lemma, path } => vec![MerkleProof {
                path: path.clone(),
                lemma: lemma.clone(),
            }],
            DisclosureWitness::Multiple { lemma, path } => lemma
                .iter()
                .zip(path)
                .map(|(lemma, path)| MerkleProof {
                    path: path.clone(),
                    lemma: lemma.clone(),
                })
                .collect(),
        }
    }
}

impl Zeroize for DisclosureWitness {
    fn zeroize(&mut self) {
        match self {
            DisclosureWitness::Single { lemma, path } => {
                lemma.zeroize();
                path.zeroize();
            }
            DisclosureWitness::Multiple { lemma, path } => {
                lemma.iter_mut().for_each(Zeroize::zeroize);
                path.iter_mut().for_each(Zeroize::zeroize);
                lemma.clear();
                path.clear();
            }
        }
    }
}
