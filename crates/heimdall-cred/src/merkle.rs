//! Fixed-depth binary Merkle tree over credential attributes.
//!
//! Leaves are padded with `"0"` up to `2^depth`. Level 0 (`data`) holds
//! `H([encode(leaf)])`; inner nodes are `H([left, right])`. Proofs use the
//! circuit layout: `lemma = [data[i], sibling_0, .., sibling_{depth-1}, root]`
//! and `path[k]` is bit k of the leaf index.

use heimdall_core::{leaf_digest, AttributeValue, FieldElement, FieldHasher};
use serde::{Deserialize, Serialize};

use crate::error::{CredError, CredErrorDetail, CredResult};

pub const MAX_TREE_DEPTH: usize = 20;

/// Value used to pad unused leaves.
pub const PADDING_LEAF: &str = "0";

// ---------------------------------------------------------------------------
// MerkleTree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    depth: usize,
    leaves: Vec<AttributeValue>,
    /// levels[0] is the leaf data, levels[depth] is `[root]`.
    levels: Vec<Vec<FieldElement>>,
}

impl MerkleTree {
    /// Build a tree of the given depth. Deterministic for a given leaf
    /// sequence and hasher.
    pub fn build(
        hasher: &dyn FieldHasher,
        leaves: &[AttributeValue],
        depth: usize,
    ) -> CredResult<Self> {
        let capacity = capacity_for(depth)?;
        if leaves.len() > capacity {
            return Err(CredError::CapacityExceeded {
                leaves: leaves.len(),
                capacity,
            }
            .into());
        }

        let mut padded = leaves.to_vec();
        padded.resize(capacity, AttributeValue::from(PADDING_LEAF));

        let data = padded
            .iter()
            .map(|leaf| leaf_digest(hasher, leaf))
            .collect::<Result<Vec<_>, _>>()?;

        let mut levels = Vec::with_capacity(depth + 1);
        levels.push(data);
        for level in 0..depth {
            let next = levels[level]
                .chunks(2)
                .map(|pair| hasher.hash(&[pair[0], pair[1]]))
                .collect::<Result<Vec<_>, _>>()?;
            levels.push(next);
        }

        Ok(Self {
            depth,
            leaves: padded,
            levels,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaves(&self) -> &[AttributeValue] {
        &self.leaves
    }

    pub fn data(&self) -> &[FieldElement] {
        &self.levels[0]
    }

    pub fn root(&self) -> FieldElement {
        self.levels[self.depth][0]
    }

    pub fn leaf(&self, index: usize) -> CredResult<&AttributeValue> {
        self.leaves.get(index).ok_or_else(|| {
            CredError::IndexOutOfRange {
                index,
                len: self.leaves.len(),
            }
            .into()
        })
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn generate_proof(&self, index: usize) -> CredResult<MerkleProof> {
        self.check_index(index)?;

        let mut path = Vec::with_capacity(self.depth);
        let mut lemma = Vec::with_capacity(self.depth + 2);
        lemma.push(self.levels[0][index]);

        let mut idx = index;
        for level in 0..self.depth {
            path.push((idx & 1) as u8);
            lemma.push(self.levels[level][idx ^ 1]);
            idx >>= 1;
        }
        lemma.push(self.root());

        Ok(MerkleProof { path, lemma })
    }

    /// Replace one leaf and recompute its path to the root.
    ///
    /// All hashes are computed before anything is written, so a hashing
    /// failure leaves the tree untouched.
    pub fn update(
        &mut self,
        hasher: &dyn FieldHasher,
        index: usize,
        leaf: AttributeValue,
    ) -> CredResult<()> {
        self.check_index(index)?;

        let mut node = leaf_digest(hasher, &leaf)?;
        let mut path_values = Vec::with_capacity(self.depth + 1);
        path_values.push(node);

        let mut idx = index;
        for level in 0..self.depth {
            let sibling = self.levels[level][idx ^ 1];
            node = if idx & 1 == 1 {
                hasher.hash(&[sibling, node])?
            } else {
                hasher.hash(&[node, sibling])?
            };
            path_values.push(node);
            idx >>= 1;
        }

        self.leaves[index] = leaf;
        let mut idx = index;
        for (level, value) in path_values.into_iter().enumerate() {
            self.levels[level][idx] = value;
            idx >>= 1;
        }
        Ok(())
    }

    /// Check `proof` against an externally trusted root.
    pub fn verify_proof(
        hasher: &dyn FieldHasher,
        proof: &MerkleProof,
        root: &FieldElement,
    ) -> CredResult<bool> {
        Ok(proof.root() == Some(*root) && proof.verify(hasher)?)
    }

    pub fn to_persisted(&self) -> PersistedTree {
        PersistedTree {
            leaves: self.leaves.clone(),
            data: self.levels[0].clone(),
            root: self.root(),
        }
    }

    /// Rebuild a tree from its persisted form, rejecting snapshots whose data
    /// or root do not follow from the leaves.
    pub fn from_persisted(hasher: &dyn FieldHasher, persisted: &PersistedTree) -> CredResult<Self> {
        let len = persisted.leaves.len();
        if len < 2 || !len.is_power_of_two() {
            return Err(CredErrorDetail::new(
                CredError::InconsistentSnapshot("leaf count".into()),
                format!("{len} leaves is not a power of two"),
            ));
        }
        let depth = len.trailing_zeros() as usize;
        let tree = Self::build(hasher, &persisted.leaves, depth)?;

        if tree.data() != persisted.data.as_slice() {
            return Err(CredError::InconsistentSnapshot("data does not match leaves".into()).into());
        }
        if tree.root() != persisted.root {
            return Err(CredError::InconsistentSnapshot("root does not match leaves".into()).into());
        }
        Ok(tree)
    }

    fn check_index(&self, index: usize) -> CredResult<()> {
        if index >= self.leaves.len() {
            return Err(CredError::IndexOutOfRange {
                index,
                len: self.leaves.len(),
            }
            .into());
        }
        Ok(())
    }
}

fn capacity_for(depth: usize) -> CredResult<usize> {
    if depth == 0 || depth > MAX_TREE_DEPTH {
        return Err(CredError::InvalidDepth(depth).into());
    }
    Ok(1usize << depth)
}

// ---------------------------------------------------------------------------
// MerkleProof: {path, lemma} in circuit layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub path: Vec<u8>,
    pub lemma: Vec<FieldElement>,
}

impl MerkleProof {
    /// The proven leaf digest.
    pub fn leaf(&self) -> Option<FieldElement> {
        self.lemma.first().copied()
    }

    /// The root the proof claims.
    pub fn root(&self) -> Option<FieldElement> {
        self.lemma.last().copied()
    }

    pub fn siblings(&self) -> &[FieldElement] {
        if self.lemma.len() < 2 {
            return &[];
        }
        &self.lemma[1..self.lemma.len() - 1]
    }

    /// Leaf index encoded by the path bits.
    pub fn index(&self) -> usize {
        self.path
            .iter()
            .enumerate()
            .fold(0usize, |acc, (k, bit)| acc | (usize::from(*bit & 1) << k))
    }

    /// Replay the hash chain and compare against the claimed root.
    pub fn verify(&self, hasher: &dyn FieldHasher) -> CredResult<bool> {
        if self.lemma.len() != self.path.len() + 2 || self.path.iter().any(|b| *b > 1) {
            return Ok(false);
        }
        let (Some(mut node), Some(root)) = (self.leaf(), self.root()) else {
            return Ok(false);
        };
        for (bit, sibling) in self.path.iter().zip(self.siblings()) {
            node = if *bit == 1 {
                hasher.hash(&[*sibling, node])?
            } else {
                hasher.hash(&[node, *sibling])?
            };
        }
        Ok(node == root)
    }
}

/// External representation `{leaves, data, root}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTree {
    pub leaves: Vec<AttributeValue>,
    pub data: Vec<FieldElement>,
    pub root: FieldElement,
}
