//! Revocation registry: a Merkle tree whose leaves pack revocation bits.
//!
//! Each leaf covers a block of [`MAX_LEAF_SIZE`] consecutive credential
//! identifiers. Credential `id` lives in block `id / MAX_LEAF_SIZE` at bit
//! `id % MAX_LEAF_SIZE`. Only the registry authority mutates the tree, through
//! `&mut self`; readers take immutable snapshots from a [`RevocationPublisher`].

use std::sync::{Arc, RwLock};

use heimdall_core::{
    AttributeValue, ChallengeSigner, EddsaSignature, FieldElement, FieldHasher, SecretKey,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::merkle::{MerkleProof, MerkleTree, PersistedTree};

/// Credential identifiers packed into one leaf.
pub const MAX_LEAF_SIZE: u64 = 252;

/// Depth of the revocation tree compiled into the circuits (8192 blocks).
pub const REVOCATION_TREE_DEPTH: usize = 13;

/// Key material allowed to sign registry roots.
pub struct RevocationAuthority<'a> {
    pub secret_key: &'a SecretKey,
    pub signer: &'a dyn ChallengeSigner,
}

/// Result of a registry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationUpdate {
    pub position: usize,
    pub bit: u64,
    pub root: FieldElement,
    /// False when the credential was already revoked.
    pub changed: bool,
}

// ---------------------------------------------------------------------------
// RevocationRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRegistry {
    tree: MerkleTree,
    signature: Option<EddsaSignature>,
}

impl RevocationRegistry {
    /// An empty registry: every block zero.
    pub fn new(hasher: &dyn FieldHasher, depth: usize) -> CredResult<Self> {
        let tree = MerkleTree::build(hasher, &[], depth)?;
        info!(depth, root = %tree.root(), "revocation registry created");
        Ok(Self {
            tree,
            signature: None,
        })
    }

    pub fn from_persisted(
        hasher: &dyn FieldHasher,
        persisted: &PersistedRegistry,
    ) -> CredResult<Self> {
        let tree = MerkleTree::from_persisted(hasher, &persisted.tree)?;
        for leaf in tree.leaves() {
            if !leaf.is_numeric() {
                return Err(CredError::InconsistentSnapshot(format!(
                    "non-numeric revocation leaf {leaf:?}"
                ))
                .into());
            }
        }
        Ok(Self {
            tree,
            signature: persisted.signature.clone(),
        })
    }

    pub fn to_persisted(&self) -> PersistedRegistry {
        PersistedRegistry {
            tree: self.tree.to_persisted(),
            signature: self.signature.clone(),
        }
    }

    pub fn root(&self) -> FieldElement {
        self.tree.root()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub fn signature(&self) -> Option<&EddsaSignature> {
        self.signature.as_ref()
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Largest credential identifier this registry can track, plus one.
    pub fn id_capacity(&self) -> u64 {
        self.tree.capacity() as u64 * MAX_LEAF_SIZE
    }

    /// Block index `floor(id / MAX_LEAF_SIZE)`.
    pub fn position(id: u64) -> u64 {
        id / MAX_LEAF_SIZE
    }

    /// Packed value of the block holding `id`.
    pub fn leaf(&self, id: u64) -> CredResult<FieldElement> {
        let position = self.checked_position(id)?;
        let leaf = self.tree.leaf(position)?;
        Ok(leaf.encode())
    }

    pub fn proof(&self, id: u64) -> CredResult<MerkleProof> {
        let position = self.checked_position(id)?;
        self.tree.generate_proof(position)
    }

    pub fn is_revoked(&self, id: u64) -> CredResult<bool> {
        Ok(self.leaf(id)?.bit(id % MAX_LEAF_SIZE))
    }

    /// Revoke credential `id`.
    ///
    /// Sets one bit in one leaf and recomputes that leaf's path. With an
    /// authority the new root is signed; without one any previous signature
    /// is dropped since it no longer covers the root.
    pub fn update(
        &mut self,
        hasher: &dyn FieldHasher,
        id: u64,
        authority: Option<&RevocationAuthority<'_>>,
    ) -> CredResult<RevocationUpdate> {
        let position = self.checked_position(id)?;
        let bit = id % MAX_LEAF_SIZE;
        let current = self.tree.leaf(position)?.encode();

        if current.bit(bit) {
            debug!(id, position, "credential already revoked");
            return Ok(RevocationUpdate {
                position,
                bit,
                root: self.root(),
                changed: false,
            });
        }

        let next = current
            .with_bit(bit)
            .map_err(|e| CredErrorDetail::from(e).with_credential_id(id))?;

        // The live tree is only replaced once signing has succeeded
        let mut staged = self.tree.clone();
        staged.update(hasher, position, AttributeValue::from(next))?;
        let signature = match authority {
            Some(auth) => Some(auth.signer.sign(auth.secret_key, &staged.root())?),
            None => None,
        };

        self.tree = staged;
        self.signature = signature;

        info!(
            id,
            position,
            bit,
            root = %self.root(),
            signed = self.signature.is_some(),
            "credential revoked"
        );
        Ok(RevocationUpdate {
            position,
            bit,
            root: self.root(),
            changed: true,
        })
    }

    fn checked_position(&self, id: u64) -> CredResult<usize> {
        let position = Self::position(id);
        if position >= self.tree.capacity() as u64 {
            return Err(CredErrorDetail::new(
                CredError::OutsideRegistry,
                format!("block {position} of {}", self.tree.capacity()),
            )
            .with_credential_id(id));
        }
        Ok(position as usize)
    }
}

/// External representation `{tree: {leaves, data, root}, signature?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRegistry {
    pub tree: PersistedTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<EddsaSignature>,
}

// ---------------------------------------------------------------------------
// RevocationPublisher: whole-snapshot swap for readers
// ---------------------------------------------------------------------------

/// Holds the latest published registry snapshot. Readers clone an `Arc` and
/// never see a leaf without its recomputed root.
#[derive(Debug)]
pub struct RevocationPublisher {
    current: RwLock<Arc<PersistedRegistry>>,
}

impl RevocationPublisher {
    pub fn new(registry: &RevocationRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry.to_persisted())),
        }
    }

    pub fn publish(&self, registry: &RevocationRegistry) {
        let snapshot = Arc::new(registry.to_persisted());
        let root = snapshot.tree.root;
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
        debug!(root = %root, "revocation snapshot published");
    }

    pub fn latest(&self) -> Arc<PersistedRegistry> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn root(&self) -> FieldElement {
        self.latest().tree.root
    }
}
