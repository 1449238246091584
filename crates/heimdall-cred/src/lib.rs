//! Heimdall credential layer.
//!
//! Holds the credential model (a meta prefix of positional attributes followed
//! by disclosable ones), the fixed-depth Merkle tree used both for attribute
//! commitments and for revocation, and the revocation registry with its
//! snapshot publisher.

pub mod error;
pub mod merkle;
pub mod revocation;
pub mod types;

pub use error::{CredError, CredErrorDetail, CredResult};
pub use merkle::{MerkleProof, MerkleTree, PersistedTree, MAX_TREE_DEPTH, PADDING_LEAF};
pub use revocation::{
    PersistedRegistry, RevocationAuthority, RevocationPublisher, RevocationRegistry,
    RevocationUpdate, MAX_LEAF_SIZE, REVOCATION_TREE_DEPTH,
};
pub use types::*;
