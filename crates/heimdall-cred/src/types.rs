use heimdall_core::{AttributeValue, EddsaSignature, FieldElement, FieldHasher};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::merkle::MerkleTree;

/// Number of positional meta attributes at the front of every credential.
pub const META_SIZE: usize = 8;

/// Depth of the attribute commitment tree compiled into the circuits.
pub const CREDENTIAL_TREE_DEPTH: usize = 4;

// ---------------------------------------------------------------------------
// MetaField: positional meta attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaField {
    Identifier,
    Type,
    HolderKeyX,
    HolderKeyY,
    RevocationRegistry,
    Expiration,
    Delegatable,
    Reserved,
}

impl MetaField {
    pub const ALL: [MetaField; META_SIZE] = [
        MetaField::Identifier,
        MetaField::Type,
        MetaField::HolderKeyX,
        MetaField::HolderKeyY,
        MetaField::RevocationRegistry,
        MetaField::Expiration,
        MetaField::Delegatable,
        MetaField::Reserved,
    ];

    pub fn index(self) -> usize {
        match self {
            MetaField::Identifier => 0,
            MetaField::Type => 1,
            MetaField::HolderKeyX => 2,
            MetaField::HolderKeyY => 3,
            MetaField::RevocationRegistry => 4,
            MetaField::Expiration => 5,
            MetaField::Delegatable => 6,
            MetaField::Reserved => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MetaField::Identifier => "id",
            MetaField::Type => "type",
            MetaField::HolderKeyX => "holderPK.x",
            MetaField::HolderKeyY => "holderPK.y",
            MetaField::RevocationRegistry => "revocationRegistry",
            MetaField::Expiration => "expiration",
            MetaField::Delegatable => "delegatable",
            MetaField::Reserved => "reserved",
        }
    }
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Credential: issuer-signed ordered attributes
// ---------------------------------------------------------------------------

/// Issuer signature over the commitment root, with the issuer public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerSignature {
    #[serde(rename = "R8")]
    pub r8: [FieldElement; 2],
    #[serde(rename = "S")]
    pub s: FieldElement,
    pub pk: [FieldElement; 2],
}

impl IssuerSignature {
    pub fn signature(&self) -> EddsaSignature {
        EddsaSignature {
            r8: self.r8,
            s: self.s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub attributes: Vec<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<FieldElement>,
    pub signature: IssuerSignature,
}

impl Credential {
    /// Structural checks a presentation relies on.
    pub fn validate(&self) -> CredResult<()> {
        if self.attributes.len() < META_SIZE {
            return Err(CredErrorDetail::new(
                CredError::MalformedCredential("missing meta attributes".into()),
                format!(
                    "{} attributes, at least {META_SIZE} required",
                    self.attributes.len()
                ),
            ));
        }
        let capacity = 1usize << CREDENTIAL_TREE_DEPTH;
        if self.attributes.len() > capacity {
            return Err(CredError::CapacityExceeded {
                leaves: self.attributes.len(),
                capacity,
            }
            .into());
        }
        self.identifier()?;
        self.expiration()?;
        Ok(())
    }

    pub fn meta(&self, field: MetaField) -> CredResult<&AttributeValue> {
        self.attributes.get(field.index()).ok_or_else(|| {
            CredErrorDetail::new(
                CredError::MalformedCredential(format!("missing meta attribute {field}")),
                format!("credential has {} attributes", self.attributes.len()),
            )
        })
    }

    pub fn identifier(&self) -> CredResult<u64> {
        self.meta(MetaField::Identifier)?
            .as_u64()
            .ok_or_else(|| CredError::NonNumericMeta("id").into())
    }

    /// Expiration in milliseconds since the epoch.
    pub fn expiration(&self) -> CredResult<u64> {
        self.meta(MetaField::Expiration)?
            .as_u64()
            .ok_or_else(|| CredError::NonNumericMeta("expiration").into())
    }

    pub fn credential_type(&self) -> CredResult<&AttributeValue> {
        self.meta(MetaField::Type)
    }

    pub fn revocation_registry(&self) -> CredResult<&AttributeValue> {
        self.meta(MetaField::RevocationRegistry)
    }

    /// Attributes after the meta prefix.
    pub fn disclosable(&self) -> &[AttributeValue] {
        self.attributes.get(META_SIZE..).unwrap_or_default()
    }

    /// First index holding `value`, meta prefix included.
    pub fn position_of(&self, value: &AttributeValue) -> Option<usize> {
        self.attributes.iter().position(|a| a == value)
    }

    pub fn commitment_tree(&self, hasher: &dyn FieldHasher) -> CredResult<MerkleTree> {
        MerkleTree::build(hasher, &self.attributes, CREDENTIAL_TREE_DEPTH)
    }

    /// Whether the stored root, if any, matches the attributes.
    pub fn verify_commitment(&self, hasher: &dyn FieldHasher) -> CredResult<bool> {
        match self.root {
            Some(root) => Ok(self.commitment_tree(hasher)?.root() == root),
            None => Ok(true),
        }
    }
}
