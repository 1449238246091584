use heimdall_core::{AttributeValue, FieldElement};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest disclosure count with a compiled circuit.
pub const MAX_DISCLOSURES: usize = 4;

// ---------------------------------------------------------------------------
// PresentationKind: closed set of presentation variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationKind {
    /// One disclosed attribute.
    Attribute,
    /// `count` disclosed attributes, in request order.
    MultiAttribute { count: usize },
}

impl PresentationKind {
    pub const ATTRIBUTE_TAG: &'static str = "attribute";
    pub const MULTI_ATTRIBUTE_TAG: &'static str = "mult-attribute";

    /// The persisted `type` tag.
    pub fn type_tag(&self) -> &'static str {
        match self {
            PresentationKind::Attribute => Self::ATTRIBUTE_TAG,
            PresentationKind::MultiAttribute { .. } => Self::MULTI_ATTRIBUTE_TAG,
        }
    }

    pub fn disclosure_count(&self) -> usize {
        match self {
            PresentationKind::Attribute => 1,
            PresentationKind::MultiAttribute { count } => *count,
        }
    }

    /// Public-signal positions for this kind's circuit.
    pub fn layout(&self) -> SignalLayout {
        match self {
            PresentationKind::Attribute => SignalLayout::ATTRIBUTE,
            PresentationKind::MultiAttribute { count } => SignalLayout::multi_attribute(*count),
        }
    }
}

impl fmt::Display for PresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationKind::Attribute => write!(f, "attribute"),
            PresentationKind::MultiAttribute { count } => write!(f, "mult-attribute({count})"),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalLayout: positional public-signal contract of one circuit
//
// The two circuit families order challenge/expiration differently relative
// to the attribute hashes. Each layout is its own contract; changing either
// breaks compatibility with the compiled circuits.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalLayout {
    pub type_hash: usize,
    pub revocation_root: usize,
    pub revocation_registry_hash: usize,
    pub revoked: usize,
    pub link_back: usize,
    pub delegatable: usize,
    pub challenge: usize,
    pub expiration: usize,
    pub attribute_start: usize,
    pub attribute_count: usize,
}

impl SignalLayout {
    /// `[type, revRoot, regHash, revoked, linkBack, delegatable, attr, challenge, expiration]`
    pub const ATTRIBUTE: SignalLayout = SignalLayout {
        type_hash: 0,
        revocation_root: 1,
        revocation_registry_hash: 2,
        revoked: 3,
        link_back: 4,
        delegatable: 5,
        attribute_start: 6,
        attribute_count: 1,
        challenge: 7,
        expiration: 8,
    };

    /// `[type, revRoot, regHash, revoked, linkBack, delegatable, challenge, expiration, attr_0..]`
    pub const fn multi_attribute(count: usize) -> SignalLayout {
        SignalLayout {
            type_hash: 0,
            revocation_root: 1,
            revocation_registry_hash: 2,
            revoked: 3,
            link_back: 4,
            delegatable: 5,
            challenge: 6,
            expiration: 7,
            attribute_start: 8,
            attribute_count: count,
        }
    }

    pub fn attribute_slot(&self, i: usize) -> Option<usize> {
        (i < self.attribute_count).then_some(self.attribute_start + i)
    }

    pub fn signal_count(&self) -> usize {
        [
            self.type_hash,
            self.revocation_root,
            self.revocation_registry_hash,
            self.revoked,
            self.link_back,
            self.delegatable,
            self.challenge,
            self.expiration,
        ]
        .into_iter()
        .chain((self.attribute_count > 0).then_some(self.attribute_start + self.attribute_count - 1))
        .max()
        .map_or(0, |last| last + 1)
    }
}

// ---------------------------------------------------------------------------
// PresentationState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationState {
    /// Witness assembled, no proof yet.
    Constructed,
    /// Proof and public signals produced; witness erased.
    Proven,
    /// Loaded from storage; verifiable like a proven presentation.
    Restored,
    Verified,
    Rejected,
}

impl PresentationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PresentationState::Verified | PresentationState::Rejected)
    }
}

impl fmt::Display for PresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PresentationState::Constructed => "constructed",
            PresentationState::Proven => "proven",
            PresentationState::Restored => "restored",
            PresentationState::Verified => "verified",
            PresentationState::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Output: what a verifier sees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationMeta {
    #[serde(rename = "type")]
    pub credential_type: AttributeValue,
    pub revocation_registry: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_root: Option<FieldElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegatable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_back: Option<FieldElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<FieldElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<FieldElement>,
    #[serde(rename = "issuerPK", default, skip_serializing_if = "Option::is_none")]
    pub issuer_pk: Option<[FieldElement; 2]>,
}

/// Disclosed plaintext: a single value or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Disclosed {
    Single(AttributeValue),
    Multiple(Vec<AttributeValue>),
}

impl Disclosed {
    pub fn values(&self) -> &[AttributeValue] {
        match self {
            Disclosed::Single(v) => std::slice::from_ref(v),
            Disclosed::Multiple(vs) => vs,
        }
    }
}

/// Disclosed plaintext. Older documents also carry `position`, the indices
/// the holder disclosed; nothing proves them, so they are dropped on read
/// and never written. Verifiers get positions from a reference credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedContent {
    pub attribute: Disclosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationOutput {
    pub meta: PresentationMeta,
    pub content: DisclosedContent,
}

// ---------------------------------------------------------------------------
// Proof material
// ---------------------------------------------------------------------------

/// snarkjs Groth16 proof. Coordinates live in the base field, so they are
/// kept as decimal strings rather than scalar field elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    pub protocol: String,
    pub curve: String,
}

/// What a proving backend returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOutput {
    pub proof: Groth16Proof,
    pub public_signals: Vec<FieldElement>,
}

/// Persisted presentation `{type, issuerPKDisclosed?, output, proof, publicSignals}`.
///
/// The witness has no field here: it cannot be written out. Documents that
/// still carry a `privateInput` member are read with it ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationDocument {
    #[serde(rename = "type")]
    pub kind: String,
    /// The holder disclosed the issuer key; `output.meta.issuerPK` must be present.
    #[serde(rename = "issuerPKDisclosed", default, skip_serializing_if = "is_false")]
    pub issuer_pk_disclosed: bool,
    pub output: PresentationOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Groth16Proof>,
    #[serde(default)]
    pub public_signals: Vec<FieldElement>,
}

fn is_false(value: &bool) -> bool {
    !*value
}
