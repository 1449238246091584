//! Presentation construction, proving and persistence.
//!
//! A presentation moves through
//!
//! ```text
//! Constructed --generate--> Proven --to_document/restore--> Restored --finalize--> Verified | Rejected
//! ```
//!
//! The witness exists only in the Constructed state. `generate` takes it out
//! of the presentation, hands it to the oracle by reference and drops it
//! (zeroizing) whatever the oracle returns.

use heimdall_core::{ChallengeSigner, FieldElement, FieldHasher, SecretKey};
use heimdall_cred::{Credential, RevocationRegistry, META_SIZE};
use tracing::{debug, info, warn};

use crate::error::{PresentationError, PresentationResult};
use crate::oracle::ProvingOracle;
use crate::types::{
    Disclosed, DisclosedContent, Groth16Proof, PresentationDocument, PresentationKind,
    PresentationMeta, PresentationOutput, PresentationState, MAX_DISCLOSURES,
};
use crate::verify::{VerificationReport, VerifyContext};
use crate::witness::{DisclosureWitness, PresentationWitness};

// ---------------------------------------------------------------------------
// Disclosure: which attributes to reveal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disclosure {
    Attribute(usize),
    MultiAttribute(Vec<usize>),
}

impl Disclosure {
    /// The presentation kind, rejecting counts without a compiled circuit.
    pub fn kind(&self) -> PresentationResult<PresentationKind> {
        match self {
            Disclosure::Attribute(_) => Ok(PresentationKind::Attribute),
            Disclosure::MultiAttribute(indices) if indices.is_empty() => {
                Err(PresentationError::EmptyDisclosure)
            }
            Disclosure::MultiAttribute(indices) if indices.len() > MAX_DISCLOSURES => {
                Err(PresentationError::UnsupportedDisclosureCount {
                    requested: indices.len(),
                    max: MAX_DISCLOSURES,
                })
            }
            Disclosure::MultiAttribute(indices) => Ok(PresentationKind::MultiAttribute {
                count: indices.len(),
            }),
        }
    }

    pub fn indices(&self) -> &[usize] {
        match self {
            Disclosure::Attribute(index) => std::slice::from_ref(index),
            Disclosure::MultiAttribute(indices) => indices,
        }
    }
}

// ---------------------------------------------------------------------------
// PresentationBuilder
// ---------------------------------------------------------------------------

/// Collects the inputs of a presentation and assembles its witness.
pub struct PresentationBuilder<'a> {
    credential: &'a Credential,
    registry: &'a RevocationRegistry,
    expiration: Option<u64>,
    challenge: Option<FieldElement>,
    holder: Option<(&'a SecretKey, &'a dyn ChallengeSigner)>,
    disclose_issuer_pk: bool,
}

impl<'a> PresentationBuilder<'a> {
    pub fn new(credential: &'a Credential, registry: &'a RevocationRegistry) -> Self {
        Self {
            credential,
            registry,
            expiration: None,
            challenge: None,
            holder: None,
            disclose_issuer_pk: false,
        }
    }

    /// Presentation expiry in milliseconds; defaults to the credential's own.
    pub fn expiration(mut self, expiration_ms: u64) -> Self {
        self.expiration = Some(expiration_ms);
        self
    }

    pub fn challenge(mut self, challenge: FieldElement) -> Self {
        self.challenge = Some(challenge);
        self
    }

    /// Sign the challenge with the holder key as proof of possession.
    pub fn holder_key(mut self, secret_key: &'a SecretKey, signer: &'a dyn ChallengeSigner) -> Self {
        self.holder = Some((secret_key, signer));
        self
    }

    pub fn disclose_issuer_pk(mut self, disclose: bool) -> Self {
        self.disclose_issuer_pk = disclose;
        self
    }

    pub fn attribute(self, hasher: &dyn FieldHasher, index: usize) -> PresentationResult<Presentation> {
        self.build(hasher, Disclosure::Attribute(index))
    }

    pub fn multi_attribute(
        self,
        hasher: &dyn FieldHasher,
        indices: &[usize],
    ) -> PresentationResult<Presentation> {
        self.build(hasher, Disclosure::MultiAttribute(indices.to_vec()))
    }

    /// Validate the request and assemble the witness.
    pub fn build(
        self,
        hasher: &dyn FieldHasher,
        disclosure: Disclosure,
    ) -> PresentationResult<Presentation> {
        let kind = disclosure.kind()?;
        let challenge = self
            .challenge
            .ok_or_else(|| PresentationError::InvalidRequest("challenge is required".into()))?;

        let credential = self.credential;
        credential.validate()?;

        let credential_expiration = credential.expiration()?;
        let expiration = self.expiration.unwrap_or(credential_expiration);
        if expiration > credential_expiration {
            return Err(PresentationError::ExpirationExceedsCredential {
                requested: expiration,
                credential: credential_expiration,
            });
        }

        let attributes = &credential.attributes;
        if let Some(&index) = disclosure.indices().iter().find(|&&i| i >= attributes.len()) {
            return Err(PresentationError::DisclosureIndexOutOfRange {
                index,
                attributes: attributes.len(),
            });
        }

        let tree = credential.commitment_tree(hasher)?;
        if let Some(root) = credential.root {
            if root != tree.root() {
                return Err(PresentationError::InvalidRequest(
                    "credential root does not match its attributes".into(),
                ));
            }
        }

        // Meta commitment: proof at the canonical slot 0, values as committed
        let meta_proof = tree.generate_proof(0)?;
        let meta = attributes[..META_SIZE]
            .iter()
            .zip(tree.data())
            .map(|(value, digest)| if value.is_numeric() { value.encode() } else { *digest })
            .collect();

        let id = credential.identifier()?;
        let revocation_proof = self.registry.proof(id)?;
        let revocation_leaf = self.registry.leaf(id)?;

        let sign_challenge = match self.holder {
            Some((secret_key, signer)) => Some(signer.sign(secret_key, &challenge)?.to_signal_triple()),
            None => None,
        };

        let disclosure_witness = match &disclosure {
            Disclosure::Attribute(index) => DisclosureWitness::single(tree.generate_proof(*index)?),
            Disclosure::MultiAttribute(indices) => DisclosureWitness::multiple(
                indices
                    .iter()
                    .map(|i| tree.generate_proof(*i))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        let content = match &disclosure {
            Disclosure::Attribute(index) => Disclosed::Single(attributes[*index].clone()),
            Disclosure::MultiAttribute(indices) => {
                Disclosed::Multiple(indices.iter().map(|i| attributes[*i].clone()).collect())
            }
        };

        let witness = PresentationWitness {
            path_meta: meta_proof.path,
            lemma_meta: meta_proof.lemma,
            meta,
            expiration,
            signature_meta: credential.signature.signature().to_signal_triple(),
            issuer_pk: credential.signature.pk,
            path_revocation: revocation_proof.path,
            lemma_revocation: revocation_proof.lemma,
            revocation_leaf,
            challenge,
            sign_challenge,
            disclosure: disclosure_witness,
        };

        let output = PresentationOutput {
            meta: PresentationMeta {
                credential_type: credential.credential_type()?.clone(),
                revocation_registry: credential.revocation_registry()?.clone(),
                revocation_root: None,
                revoked: None,
                delegatable: None,
                link_back: None,
                challenge: None,
                expiration: None,
                issuer_pk: self.disclose_issuer_pk.then_some(credential.signature.pk),
            },
            content: DisclosedContent { attribute: content },
        };

        info!(
            %kind,
            credential = id,
            revocation_position = RevocationRegistry::position(id),
            holder_bound = self.holder.is_some(),
            "presentation constructed"
        );

        Ok(Presentation {
            kind,
            state: PresentationState::Constructed,
            witness: Some(witness),
            output,
            proof: None,
            public_signals: Vec::new(),
            pinned_revocation_root: Some(self.registry.root()),
            issuer_pk_disclosed: self.disclose_issuer_pk,
        })
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Presentation {
    kind: PresentationKind,
    state: PresentationState,
    witness: Option<PresentationWitness>,
    output: PresentationOutput,
    proof: Option<Groth16Proof>,
    public_signals: Vec<FieldElement>,
    pinned_revocation_root: Option<FieldElement>,
    issuer_pk_disclosed: bool,
}

impl Presentation {
    pub fn builder<'a>(
        credential: &'a Credential,
        registry: &'a RevocationRegistry,
    ) -> PresentationBuilder<'a> {
        PresentationBuilder::new(credential, registry)
    }

    pub fn kind(&self) -> PresentationKind {
        self.kind
    }

    pub fn state(&self) -> PresentationState {
        self.state
    }

    pub fn output(&self) -> &PresentationOutput {
        &self.output
    }

    pub fn proof(&self) -> Option<&Groth16Proof> {
        self.proof.as_ref()
    }

    pub fn public_signals(&self) -> &[FieldElement] {
        &self.public_signals
    }

    pub fn has_witness(&self) -> bool {
        self.witness.is_some()
    }

    /// Whether the holder chose to disclose the issuer public key.
    pub fn issuer_pk_disclosed(&self) -> bool {
        self.issuer_pk_disclosed
    }

    pub fn pinned_revocation_root(&self) -> Option<FieldElement> {
        self.pinned_revocation_root
    }

    /// Adopt `root` unless a root is already pinned; returns the pinned root.
    pub fn pin_revocation_root(&mut self, root: FieldElement) -> FieldElement {
        *self.pinned_revocation_root.get_or_insert(root)
    }

    /// Prove the witness, populate the derived meta fields and self-check.
    ///
    /// The witness is gone after this call whether or not it succeeds. A
    /// presentation failing its own verification is returned as an error
    /// and left Rejected.
    pub async fn generate(
        &mut self,
        oracle: &dyn ProvingOracle,
        hasher: &dyn FieldHasher,
    ) -> PresentationResult<VerificationReport> {
        if self.state != PresentationState::Constructed {
            return Err(PresentationError::InvalidState {
                expected: PresentationState::Constructed,
                actual: self.state,
            });
        }
        let witness = self
            .witness
            .take()
            .ok_or(PresentationError::WitnessUnavailable)?;

        debug!(kind = %self.kind, "invoking proving oracle");
        let proven = oracle.prove(self.kind, &witness).await;
        drop(witness);
        let output = proven?;

        let expected = self.kind.layout().signal_count();
        if output.public_signals.len() != expected {
            return Err(PresentationError::MalformedPublicSignals {
                expected,
                actual: output.public_signals.len(),
            });
        }

        self.proof = Some(output.proof);
        self.public_signals = output.public_signals;
        self.state = PresentationState::Proven;
        self.populate_meta();
        info!(kind = %self.kind, "presentation proven");

        let report = self.verify(&VerifyContext::new(oracle, hasher)).await;
        if !report.is_valid() {
            let failed: Vec<String> = report.failed_checks().into_iter().map(String::from).collect();
            warn!(kind = %self.kind, ?failed, "presentation failed its self-check");
            self.state = PresentationState::Rejected;
            return Err(PresentationError::SelfCheckFailed { failed });
        }
        Ok(report)
    }

    /// Verify and record the terminal state.
    ///
    /// Without a pinned root the presentation adopts the context's root first.
    pub async fn finalize(
        &mut self,
        ctx: &VerifyContext<'_>,
    ) -> PresentationResult<VerificationReport> {
        if !matches!(
            self.state,
            PresentationState::Proven | PresentationState::Restored
        ) {
            return Err(PresentationError::InvalidState {
                expected: PresentationState::Restored,
                actual: self.state,
            });
        }
        if let Some(root) = ctx.revocation_root() {
            self.pin_revocation_root(root);
        }
        let report = self.verify(ctx).await;
        self.state = report.outcome();
        Ok(report)
    }

    /// First-time population of `output.meta` from freshly proven signals.
    fn populate_meta(&mut self) {
        let layout = self.kind.layout();
        let signal = |slot: usize| self.public_signals.get(slot).copied();
        let meta = PresentationMeta {
            revocation_root: signal(layout.revocation_root),
            revoked: signal(layout.revoked).map(|s| s.is_one()),
            delegatable: signal(layout.delegatable).map(|s| s.is_one()),
            link_back: signal(layout.link_back),
            challenge: signal(layout.challenge),
            expiration: signal(layout.expiration),
            ..self.output.meta.clone()
        };
        self.output.meta = meta;
    }

    // -- persistence --------------------------------------------------------

    pub fn to_document(&self) -> PresentationDocument {
        PresentationDocument {
            kind: self.kind.type_tag().to_string(),
            issuer_pk_disclosed: self.issuer_pk_disclosed,
            output: self.output.clone(),
            proof: self.proof.clone(),
            public_signals: self.public_signals.clone(),
        }
    }

    pub fn to_json(&self) -> PresentationResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Rebuild a presentation from its persisted form, dispatching on `type`.
    ///
    /// An `"attribute"` document whose content is a list restores as the
    /// multi-attribute variant.
    pub fn restore(document: PresentationDocument) -> PresentationResult<Self> {
        let kind = match (document.kind.as_str(), &document.output.content.attribute) {
            (PresentationKind::ATTRIBUTE_TAG, Disclosed::Single(_)) => PresentationKind::Attribute,
            (
                PresentationKind::ATTRIBUTE_TAG | PresentationKind::MULTI_ATTRIBUTE_TAG,
                Disclosed::Multiple(values),
            ) => Disclosure::MultiAttribute((0..values.len()).collect()).kind()?,
            (PresentationKind::MULTI_ATTRIBUTE_TAG, Disclosed::Single(_)) => {
                return Err(PresentationError::ContentMismatch(
                    "mult-attribute presentation with a single attribute".into(),
                ))
            }
            (other, _) => return Err(PresentationError::UnsupportedPresentationType(other.into())),
        };

        debug!(%kind, signals = document.public_signals.len(), "presentation restored");
        let issuer_pk_disclosed =
            document.issuer_pk_disclosed || document.output.meta.issuer_pk.is_some();
        Ok(Self {
            kind,
            state: PresentationState::Restored,
            witness: None,
            output: document.output,
            proof: document.proof,
            public_signals: document.public_signals,
            pinned_revocation_root: None,
            issuer_pk_disclosed,
        })
    }

    pub fn from_json(json: &str) -> PresentationResult<Self> {
        Self::restore(serde_json::from_str(json)?)
    }
}
