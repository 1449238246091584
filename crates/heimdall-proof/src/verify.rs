//! Presentation verification.
//!
//! Verification is an ordered list of named checks. Every check runs even
//! after an earlier one fails, so a report always carries the full picture;
//! the presentation is valid only if all of them pass. Tampering and backend
//! failures surface as failed checks, never as errors.
//!
//! The stored `output.meta` must be exactly reproducible from the public
//! signals, and each disclosed plaintext must hash to its attribute slot.

use heimdall_core::{leaf_digest, AttributeValue, FieldElement, FieldHasher};
use heimdall_cred::Credential;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::oracle::ProvingOracle;
use crate::presentation::Presentation;
use crate::types::PresentationState;

/// Names of the checks recorded in a [`VerificationReport`].
pub mod checks {
    pub const PUBLIC_SIGNALS: &str = "public_signals";
    pub const PROOF: &str = "proof";
    pub const TYPE: &str = "type";
    pub const REVOCATION_ROOT: &str = "revocation_root";
    pub const REVOCATION_REGISTRY: &str = "revocation_registry";
    pub const REVOKED: &str = "revoked";
    pub const DELEGATABLE: &str = "delegatable";
    pub const LINK_BACK: &str = "link_back";
    pub const CHALLENGE: &str = "challenge";
    pub const EXPIRATION: &str = "expiration";
    pub const CONTENT: &str = "content";
    pub const ISSUER_BINDING: &str = "issuer_binding";
    pub const REVOCATION_PIN: &str = "revocation_pin";

    /// Name of the hash check for disclosed attribute `i`.
    pub fn attribute(i: usize) -> String {
        format!("attribute[{i}]")
    }
}

// ---------------------------------------------------------------------------
// VerifyContext
// ---------------------------------------------------------------------------

/// What a verifier brings: the backend, the hash primitive and optionally a
/// reference credential, the registry root and the issuer key it trusts.
#[derive(Clone, Copy)]
pub struct VerifyContext<'a> {
    oracle: &'a dyn ProvingOracle,
    hasher: &'a dyn FieldHasher,
    credential: Option<&'a Credential>,
    revocation_root: Option<FieldElement>,
    issuer_pk: Option<[FieldElement; 2]>,
}

impl<'a> VerifyContext<'a> {
    pub fn new(oracle: &'a dyn ProvingOracle, hasher: &'a dyn FieldHasher) -> Self {
        Self {
            oracle,
            hasher,
            credential: None,
            revocation_root: None,
            issuer_pk: None,
        }
    }

    /// Report where each disclosed value sits in `credential`.
    pub fn with_credential(mut self, credential: &'a Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Registry root to require when the presentation has none pinned.
    pub fn with_revocation_root(mut self, root: FieldElement) -> Self {
        self.revocation_root = Some(root);
        self
    }

    /// Require the link-back to bind this issuer key, disclosed or not.
    pub fn with_issuer_pk(mut self, issuer_pk: [FieldElement; 2]) -> Self {
        self.issuer_pk = Some(issuer_pk);
        self
    }

    pub fn revocation_root(&self) -> Option<FieldElement> {
        self.revocation_root
    }
}

// ---------------------------------------------------------------------------
// VerificationReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckOutcome {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: None,
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub checks: Vec<CheckOutcome>,
    /// Index of each disclosed value in the reference credential, when one
    /// was supplied. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<Option<usize>>>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn check(&self, name: &str) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn outcome(&self) -> PresentationState {
        if self.is_valid() {
            PresentationState::Verified
        } else {
            PresentationState::Rejected
        }
    }
}

// ---------------------------------------------------------------------------
// Check helpers
// ---------------------------------------------------------------------------

fn compare(name: &str, stored: Option<FieldElement>, signal: Option<FieldElement>) -> CheckOutcome {
    match (stored, signal) {
        (Some(s), Some(p)) if s == p => CheckOutcome::pass(name),
        (Some(s), Some(p)) => CheckOutcome::fail(name, format!("stored {s}, proven {p}")),
        (None, _) => CheckOutcome::fail(name, "missing from presentation"),
        (_, None) => CheckOutcome::fail(name, "missing public signal"),
    }
}

fn compare_flag(name: &str, stored: Option<bool>, signal: Option<FieldElement>) -> CheckOutcome {
    match (stored, signal) {
        (_, Some(p)) if !p.is_zero() && !p.is_one() => {
            CheckOutcome::fail(name, format!("non-boolean signal {p}"))
        }
        (Some(s), Some(p)) if s == p.is_one() => CheckOutcome::pass(name),
        (Some(s), Some(p)) => CheckOutcome::fail(name, format!("stored {s}, proven {p}")),
        (None, _) => CheckOutcome::fail(name, "missing from presentation"),
        (_, None) => CheckOutcome::fail(name, "missing public signal"),
    }
}

fn hash_check(
    name: &str,
    hasher: &dyn FieldHasher,
    value: &AttributeValue,
    signal: Option<FieldElement>,
) -> CheckOutcome {
    let Some(signal) = signal else {
        return CheckOutcome::fail(name, "missing public signal");
    };
    match leaf_digest(hasher, value) {
        Ok(digest) if digest == signal => CheckOutcome::pass(name),
        Ok(digest) => CheckOutcome::fail(name, format!("hash {digest}, proven {signal}")),
        Err(e) => CheckOutcome::fail(name, format!("hashing failed: {e}")),
    }
}

/// `linkBack == H(challenge, pk.x, pk.y)` over the proven signals.
fn issuer_binding(
    hasher: &dyn FieldHasher,
    pk: [FieldElement; 2],
    challenge: Option<FieldElement>,
    link_back: Option<FieldElement>,
) -> CheckOutcome {
    let (Some(challenge), Some(link_back)) = (challenge, link_back) else {
        return CheckOutcome::fail(checks::ISSUER_BINDING, "missing public signal");
    };
    match hasher.hash(&[challenge, pk[0], pk[1]]) {
        Ok(expected) if expected == link_back => CheckOutcome::pass(checks::ISSUER_BINDING),
        Ok(_) => CheckOutcome::fail(
            checks::ISSUER_BINDING,
            "link-back does not bind challenge and issuer key",
        ),
        Err(e) => CheckOutcome::fail(checks::ISSUER_BINDING, format!("hashing failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Presentation::verify
// ---------------------------------------------------------------------------

impl Presentation {
    /// Run every check against the stored proof and output. Never mutates.
    pub async fn verify(&self, ctx: &VerifyContext<'_>) -> VerificationReport {
        let kind = self.kind();
        let layout = kind.layout();
        let signals = self.public_signals();
        let signal = |slot: usize| signals.get(slot).copied();
        let meta = &self.output().meta;
        let mut outcomes = Vec::new();

        outcomes.push(if signals.len() == layout.signal_count() {
            CheckOutcome::pass(checks::PUBLIC_SIGNALS)
        } else {
            CheckOutcome::fail(
                checks::PUBLIC_SIGNALS,
                format!("expected {}, got {}", layout.signal_count(), signals.len()),
            )
        });

        outcomes.push(match self.proof() {
            None => CheckOutcome::fail(checks::PROOF, "presentation carries no proof"),
            Some(proof) => match ctx.oracle.verify(kind, signals, proof).await {
                Ok(true) => CheckOutcome::pass(checks::PROOF),
                Ok(false) => CheckOutcome::fail(checks::PROOF, "rejected by oracle"),
                Err(e) => CheckOutcome::fail(checks::PROOF, format!("backend error: {e}")),
            },
        });

        // Stored meta must be reproducible from the proven signals
        outcomes.push(hash_check(
            checks::TYPE,
            ctx.hasher,
            &meta.credential_type,
            signal(layout.type_hash),
        ));
        outcomes.push(compare(
            checks::REVOCATION_ROOT,
            meta.revocation_root,
            signal(layout.revocation_root),
        ));
        outcomes.push(hash_check(
            checks::REVOCATION_REGISTRY,
            ctx.hasher,
            &meta.revocation_registry,
            signal(layout.revocation_registry_hash),
        ));
        outcomes.push(compare_flag(checks::REVOKED, meta.revoked, signal(layout.revoked)));
        outcomes.push(compare_flag(
            checks::DELEGATABLE,
            meta.delegatable,
            signal(layout.delegatable),
        ));
        outcomes.push(compare(checks::LINK_BACK, meta.link_back, signal(layout.link_back)));
        outcomes.push(compare(checks::CHALLENGE, meta.challenge, signal(layout.challenge)));
        outcomes.push(compare(checks::EXPIRATION, meta.expiration, signal(layout.expiration)));

        // Disclosed plaintext against its proven hash
        let values = self.output().content.attribute.values();
        if values.len() != layout.attribute_count {
            outcomes.push(CheckOutcome::fail(
                checks::CONTENT,
                format!(
                    "{} disclosed values for {} attribute slots",
                    values.len(),
                    layout.attribute_count
                ),
            ));
        }
        for (i, value) in values.iter().enumerate() {
            outcomes.push(hash_check(
                &checks::attribute(i),
                ctx.hasher,
                value,
                layout.attribute_slot(i).and_then(signal),
            ));
        }

        let (challenge, link_back) = (signal(layout.challenge), signal(layout.link_back));
        match (meta.issuer_pk, self.issuer_pk_disclosed(), ctx.issuer_pk) {
            (None, true, _) => outcomes.push(CheckOutcome::fail(
                checks::ISSUER_BINDING,
                "issuer key disclosed but missing from presentation",
            )),
            (Some(pk), _, Some(trusted)) if pk != trusted => outcomes.push(CheckOutcome::fail(
                checks::ISSUER_BINDING,
                "disclosed issuer key is not the trusted one",
            )),
            (Some(pk), _, _) | (None, false, Some(pk)) => {
                outcomes.push(issuer_binding(ctx.hasher, pk, challenge, link_back))
            }
            (None, false, None) => {}
        }

        let pinned = self.pinned_revocation_root().or(ctx.revocation_root);
        outcomes.push(match (pinned, signal(layout.revocation_root)) {
            (Some(root), Some(proven)) if root == proven => {
                CheckOutcome::pass(checks::REVOCATION_PIN)
            }
            (Some(root), Some(proven)) => CheckOutcome::fail(
                checks::REVOCATION_PIN,
                format!("pinned {root}, proven {proven}"),
            ),
            (None, _) => CheckOutcome::fail(checks::REVOCATION_PIN, "no revocation root pinned"),
            (_, None) => CheckOutcome::fail(checks::REVOCATION_PIN, "missing public signal"),
        });

        let positions = ctx
            .credential
            .map(|credential| values.iter().map(|v| credential.position_of(v)).collect());

        for outcome in &outcomes {
            if outcome.passed {
                debug!(check = %outcome.name, "check passed");
            } else {
                warn!(
                    check = %outcome.name,
                    detail = outcome.detail.as_deref().unwrap_or_default(),
                    "check failed"
                );
            }
        }

        let report = VerificationReport {
            checks: outcomes,
            positions,
        };
        info!(%kind, valid = report.is_valid(), "presentation verified");
        report
    }
}
