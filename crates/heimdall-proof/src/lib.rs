//! Heimdall Presentations
//!
//! Zero-knowledge presentations of issuer-signed credentials. A presentation
//! proves that a credential is committed under the issuer's signature, is not
//! revoked in a given registry snapshot and has not expired, while revealing
//! only the attributes the holder chose.
//!
//! # Lifecycle
//!
//! ```text
//! PresentationBuilder -> Presentation (Constructed) -> generate -> Proven
//!                     -> to_document / restore -> Restored -> verify
//! ```
//!
//! - Constructed: witness assembled from the credential and registry
//! - Proven: proof and public signals stored, witness zeroized
//! - Restored: loaded from a persisted document, verifiable like Proven
//! - Verified / Rejected: recorded by `finalize`
//!
//! Proving is delegated to a [`ProvingOracle`]; [`SnarkjsOracle`] drives the
//! snarkjs CLI against the compiled circuits.

pub mod error;
pub mod oracle;
pub mod presentation;
pub mod types;
pub mod verify;
pub mod witness;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{OracleError, OracleResult, PresentationError, PresentationResult};
pub use oracle::{CircuitArtifacts, ProvingOracle, SnarkjsOracle};
pub use presentation::{Disclosure, Presentation, PresentationBuilder};
pub use types::{
    Disclosed, DisclosedContent, Groth16Proof, PresentationDocument, PresentationKind,
    PresentationMeta, PresentationOutput, PresentationState, ProofOutput, SignalLayout,
    MAX_DISCLOSURES,
};
pub use verify::{checks, CheckOutcome, VerificationReport, VerifyContext};
pub use witness::{DisclosureWitness, PresentationWitness};
