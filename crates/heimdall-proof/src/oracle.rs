//! Proving and verification backends.
//!
//! The circuits themselves live outside this crate. A [`ProvingOracle`]
//! turns a witness into a Groth16 proof plus the ordered public signals, and
//! checks a proof against the verification key of the matching circuit.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use heimdall_core::FieldElement;
use tokio::process::Command;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::error::{OracleError, OracleResult};
use crate::types::{Groth16Proof, PresentationKind, ProofOutput};
use crate::witness::PresentationWitness;

#[async_trait]
pub trait ProvingOracle: Send + Sync {
    /// Prove `witness` against the circuit selected by `kind`. Fails on a
    /// malformed witness or unsatisfiable constraints.
    async fn prove(
        &self,
        kind: PresentationKind,
        witness: &PresentationWitness,
    ) -> OracleResult<ProofOutput>;

    /// Check a proof against the verification key selected by `kind`.
    async fn verify(
        &self,
        kind: PresentationKind,
        public_signals: &[FieldElement],
        proof: &Groth16Proof,
    ) -> OracleResult<bool>;
}

// ---------------------------------------------------------------------------
// CircuitArtifacts: {wasm, proving key, verification key} per kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitArtifacts {
    pub wasm: PathBuf,
    pub proving_key: PathBuf,
    pub verification_key: PathBuf,
}

impl CircuitArtifacts {
    /// Artifact paths under `root`:
    /// `attribute/test.attributePresentation.*` and
    /// `mult-attributes/test.multipleAttributePresentation{K}.*`.
    pub fn for_kind(root: &Path, kind: PresentationKind) -> Self {
        let (dir, stem) = match kind {
            PresentationKind::Attribute => {
                ("attribute", "test.attributePresentation".to_string())
            }
            PresentationKind::MultiAttribute { count } => (
                "mult-attributes",
                format!("test.multipleAttributePresentation{count}"),
            ),
        };
        let base = root.join(dir);
        Self {
            wasm: base.join(format!("{stem}.wasm")),
            proving_key: base.join(format!("{stem}.final.zkey")),
            verification_key: base.join(format!("{stem}.verification.key.json")),
        }
    }

    fn require(path: &Path) -> OracleResult<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(OracleError::MissingArtifact(path.to_path_buf()))
        }
    }
}

// ---------------------------------------------------------------------------
// SnarkjsOracle: groth16 fullprove / verify through the snarkjs CLI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SnarkjsOracle {
    artifacts_dir: PathBuf,
    executable: PathBuf,
}

impl SnarkjsOracle {
    pub fn new(artifacts_dir: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            executable: executable.into(),
        }
    }

    pub fn artifacts(&self, kind: PresentationKind) -> CircuitArtifacts {
        CircuitArtifacts::for_kind(&self.artifacts_dir, kind)
    }

    async fn run(&self, args: &[&OsStr]) -> OracleResult<Output> {
        debug!(executable = %self.executable.display(), ?args, "invoking snarkjs");
        let output = Command::new(&self.executable)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output)
    }
}

#[async_trait]
impl ProvingOracle for SnarkjsOracle {
    async fn prove(
        &self,
        kind: PresentationKind,
        witness: &PresentationWitness,
    ) -> OracleResult<ProofOutput> {
        let artifacts = self.artifacts(kind);
        CircuitArtifacts::require(&artifacts.wasm)?;
        CircuitArtifacts::require(&artifacts.proving_key)?;

        // Removed with the directory when `scratch` drops
        let scratch = tempfile::tempdir()?;
        let input_path = scratch.path().join("input.json");
        let proof_path = scratch.path().join("proof.json");
        let public_path = scratch.path().join("public.json");

        let mut input = serde_json::to_vec(witness)
            .map_err(|e| OracleError::Backend(format!("witness encoding: {e}")))?;
        // Dropped before `scratch`, so the witness is overwritten on every exit path
        let _scrub = ScrubOnDrop {
            path: input_path.clone(),
            len: input.len(),
        };
        let written = tokio::fs::write(&input_path, &input).await;
        input.zeroize();
        written?;

        info!(%kind, "generating proof");
        let output = self
            .run(&[
                OsStr::new("groth16"),
                OsStr::new("fullprove"),
                input_path.as_os_str(),
                artifacts.wasm.as_os_str(),
                artifacts.proving_key.as_os_str(),
                proof_path.as_os_str(),
                public_path.as_os_str(),
            ])
            .await?;

        if !output.status.success() {
            warn!(%kind, status = ?output.status, "snarkjs fullprove failed");
            return Err(OracleError::Backend(format!(
                "fullprove exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let proof: Groth16Proof = serde_json::from_slice(&tokio::fs::read(&proof_path).await?)?;
        let public_signals: Vec<FieldElement> =
            serde_json::from_slice(&tokio::fs::read(&public_path).await?)?;

        debug!(%kind, signals = public_signals.len(), "proof generated");
        Ok(ProofOutput {
            proof,
            public_signals,
        })
    }

    async fn verify(
        &self,
        kind: PresentationKind,
        public_signals: &[FieldElement],
        proof: &Groth16Proof,
    ) -> OracleResult<bool> {
        let artifacts = self.artifacts(kind);
        CircuitArtifacts::require(&artifacts.verification_key)?;

        let scratch = tempfile::tempdir()?;
        let proof_path = scratch.path().join("proof.json");
        let public_path = scratch.path().join("public.json");
        tokio::fs::write(&proof_path, serde_json::to_vec(proof)?).await?;
        tokio::fs::write(&public_path, serde_json::to_vec(public_signals)?).await?;

        let output = self
            .run(&[
                OsStr::new("groth16"),
                OsStr::new("verify"),
                artifacts.verification_key.as_os_str(),
                public_path.as_os_str(),
                proof_path.as_os_str(),
            ])
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && stdout.contains("OK") {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("Invalid proof") || stderr.contains("Invalid proof") {
            debug!(%kind, "snarkjs rejected proof");
            return Ok(false);
        }
        Err(OracleError::Backend(format!(
            "verify exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

/// Overwrites a witness file with zeros of the same length when dropped.
struct ScrubOnDrop {
    path: PathBuf,
    len: usize,
}

impl Drop for ScrubOnDrop {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::write(&self.path, vec![0u8; self.len]) {
                warn!(path = %self.path.display(), error = %e, "failed to scrub witness file");
            }
        }
    }
}
