//! Heimdall Root Library
//!
//! Orchestration behind the `heimdall` binary: configuration, registry file
//! I/O and the four workflows of the presentation protocol.
//!
//! - Issuer: create a revocation registry and revoke credentials in it
//! - Holder: build and prove a presentation from a credential
//! - Verifier: issue challenges and verify presentations against the
//!   published registry root
//!
//! `RootState` owns the hash primitive, the proving oracle and the EdDSA
//! signer. The binary uses Poseidon, snarkjs and Baby Jubjub; tests inject
//! simulated backends.

pub mod config;
pub mod error;
pub mod storage;

pub use config::{OracleConfig, RegistryConfig, RootConfig};
pub use error::{RootError, RootResult};
pub use storage::RegistryStore;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use heimdall_core::{
    expiration_in_days, BabyJubjubSigner, ChallengeSigner, FieldElement, FieldHasher,
    PoseidonHasher,
};
use heimdall_cred::{RevocationAuthority, RevocationRegistry, RevocationUpdate};
use heimdall_proof::{
    Disclosure, Presentation, ProvingOracle, SnarkjsOracle, VerificationReport, VerifyContext,
};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Inputs of a holder's presentation.
#[derive(Debug, Clone)]
pub struct PresentRequest {
    pub credential: PathBuf,
    /// Attribute indices in disclosure order. A single index produces an
    /// attribute presentation, several a multi-attribute one.
    pub indices: Vec<usize>,
    pub challenge: FieldElement,
    /// Lifetime in days from now; the credential's expiration when absent.
    pub expiration_days: Option<u32>,
    /// Holder key file, signs the challenge.
    pub secret_key: Option<PathBuf>,
    pub disclose_issuer_pk: bool,
    pub registry_dir: Option<PathBuf>,
}

/// Inputs of a verification.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub presentation: PathBuf,
    /// Trusted registry root; read from the registry directory when absent.
    pub revocation_root: Option<FieldElement>,
    pub registry_dir: Option<PathBuf>,
    /// Reference credential for reporting disclosure positions.
    pub credential: Option<PathBuf>,
    /// Issuer key the presentation must be bound to.
    pub issuer_pk: Option<[FieldElement; 2]>,
}

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

pub struct RootState {
    pub config: RootConfig,
    hasher: Arc<dyn FieldHasher>,
    oracle: Arc<dyn ProvingOracle>,
    signer: Option<Arc<dyn ChallengeSigner>>,
}

/// State for the binary: Poseidon hashing, the snarkjs oracle and circomlib
/// EdDSA signing.
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    let oracle = SnarkjsOracle::new(&config.oracle.circuit_dir, &config.oracle.executable);
    info!(
        circuits = %config.oracle.circuit_dir.display(),
        registry = %config.registry.dir.display(),
        "initializing heimdall"
    );
    Ok(
        RootState::with_backends(config, Arc::new(oracle), Arc::new(PoseidonHasher))?
            .with_signer(Arc::new(BabyJubjubSigner)),
    )
}

impl RootState {
    pub fn with_backends(
        config: RootConfig,
        oracle: Arc<dyn ProvingOracle>,
        hasher: Arc<dyn FieldHasher>,
    ) -> RootResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            hasher,
            oracle,
            signer: None,
        })
    }

    /// EdDSA signer for holder challenges and registry roots.
    pub fn with_signer(mut self, signer: Arc<dyn ChallengeSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn registry_store(&self, dir: Option<&Path>) -> RegistryStore {
        RegistryStore::new(dir.unwrap_or(self.config.registry.dir.as_path()))
    }

    fn signer(&self) -> RootResult<&dyn ChallengeSigner> {
        self.signer
            .as_deref()
            .ok_or_else(|| RootError::Config("no EdDSA signer configured".into()))
    }

    fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.oracle.timeout_secs)
    }

    // -- issuer ---------------------------------------------------------------

    /// Create an empty registry of the configured depth. An existing registry
    /// is only replaced with `force`.
    pub fn create_registry(&self, dir: Option<&Path>, force: bool) -> RootResult<RevocationRegistry> {
        let store = self.registry_store(dir);
        if store.exists() && !force {
            return Err(RootError::Config(format!(
                "registry already exists at {}",
                store.registry_path().display()
            )));
        }
        let registry = RevocationRegistry::new(self.hasher.as_ref(), self.config.registry.depth)?;
        store.write(&registry)?;
        Ok(registry)
    }

    /// Revoke credential `id`; with a key file the new root is signed.
    pub fn revoke(
        &self,
        id: u64,
        dir: Option<&Path>,
        secret_key: Option<&Path>,
    ) -> RootResult<RevocationUpdate> {
        let store = self.registry_store(dir);
        let mut registry = store.read(self.hasher.as_ref())?;

        let update = match secret_key {
            Some(path) => {
                let secret_key = storage::read_secret_key(path)?;
                let authority = RevocationAuthority {
                    secret_key: &secret_key,
                    signer: self.signer()?,
                };
                registry.update(self.hasher.as_ref(), id, Some(&authority))?
            }
            None => registry.update(self.hasher.as_ref(), id, None)?,
        };

        if update.changed {
            store.write(&registry)?;
        }
        Ok(update)
    }

    // -- holder ---------------------------------------------------------------

    /// Build, prove and self-check a presentation.
    pub async fn present(&self, request: &PresentRequest) -> RootResult<Presentation> {
        let credential = storage::read_credential(&request.credential)?;
        let registry = self
            .registry_store(request.registry_dir.as_deref())
            .read(self.hasher.as_ref())?;
        let secret_key = request
            .secret_key
            .as_deref()
            .map(storage::read_secret_key)
            .transpose()?;

        let mut builder = Presentation::builder(&credential, &registry)
            .challenge(request.challenge)
            .disclose_issuer_pk(request.disclose_issuer_pk);
        if let Some(days) = request.expiration_days {
            builder = builder.expiration(expiration_in_days(days));
        }
        if let Some(secret_key) = &secret_key {
            builder = builder.holder_key(secret_key, self.signer()?);
        }

        let disclosure = match request.indices.as_slice() {
            [index] => Disclosure::Attribute(*index),
            indices => Disclosure::MultiAttribute(indices.to_vec()),
        };
        let mut presentation = builder.build(self.hasher.as_ref(), disclosure)?;

        let secs = self.config.oracle.timeout_secs;
        tokio::time::timeout(
            self.oracle_timeout(),
            presentation.generate(self.oracle.as_ref(), self.hasher.as_ref()),
        )
        .await
        .map_err(|_| RootError::OracleTimeout(secs))??;

        info!(kind = %presentation.kind(), "presentation generated");
        Ok(presentation)
    }

    // -- verifier -------------------------------------------------------------

    /// Verify a stored presentation and record its terminal state.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> RootResult<(Presentation, VerificationReport)> {
        let mut presentation = storage::read_presentation(&request.presentation)?;
        let root = match request.revocation_root {
            Some(root) => root,
            None => self
                .registry_store(request.registry_dir.as_deref())
                .read_root()?,
        };
        let credential = request
            .credential
            .as_deref()
            .map(storage::read_credential)
            .transpose()?;

        let mut ctx = VerifyContext::new(self.oracle.as_ref(), self.hasher.as_ref())
            .with_revocation_root(root);
        if let Some(credential) = &credential {
            ctx = ctx.with_credential(credential);
        }
        if let Some(issuer_pk) = request.issuer_pk {
            ctx = ctx.with_issuer_pk(issuer_pk);
        }

        let secs = self.config.oracle.timeout_secs;
        let report = tokio::time::timeout(self.oracle_timeout(), presentation.finalize(&ctx))
            .await
            .map_err(|_| RootError::OracleTimeout(secs))??;

        if !report.is_valid() {
            warn!(failed = ?report.failed_checks(), "presentation rejected");
        }
        Ok((presentation, report))
    }
}

/// A fresh random challenge for a holder to bind into a presentation.
pub fn new_challenge() -> FieldElement {
    FieldElement::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use heimdall_core::Sha256FieldHasher;
    use heimdall_proof::testing::SimulatedOracle;

    fn state(dir: &Path) -> RootState {
        let mut config = RootConfig::default();
        config.registry.dir = dir.to_path_buf();
        config.registry.depth = 6;
        RootState::with_backends(
            config,
            Arc::new(SimulatedOracle::new(Sha256FieldHasher)),
            Arc::new(Sha256FieldHasher),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = RootConfig::default();
        config.oracle.timeout_secs = 0;
        let result = RootState::with_backends(
            config,
            Arc::new(SimulatedOracle::new(Sha256FieldHasher)),
            Arc::new(Sha256FieldHasher),
        );
        assert!(matches!(result, Err(RootError::Config(_))));
    }

    #[test]
    fn test_create_registry_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let registry = state.create_registry(None, false).unwrap();
        assert_eq!(registry.depth(), 6);
        assert!(state.create_registry(None, false).is_err());
        assert!(state.create_registry(None, true).is_ok());
    }

    #[test]
    fn test_revoke_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        state.create_registry(None, false).unwrap();

        let first = state.revoke(1000, None, None).unwrap();
        assert!(first.changed);
        let second = state.revoke(1000, None, None).unwrap();
        assert!(!second.changed);
        assert_eq!(first.root, second.root);
        assert_eq!(state.registry_store(None).read_root().unwrap(), first.root);
    }

    #[test]
    fn test_signed_revocation_needs_a_signer() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        state.create_registry(None, false).unwrap();
        let key = dir.path().join("issuer.sk");
        std::fs::write(&key, "987654321\n").unwrap();

        assert!(matches!(
            state.revoke(5, None, Some(&key)),
            Err(RootError::Config(_))
        ));
    }

    #[test]
    fn test_signed_revocation_writes_signature_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).with_signer(Arc::new(BabyJubjubSigner));
        state.create_registry(None, false).unwrap();
        let key = dir.path().join("issuer.sk");
        std::fs::write(&key, "heimdall-issuer-key-0123456789ab\n").unwrap();

        let update = state.revoke(5, None, Some(&key)).unwrap();
        let store = state.registry_store(None);
        assert!(store.signature_path().is_file());

        let registry = store.read(&Sha256FieldHasher).unwrap();
        let secret = storage::read_secret_key(&key).unwrap();
        let expected = BabyJubjubSigner.sign(&secret, &update.root).unwrap();
        assert_eq!(registry.signature(), Some(&expected));

        // An unsigned update drops the stale signature
        state.revoke(6, None, None).unwrap();
        assert!(!store.signature_path().exists());
    }

    #[test]
    fn test_challenges_differ() {
        assert_ne!(new_challenge(), new_challenge());
    }
}
