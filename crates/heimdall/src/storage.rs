//! File layout of a published revocation registry and the holder's inputs.
//!
//! A registry directory holds three JSON files:
//!
//! - `revocation_registry.json`: `{tree: {leaves, data, root}, signature?}`
//! - `revocation_root.json`: the root as a decimal string
//! - `revocation_signature.json`: `{R8, S}`, only while the root is signed
//!
//! Verifiers only need the root file.

use std::path::{Path, PathBuf};

use heimdall_core::{FieldElement, FieldHasher, SecretKey};
use heimdall_cred::{Credential, PersistedRegistry, RevocationRegistry};
use heimdall_proof::Presentation;
use tracing::{debug, info};

use crate::error::{RootError, RootResult};

pub const REGISTRY_FILE: &str = "revocation_registry.json";
pub const ROOT_FILE: &str = "revocation_root.json";
pub const SIGNATURE_FILE: &str = "revocation_signature.json";

#[derive(Debug, Clone)]
pub struct RegistryStore {
    dir: PathBuf,
}

impl RegistryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE)
    }

    pub fn root_path(&self) -> PathBuf {
        self.dir.join(ROOT_FILE)
    }

    pub fn signature_path(&self) -> PathBuf {
        self.dir.join(SIGNATURE_FILE)
    }

    pub fn exists(&self) -> bool {
        self.registry_path().is_file()
    }

    /// Write all registry files. A stale signature file is removed when the
    /// registry carries no signature.
    pub fn write(&self, registry: &RevocationRegistry) -> RootResult<()> {
        std::fs::create_dir_all(&self.dir)?;

        let persisted = registry.to_persisted();
        std::fs::write(self.registry_path(), serde_json::to_string(&persisted)?)?;
        std::fs::write(self.root_path(), serde_json::to_string(&registry.root())?)?;

        match &persisted.signature {
            Some(signature) => {
                std::fs::write(self.signature_path(), serde_json::to_string(signature)?)?
            }
            None if self.signature_path().exists() => std::fs::remove_file(self.signature_path())?,
            None => {}
        }

        info!(
            dir = %self.dir.display(),
            root = %registry.root(),
            signed = persisted.signature.is_some(),
            "revocation registry written"
        );
        Ok(())
    }

    /// Load and re-validate the full registry.
    pub fn read(&self, hasher: &dyn FieldHasher) -> RootResult<RevocationRegistry> {
        let path = self.registry_path();
        let persisted: PersistedRegistry = serde_json::from_str(&read_existing(&path)?)?;
        let registry = RevocationRegistry::from_persisted(hasher, &persisted)?;
        debug!(path = %path.display(), root = %registry.root(), "revocation registry loaded");
        Ok(registry)
    }

    /// The published root alone.
    pub fn read_root(&self) -> RootResult<FieldElement> {
        Ok(serde_json::from_str(&read_existing(&self.root_path())?)?)
    }
}

pub fn read_credential(path: &Path) -> RootResult<Credential> {
    let credential: Credential = serde_json::from_str(&read_existing(path)?)?;
    credential.validate()?;
    Ok(credential)
}

pub fn read_presentation(path: &Path) -> RootResult<Presentation> {
    Ok(Presentation::from_json(&read_existing(path)?)?)
}

pub fn write_presentation(path: &Path, presentation: &Presentation) -> RootResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, presentation.to_json()?)?;
    debug!(path = %path.display(), kind = %presentation.kind(), "presentation written");
    Ok(())
}

/// Secret keys are stored as the first line of a text file.
pub fn read_secret_key(path: &Path) -> RootResult<SecretKey> {
    let contents = zeroizing_read(path)?;
    Ok(SecretKey::from_file_contents(&contents)?)
}

fn read_existing(path: &Path) -> RootResult<String> {
    if !path.is_file() {
        return Err(RootError::MissingFile(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn zeroizing_read(path: &Path) -> RootResult<zeroize::Zeroizing<String>> {
    Ok(zeroize::Zeroizing::new(read_existing(path)?))
}
