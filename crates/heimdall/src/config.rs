use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use heimdall_cred::{MAX_TREE_DEPTH, REVOCATION_TREE_DEPTH};

use crate::error::{RootError, RootResult};

/// Proving backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Directory holding `attribute/` and `mult-attributes/` circuit artifacts.
    #[serde(default = "default_circuit_dir")]
    pub circuit_dir: PathBuf,

    /// snarkjs executable, resolved through `PATH` when relative.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Upper bound on a single prove or verify call.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_circuit_dir() -> PathBuf {
    dirs_or_default(".heimdall/zkp")
}

fn default_executable() -> PathBuf {
    PathBuf::from("snarkjs")
}

fn default_timeout() -> u64 {
    300
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            circuit_dir: default_circuit_dir(),
            executable: default_executable(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Revocation registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding `revocation_registry.json` and its companions.
    #[serde(default = "default_registry_dir")]
    pub dir: PathBuf,

    /// Depth of newly created revocation trees.
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_registry_dir() -> PathBuf {
    dirs_or_default(".heimdall/revocation")
}

fn default_depth() -> usize {
    REVOCATION_TREE_DEPTH
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            dir: default_registry_dir(),
            depth: default_depth(),
        }
    }
}

/// Top-level configuration for the heimdall binary.
///
/// Loaded from a TOML file (typically `~/.heimdall/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    pub fn validate(&self) -> RootResult<()> {
        if self.registry.depth == 0 || self.registry.depth > MAX_TREE_DEPTH {
            return Err(RootError::Config(format!(
                "registry depth must be between 1 and {}, got {}",
                MAX_TREE_DEPTH, self.registry.depth
            )));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(RootError::Config("oracle timeout_secs must be > 0".into()));
        }
        if self.oracle.executable.as_os_str().is_empty() {
            return Err(RootError::Config("oracle executable must not be empty".into()));
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".heimdall/config.toml")
    }
}
