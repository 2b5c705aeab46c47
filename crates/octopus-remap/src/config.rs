//! Remap plugin configuration

use crate::error::{RemapError, Result};
use octopus_scripting::config as loader;
use octopus_scripting::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest script path accepted, leaving headroom below the host's 1024-byte
/// path buffer.
pub const DEFAULT_MAX_SCRIPT_PATH_LEN: usize = 1024 - 16;

/// Remap plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    /// Directory relative script paths are resolved against
    pub config_dir: PathBuf,

    /// Maximum resolved script path length in bytes
    pub max_script_path_len: usize,

    /// Shared runtime settings
    pub runtime: RuntimeConfig,
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/octopus"),
            max_script_path_len: DEFAULT_MAX_SCRIPT_PATH_LEN,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl RemapConfig {
    /// Load configuration from a YAML, TOML or JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = loader::load_from_file(path)?;
        config.runtime.validate()?;
        Ok(config)
    }

    /// Set the configuration directory
    pub fn with_config_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Resolve a script path from a remap rule.
    ///
    /// Absolute paths are used as-is; relative ones are joined to
    /// `config_dir`.
    pub fn resolve_script_path(&self, raw: &str) -> Result<PathBuf> {
        if raw.trim().is_empty() {
            return Err(RemapError::invalid_config("script file is required"));
        }

        let raw_path = Path::new(raw);
        let path = if raw_path.is_absolute() {
            raw_path.to_path_buf()
        } else {
            self.config_dir.join(raw_path)
        };

        if path.as_os_str().len() >= self.max_script_path_len {
            return Err(RemapError::invalid_config(format!(
                "script file name too long ({} bytes, limit {})",
                path.as_os_str().len(),
                self.max_script_path_len
            )));
        }

        Ok(path)
    }
}
