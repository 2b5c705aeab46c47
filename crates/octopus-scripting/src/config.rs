//! Runtime configuration and loading

use crate::error::{Result, ScriptError};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Configuration of the shared script runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Function every script must define
    pub entry_point: String,

    /// Global name the options map is bound to
    pub options_binding: String,

    /// Operations allowed per call (0 = unlimited)
    pub max_operations: u64,

    /// Maximum function call nesting
    pub max_call_levels: usize,

    /// Maximum expression nesting at global level
    pub max_expr_depth: usize,

    /// Maximum expression nesting inside functions
    pub max_function_expr_depth: usize,

    /// Maximum string length in bytes (0 = unlimited)
    pub max_string_size: usize,

    /// Maximum array length (0 = unlimited)
    pub max_array_size: usize,

    /// Maximum object map size (0 = unlimited)
    pub max_map_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            entry_point: "Process".to_string(),
            options_binding: "options".to_string(),
            max_operations: 100_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 1024 * 1024,
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

impl RuntimeConfig {
    /// Set the entry point name
    pub fn with_entry_point<S: Into<String>>(mut self, name: S) -> Self {
        self.entry_point = name.into();
        self
    }

    /// Set the operation limit
    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Check names and limits
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("entry_point", &self.entry_point),
            ("options_binding", &self.options_binding),
        ] {
            if !is_identifier(value) {
                return Err(ScriptError::invalid_config(format!(
                    "{field} must be a valid identifier, got '{value}'"
                )));
            }
        }

        if self.max_call_levels == 0 {
            return Err(ScriptError::invalid_config(
                "max_call_levels must be greater than zero",
            ));
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML
    Yaml,
    /// TOML
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(ScriptError::invalid_config(format!(
                "Unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}

/// Load a configuration value from a file
pub fn load_from_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ScriptError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&content, ConfigFormat::from_path(path)?)
}

/// Load a configuration value from a string
pub fn load_from_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T> {
    let expanded = expand_env_vars(content)?;

    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&expanded)
            .map_err(|e| ScriptError::invalid_config(format!("Failed to parse YAML: {e}"))),
        ConfigFormat::Toml => toml::from_str(&expanded)
            .map_err(|e| ScriptError::invalid_config(format!("Failed to parse TOML: {e}"))),
        ConfigFormat::Json => serde_json::from_str(&expanded)
            .map_err(|e| ScriptError::invalid_config(format!("Failed to parse JSON: {e}"))),
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| ScriptError::invalid_config(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let value = match env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(3) {
                Some(default) => default.as_str().to_string(),
                None => {
                    return Err(ScriptError::invalid_config(format!(
                        "Environment variable '{}' not set and no default provided",
                        var_name.as_str()
                    )));
                }
            },
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);
    Ok(result)
}
