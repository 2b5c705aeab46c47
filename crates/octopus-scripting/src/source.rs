//! Script source location

use crate::error::{Result, ScriptError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Script source (inline or file-based)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptSource {
    /// Inline script code
    Inline {
        /// Script code
        code: String,
        /// Optional name for diagnostics
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// File-based script
    File {
        /// Path to script file
        path: PathBuf,
    },
}

impl ScriptSource {
    /// Create inline script source
    pub fn inline<S: Into<String>>(code: S) -> Self {
        Self::Inline {
            code: code.into(),
            name: None,
        }
    }

    /// Create inline script with name
    pub fn inline_named<S: Into<String>, N: Into<String>>(code: S, name: N) -> Self {
        Self::Inline {
            code: code.into(),
            name: Some(name.into()),
        }
    }

    /// Create file-based script source
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self::File { path: path.into() }
    }

    /// Reject sources that cannot possibly load
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::File { path } if path.as_os_str().is_empty() => {
                Err(ScriptError::invalid_config("script path is empty"))
            }
            _ => Ok(()),
        }
    }

    /// Read the script text
    pub fn load(&self) -> Result<String> {
        match self {
            Self::Inline { code, .. } => Ok(code.clone()),
            Self::File { path } => {
                let bytes = std::fs::read(path).map_err(|source| ScriptError::Load {
                    path: path.clone(),
                    source,
                })?;
                String::from_utf8(bytes).map_err(|e| ScriptError::Load {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                })
            }
        }
    }

    /// File path, for file-based sources
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Inline { .. } => None,
        }
    }

    /// Get a descriptive name for this script
    pub fn name(&self) -> String {
        match self {
            Self::Inline { name, .. } => name.clone().unwrap_or_else(|| "inline".to_string()),
            Self::File { path } => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline { .. } => write!(f, "{}", self.name()),
            Self::File { path } => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_names() {
        assert_eq!(ScriptSource::inline("1").name(), "inline");
        assert_eq!(ScriptSource::inline_named("1", "hdr").name(), "hdr");
        assert_eq!(ScriptSource::file("/etc/remap/rewrite.rhai").name(), "rewrite.rhai");
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "fn Process() {{}}").unwrap();

        let source = ScriptSource::file(file.path());
        assert_eq!(source.load().unwrap(), "fn Process() {}");
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let source = ScriptSource::file("/nonexistent/octopus/script.rhai");
        assert!(matches!(source.load(), Err(ScriptError::Load { .. })));
    }

    #[test]
    fn test_empty_path_is_invalid() {
        assert!(matches!(
            ScriptSource::file("").validate(),
            Err(ScriptError::InvalidConfig(_))
        ));
        assert!(ScriptSource::inline("").validate().is_ok());
    }

    #[test]
    fn test_deserialize_untagged() {
        let source: ScriptSource = serde_json::from_str(r#"{"path": "a.rhai"}"#).unwrap();
        assert_eq!(source, ScriptSource::file("a.rhai"));

        let source: ScriptSource = serde_json::from_str(r#"{"code": "1"}"#).unwrap();
        assert_eq!(source, ScriptSource::inline("1"));
    }
}
