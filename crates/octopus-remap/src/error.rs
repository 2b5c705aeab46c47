//! Remap instance error types

use octopus_scripting::ScriptError;

/// Result type alias using [`RemapError`]
pub type Result<T, E = RemapError> = std::result::Result<T, E>;

/// Failures surfaced to the host when managing remap instances
#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    /// Missing or malformed instance configuration
    #[error("Invalid remap configuration: {0}")]
    InvalidConfig(String),

    /// Script file could not be read
    #[error("Failed to load script: {0}")]
    ScriptLoad(String),

    /// Script failed to parse
    #[error("Failed to compile script: {0}")]
    Compile(String),

    /// Script has no usable entry point
    #[error("{0}")]
    MissingEntryPoint(String),

    /// Script raised while running its top-level code
    #[error("Script failed during initialization: {0}")]
    ScriptRuntime(String),

    /// Runtime lock or initialization failure
    #[error("Script runtime error: {0}")]
    Runtime(#[source] ScriptError),
}

impl RemapError {
    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl From<ScriptError> for RemapError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::InvalidConfig(message) => Self::InvalidConfig(message),
            err @ ScriptError::Load { .. } => Self::ScriptLoad(err.to_string()),
            err @ ScriptError::Compilation { .. } => Self::Compile(err.to_string()),
            err @ ScriptError::MissingEntryPoint { .. } => Self::MissingEntryPoint(err.to_string()),
            err @ ScriptError::Runtime { .. } => Self::ScriptRuntime(err.to_string()),
            other => Self::Runtime(other),
        }
    }
}
