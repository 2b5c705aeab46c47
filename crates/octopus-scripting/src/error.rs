//! Script runtime error types

use crate::context::ContextState;
use std::path::PathBuf;

/// Script runtime result type
pub type Result<T, E = ScriptError> = std::result::Result<T, E>;

/// Errors raised by the embedded scripting layer
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Invalid processor or runtime configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Script source could not be read
    #[error("Failed to read script {path:?}: {source}")]
    Load {
        /// Path that was being read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Script failed to parse
    #[error("Script compilation error: {message}{}", format_position(.line, .column))]
    Compilation {
        /// Engine diagnostic text
        message: String,
        /// Line number if available
        line: Option<usize>,
        /// Column number if available
        column: Option<usize>,
    },

    /// Exception raised while running script code
    #[error("Script runtime error: {message}{}", format_position(.line, &None))]
    Runtime {
        /// Exception text
        message: String,
        /// Line where the exception was raised
        line: Option<usize>,
    },

    /// Script did not define a usable entry point
    #[error("Script entry point '{entry_point}' {reason}")]
    MissingEntryPoint {
        /// Name of the function that was looked up
        entry_point: String,
        /// Why the lookup failed
        reason: String,
    },

    /// A map wrapper outlived the map it referenced
    #[error("expired reference")]
    ExpiredReference,

    /// `ScriptRuntime::initialize` was called more than once
    #[error("Script runtime is already initialized")]
    AlreadyInitialized,

    /// The process-wide runtime has not been initialized
    #[error("Script runtime is not initialized")]
    NotInitialized,

    /// The calling thread already holds the runtime lock
    #[error("Script runtime is already entered by the current thread")]
    Reentrant,

    /// Operation requires a ready execution context
    #[error("Execution context is not ready (state: {0})")]
    NotReady(ContextState),

    /// Guard belongs to another runtime than the one that built the context
    #[error("Runtime guard belongs to a different script runtime")]
    ForeignRuntime,
}

fn format_position(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at line {line}, column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

impl ScriptError {
    /// Create a configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a compilation error
    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::Compilation {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
            line: None,
        }
    }

    /// Create a missing entry point error
    pub fn missing_entry_point<N: Into<String>, R: Into<String>>(entry_point: N, reason: R) -> Self {
        Self::MissingEntryPoint {
            entry_point: entry_point.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from script content rather than the host
    pub fn is_script_fault(&self) -> bool {
        matches!(
            self,
            Self::Compilation { .. } | Self::Runtime { .. } | Self::MissingEntryPoint { .. }
        )
    }
}

impl From<rhai::ParseError> for ScriptError {
    fn from(err: rhai::ParseError) -> Self {
        let pos = err.position();
        Self::Compilation {
            message: err.err_type().to_string(),
            line: pos.line(),
            column: pos.position(),
        }
    }
}

impl From<Box<rhai::EvalAltResult>> for ScriptError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        let line = err.position().line();
        Self::Runtime {
            message: exception_text(&err),
            line,
        }
    }
}

/// Extract the text of a script exception.
///
/// Errors raised inside a called function are wrapped by the engine; the
/// innermost thrown value is what the script author wrote.
fn exception_text(err: &rhai::EvalAltResult) -> String {
    use rhai::EvalAltResult as E;

    match err {
        E::ErrorInFunctionCall(_, _, inner, _) => exception_text(inner),
        E::ErrorRuntime(value, _) => value.to_string(),
        other => other.to_string(),
    }
}
