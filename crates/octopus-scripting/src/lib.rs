//! # Octopus Scripting Runtime
//!
//! Embeds a Rhai engine in the host so external script files can process
//! units of work (one request, one remap decision) without rebuilding the
//! host.
//!
//! ## Pieces
//!
//! - [`ScriptRuntime`] - the single shared engine and its lock
//! - [`ValueBridge`] - native maps exposed to scripts as `NativeMap` objects
//! - [`ExecutionContext`] - one isolated namespace per configured script
//! - [`ScriptProcessor`] - create/process/destroy orchestration
//!
//! ## Script contract
//!
//! ```text
//! // top-level code runs once when the processor is created
//! let tier = options["tier"];
//!
//! // called once per unit of work; top-level variables stay visible
//! fn Process() {
//!     if type_of(options["seen"]) == "()" {
//!         debug("first request for " + tier);
//!     }
//!     options["seen"] = "yes";
//!     options["stale"] = ();     // assigning () removes the key
//!     this.requests = (this.requests ?? 0) + 1;
//! }
//! ```
//!
//! Inside the entry point `this` is the namespace's global object: a map of
//! the top-level variables, where new or changed entries become top-level
//! variables after the call. `debug(msg)` and `error(msg)` forward to the
//! host's diagnostic sink.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod bridge;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod native_map;
pub mod processor;
pub mod runtime;
pub mod source;

pub use bridge::{MapBinding, MapHandle, PropertyRead, ValueBridge};
pub use config::{ConfigFormat, RuntimeConfig};
pub use context::{ContextState, ExecutionContext};
pub use diagnostics::{DiagnosticSink, RecordingSink, ReportLevel, TracingSink};
pub use error::{Result, ScriptError};
pub use native_map::{MapAccess, NativeMap, SharedMap};
pub use processor::{ProcessOutcome, ProcessorConfig, ProcessorStats, ScriptProcessor};
pub use runtime::{RuntimeGuard, ScriptRuntime};
pub use source::ScriptSource;

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::native_map::{NativeMap, SharedMap};
    pub use crate::processor::{ProcessOutcome, ProcessorConfig, ScriptProcessor};
    pub use crate::runtime::{RuntimeGuard, ScriptRuntime};
    pub use crate::source::ScriptSource;
    pub use crate::{Result, ScriptError};
}
