//! Diagnostic reporting for scripts and the runtime

use parking_lot::Mutex;
use rhai::{Dynamic, Engine, ImmutableString, NativeCallContext};
use std::fmt;
use std::sync::Arc;

/// Log target used for script-originated diagnostics
pub const SCRIPT_LOG_TARGET: &str = "octopus_scripting::script";

/// Receiver of diagnostic reports.
///
/// Scripts reach it through the `debug` and `error` globals; the runtime
/// uses it to report compile and runtime failures.
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    /// Report a debug message
    fn debug(&self, script: Option<&str>, message: &str);

    /// Report an error message
    fn error(&self, script: Option<&str>, message: &str);
}

/// Sink forwarding reports to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn debug(&self, script: Option<&str>, message: &str) {
        tracing::debug!(
            target: SCRIPT_LOG_TARGET,
            script = script.unwrap_or("<unknown>"),
            "{}",
            message
        );
    }

    fn error(&self, script: Option<&str>, message: &str) {
        tracing::error!(
            target: SCRIPT_LOG_TARGET,
            script = script.unwrap_or("<unknown>"),
            "{}",
            message
        );
    }
}

/// Severity of a recorded report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    /// `debug` report
    Debug,
    /// `error` report
    Error,
}

/// A captured report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Severity
    pub level: ReportLevel,
    /// Script that produced it, if known
    pub script: Option<String>,
    /// Message text
    pub message: String,
}

/// Sink that keeps reports in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Report>>,
}

impl RecordingSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports so far
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    /// Messages reported at `level`
    pub fn messages(&self, level: ReportLevel) -> Vec<String> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Error messages reported so far
    pub fn errors(&self) -> Vec<String> {
        self.messages(ReportLevel::Error)
    }

    /// Debug messages reported so far
    pub fn debugs(&self) -> Vec<String> {
        self.messages(ReportLevel::Debug)
    }

    /// Drop all recorded reports
    pub fn clear(&self) {
        self.reports.lock().clear();
    }

    fn push(&self, level: ReportLevel, script: Option<&str>, message: &str) {
        self.reports.lock().push(Report {
            level,
            script: script.map(str::to_string),
            message: message.to_string(),
        });
    }
}

impl DiagnosticSink for RecordingSink {
    fn debug(&self, script: Option<&str>, message: &str) {
        self.push(ReportLevel::Debug, script, message);
    }

    fn error(&self, script: Option<&str>, message: &str) {
        self.push(ReportLevel::Error, script, message);
    }
}

/// Install the `debug`, `error` and `print` globals.
///
/// A single string argument is forwarded; any other argument type or count
/// is accepted and ignored so a sloppy log call never aborts a script.
pub(crate) fn register_functions(engine: &mut Engine, sink: Arc<dyn DiagnosticSink>) {
    // `debug` is special-cased by the engine: the function result is handed
    // to the on_debug callback. Overriding the string form forwards the raw
    // text; the callback itself discards everything.
    engine.on_debug(|_, _, _| {});

    let print_sink = Arc::clone(&sink);
    engine.on_print(move |text| print_sink.debug(None, text));

    let debug_sink = Arc::clone(&sink);
    engine.register_fn(
        "debug",
        move |ctx: NativeCallContext, message: &str| -> ImmutableString {
            debug_sink.debug(ctx.call_source(), message);
            message.into()
        },
    );
    engine.register_fn("debug", || -> ImmutableString { ImmutableString::new() });
    engine.register_fn("debug", |_: Dynamic| -> ImmutableString { ImmutableString::new() });
    engine.register_fn("debug", |_: Dynamic, _: Dynamic| -> ImmutableString {
        ImmutableString::new()
    });
    engine.register_fn(
        "debug",
        |_: Dynamic, _: Dynamic, _: Dynamic| -> ImmutableString { ImmutableString::new() },
    );

    let error_sink = Arc::clone(&sink);
    engine.register_fn("error", move |ctx: NativeCallContext, message: &str| {
        error_sink.error(ctx.call_source(), message);
    });
    engine.register_fn("error", || {});
    engine.register_fn("error", |_: Dynamic| {});
    engine.register_fn("error", |_: Dynamic, _: Dynamic| {});
    engine.register_fn("error", |_: Dynamic, _: Dynamic, _: Dynamic| {});
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(sink: &Arc<RecordingSink>) -> Engine {
        let mut engine = Engine::new();
        register_functions(&mut engine, sink.clone());
        engine
    }

    #[test]
    fn test_string_arguments_are_forwarded() {
        let sink = Arc::new(RecordingSink::new());
        let engine = engine_with(&sink);

        engine.run(r#"debug("hello"); error("failed");"#).unwrap();

        assert_eq!(sink.debugs(), vec!["hello".to_string()]);
        assert_eq!(sink.errors(), vec!["failed".to_string()]);
    }

    #[test]
    fn test_other_arities_are_ignored() {
        let sink = Arc::new(RecordingSink::new());
        let engine = engine_with(&sink);

        engine
            .run(r#"debug(); debug(42); debug("a", "b"); error(); error(1); error("a", 2, 3);"#)
            .unwrap();

        assert!(sink.reports().is_empty());
    }

    #[test]
    fn test_print_goes_to_debug() {
        let sink = Arc::new(RecordingSink::new());
        let engine = engine_with(&sink);

        engine.run(r#"print("from print");"#).unwrap();

        assert_eq!(sink.debugs(), vec!["from print".to_string()]);
    }

    #[test]
    fn test_source_is_attached() {
        let sink = Arc::new(RecordingSink::new());
        let engine = engine_with(&sink);

        let mut ast = engine
            .compile(r#"fn Process() { debug("inside"); } error("oops"); Process();"#)
            .unwrap();
        ast.set_source("remap.rhai");
        engine.run_ast(&ast).unwrap();

        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].script.as_deref(), Some("remap.rhai"));
        assert_eq!(reports[1].level, ReportLevel::Debug);
        assert_eq!(reports[1].script.as_deref(), Some("remap.rhai"));
    }
}
