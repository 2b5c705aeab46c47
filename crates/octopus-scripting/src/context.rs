//! Per-instance script execution context

use crate::bridge::MapBinding;
use crate::error::{Result, ScriptError};
use crate::native_map::SharedMap;
use crate::runtime::RuntimeGuard;
use crate::source::ScriptSource;
use rhai::{CallFnOptions, Dynamic, Map, Scope, AST};
use std::fmt;
use tracing::debug;

/// Lifecycle of an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created, nothing loaded
    Uninitialized,
    /// Loading, compiling and running top-level code
    Compiling,
    /// Entry point resolved, ready to process
    Ready,
    /// Initialization failed; nothing is retained
    Failed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Compiling => write!(f, "compiling"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Everything that exists only once a script compiled and ran
struct Compiled {
    ast: AST,
    scope: Scope<'static>,
    entry_point: String,
    _options: MapBinding,
}

/// Isolated namespace holding one compiled script
pub struct ExecutionContext {
    runtime_id: u64,
    name: String,
    source: ScriptSource,
    options: SharedMap,
    state: ContextState,
    compiled: Option<Compiled>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("state", &self.state)
            .finish()
    }
}

impl ExecutionContext {
    /// Create an uninitialized context for `source`
    pub fn new(source: ScriptSource, options: SharedMap) -> Self {
        Self {
            runtime_id: 0,
            name: source.name(),
            source,
            options,
            state: ContextState::Uninitialized,
            compiled: None,
        }
    }

    /// Load, compile and run the script, then resolve its entry point.
    ///
    /// Every failure is reported through the runtime's diagnostic sink and
    /// leaves the context `Failed` with no engine state retained.
    pub fn initialize(&mut self, guard: &RuntimeGuard<'_>) -> Result<()> {
        if self.state != ContextState::Uninitialized {
            return Err(ScriptError::NotReady(self.state));
        }

        self.state = ContextState::Compiling;
        debug!(script = %self.name, "Initializing execution context");

        match self.build(guard) {
            Ok(compiled) => {
                self.runtime_id = guard.runtime().id();
                self.compiled = Some(compiled);
                self.state = ContextState::Ready;
                debug!(script = %self.name, "Execution context ready");
                Ok(())
            }
            Err(err) => {
                self.state = ContextState::Failed;
                guard.diagnostics().error(Some(&self.name), &err.to_string());
                Err(err)
            }
        }
    }

    fn build(&self, guard: &RuntimeGuard<'_>) -> Result<Compiled> {
        let config = guard.config();
        let engine = guard.engine();

        let code = self.source.load()?;

        let binding = guard.bridge().wrap(&self.options);
        let mut scope = Scope::new();
        scope.push(config.options_binding.as_str(), binding.handle());

        let mut ast = engine.compile(&code)?;
        ast.set_source(self.name.as_str());

        engine.run_ast_with_scope(&mut scope, &ast)?;

        let entry_point = config.entry_point.clone();
        resolve_entry_point(&ast, &scope, &entry_point)?;

        Ok(Compiled {
            ast,
            scope,
            entry_point,
            _options: binding,
        })
    }

    /// Call the entry point with no arguments and the global object as `this`.
    ///
    /// `this` is a map of the namespace's top-level variables, rebuilt before
    /// each call. Entries the call changes or adds through `this` are written
    /// back as top-level variables; constants are left alone.
    pub fn invoke(&mut self, guard: &RuntimeGuard<'_>) -> Result<Dynamic> {
        let state = self.state;
        let Some(compiled) = self.compiled.as_mut() else {
            return Err(ScriptError::NotReady(state));
        };
        if guard.runtime().id() != self.runtime_id {
            return Err(ScriptError::ForeignRuntime);
        }

        let before = global_object(&compiled.scope);
        let mut this = Dynamic::from_map(before.clone());

        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut this);

        let result = guard.engine().call_fn_with_options::<Dynamic>(
            options,
            &mut compiled.scope,
            &compiled.ast,
            &compiled.entry_point,
            (),
        );

        if let Some(after) = this.try_cast::<Map>() {
            write_back(&mut compiled.scope, &before, after);
        }

        Ok(result?)
    }

    /// Release the compiled script and its map binding
    pub fn destroy(mut self, guard: &RuntimeGuard<'_>) {
        self.compiled = None;
        debug!(
            script = %self.name,
            runtime = guard.runtime().id(),
            "Execution context destroyed"
        );
    }

    /// Current state
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Script name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the script came from
    pub fn source(&self) -> &ScriptSource {
        &self.source
    }

    /// Resolved entry point, once ready
    pub fn entry_point(&self) -> Option<&str> {
        self.compiled.as_ref().map(|c| c.entry_point.as_str())
    }
}

fn global_object(scope: &Scope<'_>) -> Map {
    scope
        .iter()
        .map(|(name, _, value)| (name.into(), value))
        .collect()
}

fn write_back(scope: &mut Scope<'_>, before: &Map, after: Map) {
    for (name, value) in after {
        let unchanged = before
            .get(name.as_str())
            .is_some_and(|old| same_value(old, &value));
        if unchanged || scope.is_constant(name.as_str()) == Some(true) {
            continue;
        }
        scope.set_value(name, value);
    }
}

fn same_value(a: &Dynamic, b: &Dynamic) -> bool {
    a.type_id() == b.type_id() && a.to_string() == b.to_string()
}

fn resolve_entry_point(ast: &AST, scope: &Scope<'_>, name: &str) -> Result<()> {
    let arities: Vec<usize> = ast
        .iter_functions()
        .filter(|f| f.name == name)
        .map(|f| f.params.len())
        .collect();

    if arities.contains(&0) {
        Ok(())
    } else if !arities.is_empty() {
        Err(ScriptError::missing_entry_point(
            name,
            "must be callable without arguments",
        ))
    } else if scope.contains(name) {
        Err(ScriptError::missing_entry_point(name, "is not a function"))
    } else {
        Err(ScriptError::missing_entry_point(name, "is not defined"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::diagnostics::RecordingSink;
    use crate::native_map::NativeMap;
    use crate::runtime::ScriptRuntime;
    use std::sync::Arc;

    fn runtime() -> (ScriptRuntime, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let runtime = ScriptRuntime::new(RuntimeConfig::default(), sink.clone()).unwrap();
        (runtime, sink)
    }

    fn context(code: &str) -> ExecutionContext {
        ExecutionContext::new(
            ScriptSource::inline_named(code, "test.rhai"),
            NativeMap::new().into_shared(),
        )
    }

    #[test]
    fn test_ready_after_initialize() {
        let (runtime, sink) = runtime();
        let mut ctx = context("fn Process() { 1 }");
        assert_eq!(ctx.state(), ContextState::Uninitialized);

        let guard = runtime.lock().unwrap();
        ctx.initialize(&guard).unwrap();

        assert_eq!(ctx.state(), ContextState::Ready);
        assert_eq!(ctx.entry_point(), Some("Process"));
        assert_eq!(ctx.invoke(&guard).unwrap().as_int().unwrap(), 1);
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn test_compile_failure() {
        let (runtime, sink) = runtime();
        let mut ctx = context("fn Process() {");
        let guard = runtime.lock().unwrap();

        let err = ctx.initialize(&guard).unwrap_err();

        assert!(matches!(err, ScriptError::Compilation { .. }));
        assert_eq!(ctx.state(), ContextState::Failed);
        assert_eq!(sink.errors().len(), 1);
        assert_eq!(guard.bridge().live_count(), 0);
    }

    #[test]
    fn test_top_level_exception() {
        let (runtime, sink) = runtime();
        let mut ctx = context(r#"throw "not today"; fn Process() {}"#);
        let guard = runtime.lock().unwrap();

        let err = ctx.initialize(&guard).unwrap_err();

        assert!(matches!(err, ScriptError::Runtime { .. }));
        assert_eq!(ctx.state(), ContextState::Failed);
        assert!(sink.errors()[0].contains("not today"));
    }

    #[test]
    fn test_entry_point_reasons() {
        let (runtime, _) = runtime();
        let guard = runtime.lock().unwrap();

        for (code, reason) in [
            ("let x = 1;", "is not defined"),
            ("let Process = 5;", "is not a function"),
            ("fn Process(a) { a }", "must be callable without arguments"),
        ] {
            let mut ctx = context(code);
            match ctx.initialize(&guard) {
                Err(ScriptError::MissingEntryPoint { reason: r, .. }) => assert_eq!(r, reason),
                other => panic!("unexpected result for {code}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_invoke_before_ready() {
        let (runtime, _) = runtime();
        let mut ctx = context("fn Process() {}");
        let guard = runtime.lock().unwrap();

        assert!(matches!(
            ctx.invoke(&guard),
            Err(ScriptError::NotReady(ContextState::Uninitialized))
        ));
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let (runtime, _) = runtime();
        let mut ctx = context("fn Process() {}");
        let guard = runtime.lock().unwrap();

        ctx.initialize(&guard).unwrap();
        assert!(matches!(
            ctx.initialize(&guard),
            Err(ScriptError::NotReady(ContextState::Ready))
        ));
    }

    #[test]
    fn test_foreign_guard_rejected() {
        let (first, _) = runtime();
        let (second, _) = runtime();
        let mut ctx = context("fn Process() {}");

        ctx.initialize(&first.lock().unwrap()).unwrap();
        let guard = second.lock().unwrap();
        assert!(matches!(ctx.invoke(&guard), Err(ScriptError::ForeignRuntime)));
    }

    #[test]
    fn test_destroy_releases_binding() {
        let (runtime, _) = runtime();
        let mut ctx = context("fn Process() {}");
        let guard = runtime.lock().unwrap();

        ctx.initialize(&guard).unwrap();
        assert_eq!(guard.bridge().live_count(), 1);

        ctx.destroy(&guard);
        assert_eq!(guard.bridge().live_count(), 0);
    }
}
