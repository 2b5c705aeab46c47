//! Shared script runtime and its lock
//!
//! The Rhai engine is a single process-wide resource. Everything that
//! compiles or runs script code takes a [`RuntimeGuard`], obtained from
//! [`ScriptRuntime::lock`], so only one thread is ever inside the engine.

use crate::bridge::ValueBridge;
use crate::config::RuntimeConfig;
use crate::diagnostics::{self, DiagnosticSink};
use crate::error::{Result, ScriptError};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};
use rhai::Engine;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

static GLOBAL_RUNTIME: OnceCell<Arc<ScriptRuntime>> = OnceCell::new();
static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Embedded script engine shared by all processors
pub struct ScriptRuntime {
    id: u64,
    engine: Mutex<Engine>,
    holder: Mutex<Option<ThreadId>>,
    bridge: Arc<ValueBridge>,
    sink: Arc<dyn DiagnosticSink>,
    config: RuntimeConfig,
}

impl fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("id", &self.id)
            .field("bridge", &self.bridge)
            .field("sink", &self.sink)
            .field("config", &self.config)
            .finish()
    }
}

impl ScriptRuntime {
    /// Create a standalone runtime
    pub fn new(config: RuntimeConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        config.validate()?;

        let bridge = Arc::new(ValueBridge::new());
        let mut engine = Engine::new();

        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);
        engine.set_max_expr_depths(config.max_expr_depth, config.max_function_expr_depth);
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(config.max_array_size);
        engine.set_max_map_size(config.max_map_size);

        bridge.register(&mut engine);
        diagnostics::register_functions(&mut engine, Arc::clone(&sink));

        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        debug!(runtime = id, entry_point = %config.entry_point, "Script runtime created");

        Ok(Self {
            id,
            engine: Mutex::new(engine),
            holder: Mutex::new(None),
            bridge,
            sink,
            config,
        })
    }

    /// Create the process-wide runtime.
    ///
    /// Fails with [`ScriptError::AlreadyInitialized`] on a second call; hosts
    /// treat either failure as fatal at startup.
    pub fn initialize(
        config: RuntimeConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Arc<ScriptRuntime>> {
        let mut created = false;
        let runtime = GLOBAL_RUNTIME.get_or_try_init(|| {
            created = true;
            ScriptRuntime::new(config, sink).map(Arc::new)
        })?;

        if !created {
            return Err(ScriptError::AlreadyInitialized);
        }
        Ok(Arc::clone(runtime))
    }

    /// The process-wide runtime
    pub fn global() -> Result<Arc<ScriptRuntime>> {
        GLOBAL_RUNTIME
            .get()
            .cloned()
            .ok_or(ScriptError::NotInitialized)
    }

    /// Acquire exclusive access to the engine for the current thread.
    ///
    /// Calling this again from the thread that already holds the guard
    /// returns [`ScriptError::Reentrant`].
    pub fn lock(&self) -> Result<RuntimeGuard<'_>> {
        let current = thread::current().id();
        if *self.holder.lock() == Some(current) {
            return Err(ScriptError::Reentrant);
        }

        let engine = self.engine.lock();
        *self.holder.lock() = Some(current);
        trace!(runtime = self.id, "Runtime entered");

        Ok(RuntimeGuard {
            runtime: self,
            engine,
        })
    }

    /// Run `f` with the engine locked
    pub fn with_lock<R>(&self, f: impl FnOnce(&RuntimeGuard<'_>) -> R) -> Result<R> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Whether the current thread holds the lock
    pub fn is_entered(&self) -> bool {
        *self.holder.lock() == Some(thread::current().id())
    }

    /// Runtime id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Value bridge registry
    pub fn bridge(&self) -> &Arc<ValueBridge> {
        &self.bridge
    }

    /// Diagnostic sink
    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

/// Proof that the current thread is inside the engine
pub struct RuntimeGuard<'rt> {
    runtime: &'rt ScriptRuntime,
    engine: MutexGuard<'rt, Engine>,
}

impl<'rt> RuntimeGuard<'rt> {
    /// The locked engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The runtime this guard belongs to
    pub fn runtime(&self) -> &'rt ScriptRuntime {
        self.runtime
    }

    /// Value bridge registry
    pub fn bridge(&self) -> &Arc<ValueBridge> {
        &self.runtime.bridge
    }

    /// Diagnostic sink
    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.runtime.sink.as_ref()
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.runtime.config
    }
}

impl fmt::Debug for RuntimeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeGuard")
            .field("runtime", &self.runtime.id)
            .finish()
    }
}

impl Drop for RuntimeGuard<'_> {
    fn drop(&mut self) {
        *self.runtime.holder.lock() = None;
        trace!(runtime = self.runtime.id, "Runtime exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::TracingSink;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::AtomicUsize;

    fn runtime() -> ScriptRuntime {
        ScriptRuntime::new(RuntimeConfig::default(), Arc::new(TracingSink)).unwrap()
    }

    #[test]
    fn test_with_lock_runs_and_releases() {
        let runtime = runtime();

        let value = runtime
            .with_lock(|guard| guard.engine().eval::<i64>("40 + 2").unwrap())
            .unwrap();

        assert_eq!(value, 42);
        assert!(!runtime.is_entered());
    }

    #[test]
    fn test_reentrant_lock_is_rejected() {
        let runtime = runtime();

        let nested = runtime
            .with_lock(|_| {
                assert!(runtime.is_entered());
                runtime.with_lock(|_| ()).map(|_| ())
            })
            .unwrap();

        assert!(matches!(nested, Err(ScriptError::Reentrant)));
        assert!(runtime.with_lock(|_| ()).is_ok());
    }

    #[test]
    fn test_lock_released_after_panic() {
        let runtime = runtime();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = runtime.with_lock(|_| panic!("host bug"));
        }));

        assert!(result.is_err());
        assert!(!runtime.is_entered());
        assert!(runtime.lock().is_ok());
    }

    #[test]
    fn test_threads_serialize() {
        let runtime = Arc::new(runtime());
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let runtime = Arc::clone(&runtime);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..25 {
                        runtime
                            .with_lock(|_| {
                                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                                thread::yield_now();
                                inside.fetch_sub(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RuntimeConfig::default().with_entry_point("");
        let result = ScriptRuntime::new(config, Arc::new(TracingSink));
        assert!(matches!(result, Err(ScriptError::InvalidConfig(_))));
    }

    #[test]
    fn test_runtime_ids_are_unique() {
        assert_ne!(runtime().id(), runtime().id());
    }
}
