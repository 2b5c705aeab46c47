//! Remap plugin lifecycle

use crate::args::InstanceArgs;
use crate::config::RemapConfig;
use crate::error::Result;
use crate::status::RemapStatus;
use dashmap::DashMap;
use octopus_scripting::{
    DiagnosticSink, NativeMap, ProcessorConfig, ScriptProcessor, ScriptRuntime,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Opaque handle for one remap rule's script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hosts script processors for remap rules.
///
/// Each rule gets its own [`ScriptProcessor`]; all of them share one
/// [`ScriptRuntime`], so every engine call is made under its lock. Lock order
/// is runtime lock, then instance table entry.
pub struct RemapPlugin {
    runtime: Arc<ScriptRuntime>,
    config: RemapConfig,
    instances: DashMap<InstanceId, ScriptProcessor>,
    next_id: AtomicU64,
}

impl RemapPlugin {
    /// Initialize the process-wide runtime and the plugin around it.
    ///
    /// Fails if the runtime was already initialized.
    pub fn init(config: RemapConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        config.runtime.validate()?;
        let runtime = ScriptRuntime::initialize(config.runtime.clone(), sink)?;
        info!(runtime = runtime.id(), "Remap plugin initialized");
        Ok(Self::with_runtime(runtime, config))
    }

    /// Build a plugin on an existing runtime.
    ///
    /// The runtime's own settings apply; `config.runtime` is ignored.
    pub fn with_runtime(runtime: Arc<ScriptRuntime>, config: RemapConfig) -> Self {
        Self {
            runtime,
            config,
            instances: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create an instance from a script path and seed options
    pub fn create_instance(&self, script_path: &str, options: NativeMap) -> Result<InstanceId> {
        let path = self.config.resolve_script_path(script_path)?;
        let processor_config = ProcessorConfig::file(path).with_options(options);

        let processor = self
            .runtime
            .with_lock(|guard| ScriptProcessor::create(guard, processor_config))??;

        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(instance = %id, script = %processor.name(), "Remap instance created");
        self.instances.insert(id, processor);
        Ok(id)
    }

    /// Create an instance from remap rule arguments
    pub fn new_instance<S: AsRef<str>>(&self, args: &[S]) -> Result<InstanceId> {
        let args = InstanceArgs::parse(args)?;
        debug!(from = %args.from_url, to = %args.to_url, "Creating remap instance");
        self.create_instance(&args.script, args.options)
    }

    /// Destroy an instance.
    ///
    /// Returns `false` when the id is unknown.
    pub fn delete_instance(&self, id: InstanceId) -> bool {
        let deleted = self.runtime.with_lock(|guard| match self.instances.remove(&id) {
            Some((_, processor)) => {
                processor.destroy(guard);
                true
            }
            None => false,
        });

        match deleted {
            Ok(true) => {
                info!(instance = %id, "Remap instance deleted");
                true
            }
            Ok(false) => {
                warn!(instance = %id, "Delete requested for unknown remap instance");
                false
            }
            Err(err) => {
                error!(instance = %id, error = %err, "Failed to delete remap instance");
                false
            }
        }
    }

    /// Run the instance's entry point for one request
    pub fn do_remap(&self, id: InstanceId) -> RemapStatus {
        let outcome = self.runtime.with_lock(|guard| {
            self.instances
                .get_mut(&id)
                .map(|mut processor| processor.process(guard))
        });

        match outcome {
            Ok(Some(outcome)) => outcome.into(),
            Ok(None) => {
                warn!(instance = %id, "Remap requested for unknown instance");
                RemapStatus::NoRemap
            }
            Err(err) => {
                error!(instance = %id, error = %err, "Remap failed");
                RemapStatus::NoRemap
            }
        }
    }

    /// [`do_remap`](Self::do_remap) on the blocking thread pool
    pub async fn do_remap_async(self: Arc<Self>, id: InstanceId) -> RemapStatus {
        match tokio::task::spawn_blocking(move || self.do_remap(id)).await {
            Ok(status) => status,
            Err(err) => {
                error!(instance = %id, error = %err, "Remap task failed");
                RemapStatus::Error
            }
        }
    }

    /// Copy of an instance's current options
    pub fn instance_options(&self, id: InstanceId) -> Option<NativeMap> {
        self.instances
            .get(&id)
            .map(|processor| processor.options_snapshot())
    }

    /// Set one option on an instance; returns `false` for unknown ids
    pub fn set_instance_option<K: Into<String>, V: Into<String>>(
        &self,
        id: InstanceId,
        key: K,
        value: V,
    ) -> Result<bool> {
        let updated = self.runtime.with_lock(|_guard| {
            self.instances
                .get(&id)
                .map(|processor| processor.set_option(key, value))
                .is_some()
        })?;
        Ok(updated)
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// The shared runtime
    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.runtime
    }

    /// Plugin configuration
    pub fn config(&self) -> &RemapConfig {
        &self.config
    }

    /// Destroy every instance
    pub fn shutdown(&self) -> Result<()> {
        self.runtime.with_lock(|guard| {
            let ids: Vec<InstanceId> = self.instances.iter().map(|entry| *entry.key()).collect();
            for id in ids {
                if let Some((_, processor)) = self.instances.remove(&id) {
                    processor.destroy(guard);
                }
            }
        })?;
        info!("Remap plugin shut down");
        Ok(())
    }
}

impl fmt::Debug for RemapPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemapPlugin")
            .field("runtime", &self.runtime.id())
            .field("config", &self.config)
            .field("instances", &self.instances.len())
            .finish()
    }
}

impl Drop for RemapPlugin {
    fn drop(&mut self) {
        if self.instances.is_empty() {
            return;
        }
        if let Err(err) = self.shutdown() {
            error!(error = %err, "Failed to release remap instances");
        }
    }
}
