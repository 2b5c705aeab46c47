//! Script processors: one configured script handling units of work

use crate::context::{ContextState, ExecutionContext};
use crate::error::Result;
use crate::native_map::{NativeMap, SharedMap};
use crate::runtime::RuntimeGuard;
use crate::source::ScriptSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Script source (inline or file)
    #[serde(flatten)]
    pub source: ScriptSource,

    /// Initial contents of the script's `options` map
    #[serde(default)]
    pub options: NativeMap,
}

impl ProcessorConfig {
    /// Create config for inline script
    pub fn inline<S: Into<String>>(code: S) -> Self {
        Self {
            source: ScriptSource::inline(code),
            options: NativeMap::new(),
        }
    }

    /// Create config for file-based script
    pub fn file<P: Into<std::path::PathBuf>>(path: P) -> Self {
        Self {
            source: ScriptSource::file(path),
            options: NativeMap::new(),
        }
    }

    /// Add an initial option
    pub fn with_option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Replace the initial options
    pub fn with_options(mut self, options: NativeMap) -> Self {
        self.options = options;
        self
    }
}

/// Disposition of one processed unit of work.
///
/// The entry point's return value is reserved; every call currently yields
/// [`ProcessOutcome::NoAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProcessOutcome {
    /// The host should proceed as if no script were configured
    NoAction,
}

/// Invocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Entry point calls
    pub invocations: u64,
    /// Calls that raised
    pub failures: u64,
}

impl ProcessorStats {
    /// Fraction of calls that raised (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.failures as f64 / self.invocations as f64
        }
    }
}

/// A compiled script instance with its options map
pub struct ScriptProcessor {
    context: ExecutionContext,
    options: SharedMap,
    stats: ProcessorStats,
}

impl fmt::Debug for ScriptProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptProcessor")
            .field("script", &self.context.name())
            .field("state", &self.context.state())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ScriptProcessor {
    /// Build a processor: load, compile and run the script, then resolve its
    /// entry point.
    pub fn create(guard: &RuntimeGuard<'_>, config: ProcessorConfig) -> Result<Self> {
        config.source.validate()?;

        let options = config.options.into_shared();
        let mut context = ExecutionContext::new(config.source, options.clone());
        context.initialize(guard)?;

        debug!(script = %context.name(), "Script processor created");
        Ok(Self {
            context,
            options,
            stats: ProcessorStats::default(),
        })
    }

    /// Process one unit of work.
    ///
    /// Script failures are reported through the diagnostic sink and never
    /// reach the caller.
    pub fn process(&mut self, guard: &RuntimeGuard<'_>) -> ProcessOutcome {
        self.stats.invocations += 1;

        match self.context.invoke(guard) {
            Ok(_reserved) => {
                trace!(script = %self.context.name(), "Script processed");
            }
            Err(err) => {
                self.stats.failures += 1;
                guard
                    .diagnostics()
                    .error(Some(self.context.name()), &err.to_string());
            }
        }

        ProcessOutcome::NoAction
    }

    /// Release all engine-side state
    pub fn destroy(self, guard: &RuntimeGuard<'_>) {
        debug!(script = %self.context.name(), "Script processor destroyed");
        self.context.destroy(guard);
    }

    /// The options map shared with the script
    pub fn options(&self) -> &SharedMap {
        &self.options
    }

    /// Read one option
    pub fn option(&self, key: &str) -> Option<String> {
        self.options.lock().get(key).map(str::to_string)
    }

    /// Set one option.
    ///
    /// Must not race a concurrent [`process`](Self::process) call; take the
    /// runtime lock first when other threads may be processing.
    pub fn set_option<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.options.lock().insert(key, value);
    }

    /// Copy of the current options
    pub fn options_snapshot(&self) -> NativeMap {
        self.options.lock().clone()
    }

    /// Script name
    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// Context state
    pub fn state(&self) -> ContextState {
        self.context.state()
    }

    /// Invocation counters
    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = ProcessorConfig::file("/etc/remap/a.rhai")
            .with_option("mode", "fast")
            .with_option("mode", "slow");

        assert_eq!(config.source, ScriptSource::file("/etc/remap/a.rhai"));
        assert_eq!(config.options.get("mode"), Some("slow"));
    }

    #[test]
    fn test_config_deserialize() {
        let yaml = "path: scripts/remap.rhai\noptions:\n  tier: gold\n";
        let config: ProcessorConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.source, ScriptSource::file("scripts/remap.rhai"));
        assert_eq!(config.options.get("tier"), Some("gold"));
    }

    #[test]
    fn test_failure_rate() {
        let stats = ProcessorStats {
            invocations: 4,
            failures: 1,
        };
        assert_eq!(stats.failure_rate(), 0.25);
        assert_eq!(ProcessorStats::default().failure_rate(), 0.0);
    }
}
