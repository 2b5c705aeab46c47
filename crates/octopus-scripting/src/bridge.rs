//! Exposing native maps to scripts
//!
//! Scripts never hold a pointer to host data. A wrapper object carries a
//! [`MapHandle`], a slot index plus generation into the runtime's
//! [`ValueBridge`] registry. The registry only keeps weak references, so a
//! wrapper that outlives its map fails with "expired reference" instead of
//! reading freed memory.

use crate::error::{Result, ScriptError};
use crate::native_map::MapAccess;
use parking_lot::Mutex;
use rhai::{Dynamic, Engine, EvalAltResult};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Shared, type-erased map reachable from scripts
pub type MapTarget = Arc<Mutex<dyn MapAccess + Send>>;

type WeakTarget = Weak<Mutex<dyn MapAccess + Send>>;

/// Script type name of map wrappers
pub const MAP_TYPE_NAME: &str = "NativeMap";

/// Script-side reference to a registered map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", MAP_TYPE_NAME, self.index, self.generation)
    }
}

/// Result of a property read through a wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyRead {
    /// Key present
    Found(String),
    /// Key absent from the map
    Missing,
    /// Key is not a plain string; the wrapper does not intercept it
    Passthrough,
}

impl PropertyRead {
    /// The value, if one was found
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    fn into_dynamic(self) -> Dynamic {
        match self {
            Self::Found(value) => value.into(),
            Self::Missing | Self::Passthrough => Dynamic::UNIT,
        }
    }
}

#[derive(Default)]
struct Slot {
    generation: u32,
    target: Option<WeakTarget>,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

/// Registry of maps currently exposed to scripts
#[derive(Default)]
pub struct ValueBridge {
    inner: Mutex<Slots>,
}

impl fmt::Debug for ValueBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBridge")
            .field("live", &self.live_count())
            .finish()
    }
}

impl ValueBridge {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `map` and return a binding that keeps the slot alive.
    ///
    /// Every call yields a distinct handle, even for the same map.
    pub fn wrap<M>(self: &Arc<Self>, map: &Arc<Mutex<M>>) -> MapBinding
    where
        M: MapAccess + Send + 'static,
    {
        let target: MapTarget = map.clone();
        let weak = Arc::downgrade(&target);

        let mut inner = self.inner.lock();
        let index = match inner.free.pop() {
            Some(index) => index,
            None => {
                inner.slots.push(Slot::default());
                (inner.slots.len() - 1) as u32
            }
        };
        let slot = &mut inner.slots[index as usize];
        slot.target = Some(weak);
        let handle = MapHandle {
            index,
            generation: slot.generation,
        };
        inner.live += 1;
        drop(inner);

        trace!(handle = %handle, "Map wrapped");
        MapBinding {
            bridge: Arc::downgrade(self),
            handle,
        }
    }

    /// Resolve a handle back to the native map
    pub fn unwrap(&self, handle: MapHandle) -> Result<MapTarget> {
        let inner = self.inner.lock();
        inner
            .slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.target.as_ref())
            .and_then(Weak::upgrade)
            .ok_or(ScriptError::ExpiredReference)
    }

    /// Read a property through a wrapper
    pub fn get(&self, handle: MapHandle, key: &Dynamic) -> Result<PropertyRead> {
        let Some(key) = property_key(key) else {
            return Ok(PropertyRead::Passthrough);
        };
        let target = self.unwrap(handle)?;
        let map = target.lock();
        Ok(match map.get(&key) {
            Some(value) => PropertyRead::Found(value.to_string()),
            None => PropertyRead::Missing,
        })
    }

    /// Write a property through a wrapper, returning the stored value.
    ///
    /// Assigning `()` removes the key, so a missing value stays missing.
    /// Returns `None` without touching the map when the key is not a plain
    /// string.
    pub fn set(&self, handle: MapHandle, key: &Dynamic, value: &Dynamic) -> Result<Option<String>> {
        let Some(key) = property_key(key) else {
            return Ok(None);
        };
        let target = self.unwrap(handle)?;
        let mut map = target.lock();
        if value.is_unit() {
            map.remove(&key);
            return Ok(None);
        }
        let value = value.to_string();
        map.set(&key, value.clone());
        Ok(Some(value))
    }

    /// Number of registered wrappers
    pub fn live_count(&self) -> usize {
        self.inner.lock().live
    }

    fn release(&self, handle: MapHandle) {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get_mut(handle.index as usize) else {
            return;
        };
        if slot.generation != handle.generation || slot.target.is_none() {
            return;
        }
        slot.target = None;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(handle.index);
        inner.live -= 1;
        trace!(handle = %handle, "Map released");
    }

    /// Register the wrapper type and its indexers with the engine
    pub(crate) fn register(self: &Arc<Self>, engine: &mut Engine) {
        engine.register_type_with_name::<MapHandle>(MAP_TYPE_NAME);
        engine.register_fn("to_string", |handle: &mut MapHandle| handle.to_string());
        engine.register_fn("to_debug", |handle: &mut MapHandle| handle.to_string());

        let bridge = Arc::clone(self);
        engine.register_indexer_get(
            move |handle: &mut MapHandle, key: Dynamic| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
                bridge
                    .get(*handle, &key)
                    .map(PropertyRead::into_dynamic)
                    .map_err(|e| e.to_string().into())
            },
        );

        let bridge = Arc::clone(self);
        engine.register_indexer_set(
            move |handle: &mut MapHandle, key: Dynamic, value: Dynamic| -> std::result::Result<(), Box<EvalAltResult>> {
                bridge
                    .set(*handle, &key, &value)
                    .map(|_| ())
                    .map_err(|e| e.to_string().into())
            },
        );
    }
}

/// Keeps a map registered for as long as a context needs it
#[derive(Debug)]
pub struct MapBinding {
    bridge: Weak<ValueBridge>,
    handle: MapHandle,
}

impl MapBinding {
    /// Script-side handle for this binding
    pub fn handle(&self) -> MapHandle {
        self.handle
    }
}

impl Drop for MapBinding {
    fn drop(&mut self) {
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.release(self.handle);
        }
    }
}

/// String form of a property key, or `None` for keys that are not plain
/// values.
pub fn property_key(key: &Dynamic) -> Option<String> {
    if key.is_string() {
        key.clone().into_string().ok()
    } else if key.is_char() {
        key.as_char().ok().map(String::from)
    } else if key.is_int() {
        key.as_int().ok().map(|v| v.to_string())
    } else if key.is_float() {
        key.as_float().ok().map(|v| v.to_string())
    } else if key.is_bool() {
        key.as_bool().ok().map(|v| v.to_string())
    } else {
        None
    }
}
