//! # Octopus Remap
//!
//! Attaches scripts to remap rules. A rule line such as
//!
//! ```text
//! map http://a.example http://b.example @plugin=remap @pparam=route.rhai @pparam=tier=gold
//! ```
//!
//! becomes one [`RemapPlugin::new_instance`] call; each request matching the
//! rule calls [`RemapPlugin::do_remap`], which runs the script's `Process`
//! function with `tier=gold` in its options map.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod args;
pub mod config;
pub mod error;
pub mod plugin;
pub mod status;

pub use args::InstanceArgs;
pub use config::RemapConfig;
pub use error::{RemapError, Result};
pub use plugin::{InstanceId, RemapPlugin};
pub use status::RemapStatus;
