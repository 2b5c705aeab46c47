//! Remap rule argument parsing

use crate::error::{RemapError, Result};
use octopus_scripting::NativeMap;

/// Arguments from a remap rule line.
///
/// Layout: `from_url to_url script [key=value ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceArgs {
    /// Rule source URL
    pub from_url: String,
    /// Rule target URL
    pub to_url: String,
    /// Script path as written in the rule
    pub script: String,
    /// Options seeded into the instance map
    pub options: NativeMap,
}

impl InstanceArgs {
    /// Parse rule arguments
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        if args.len() < 3 {
            return Err(RemapError::invalid_config(
                "missing script argument (expected: from_url to_url script [key=value ...])",
            ));
        }

        let script = args[2].as_ref().trim();
        if script.is_empty() {
            return Err(RemapError::invalid_config("script file is required"));
        }

        let options = Self::parse_options(&args[3..])?;

        Ok(Self {
            from_url: args[0].as_ref().to_string(),
            to_url: args[1].as_ref().to_string(),
            script: script.to_string(),
            options,
        })
    }

    /// Parse `key=value` pairs into an options map.
    ///
    /// Values may contain `=`; keys may not be empty.
    pub fn parse_options<S: AsRef<str>>(pairs: &[S]) -> Result<NativeMap> {
        pairs
            .iter()
            .map(|pair| parse_option(pair.as_ref()))
            .collect()
    }
}

fn parse_option(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(RemapError::invalid_config(format!(
            "invalid option '{}' (expected key=value)",
            arg
        ))),
    }
}
