//! Remap result codes returned to the host

use octopus_scripting::ProcessOutcome;
use std::fmt;

/// What the host should do with the request after a remap call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemapStatus {
    /// Continue with the remap rule's own mapping
    NoRemap,
    /// The request URL was rewritten
    DidRemap,
    /// No rewrite, and skip remaining remap plugins
    NoRemapStop,
    /// Rewritten, and skip remaining remap plugins
    DidRemapStop,
    /// The remap call itself failed
    Error,
}

impl RemapStatus {
    /// Numeric code understood by the host
    pub fn code(self) -> i32 {
        match self {
            Self::NoRemap => 0,
            Self::DidRemap => 1,
            Self::NoRemapStop => 2,
            Self::DidRemapStop => 3,
            Self::Error => -1,
        }
    }

    /// Whether the request URL was changed
    pub fn did_remap(self) -> bool {
        matches!(self, Self::DidRemap | Self::DidRemapStop)
    }
}

impl From<ProcessOutcome> for RemapStatus {
    fn from(outcome: ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::NoAction => Self::NoRemap,
            _ => Self::NoRemap,
        }
    }
}

impl fmt::Display for RemapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoRemap => "no_remap",
            Self::DidRemap => "did_remap",
            Self::NoRemapStop => "no_remap_stop",
            Self::DidRemapStop => "did_remap_stop",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
