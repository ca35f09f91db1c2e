use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page-replacement policies understood by the simulator's `-a` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Opt,
    Lru,
    Second,
}

impl Policy {
    pub const ALL: [Policy; 3] = [Policy::Opt, Policy::Lru, Policy::Second];

    /// Identifier passed on the simulator command line.
    pub fn id(&self) -> &'static str {
        match self {
            Policy::Opt => "opt",
            Policy::Lru => "lru",
            Policy::Second => "second",
        }
    }

    /// Label used in chart legends.
    pub fn label(&self) -> &'static str {
        match self {
            Policy::Opt => "OPT",
            Policy::Lru => "LRU",
            Policy::Second => "Second",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Error)]
#[error("unknown policy '{0}' (expected one of: opt, lru, second)")]
pub struct UnknownPolicy(pub String);

impl FromStr for Policy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .into_iter()
            .find(|policy| policy.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}
