//! Overwrite policy for series that collide with an existing (site, variable) pair.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HydroError;

/// Conflict-resolution rule applied when an incoming series collides with
/// an existing one for the same (site, variable) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverwritePolicy {
    /// Leave the existing series untouched; save nothing.
    Skip,
    /// Insert only values at timestamps the stored series does not have.
    Fill,
    /// Replace the stored series' values entirely with the incoming set.
    Overwrite,
    /// Persist the incoming series as a new, independent series.
    Copy,
}

impl OverwritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverwritePolicy::Skip => "Skip",
            OverwritePolicy::Fill => "Fill",
            OverwritePolicy::Overwrite => "Overwrite",
            OverwritePolicy::Copy => "Copy",
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverwritePolicy {
    type Err = HydroError;

    /// Parse a persisted policy name. "Append" is accepted as the
    /// historical spelling of `Fill`. Unknown names are rejected rather
    /// than defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverwritePolicy::Skip),
            "fill" | "append" => Ok(OverwritePolicy::Fill),
            "overwrite" => Ok(OverwritePolicy::Overwrite),
            "copy" => Ok(OverwritePolicy::Copy),
            _ => Err(HydroError::UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_name() {
        for policy in [
            OverwritePolicy::Skip,
            OverwritePolicy::Fill,
            OverwritePolicy::Overwrite,
            OverwritePolicy::Copy,
        ] {
            let parsed: OverwritePolicy = policy.as_str().parse().unwrap();
            assert_eq!(parsed, policy);
        }
    }

    #[test]
    fn append_is_an_alias_for_fill() {
        let parsed: OverwritePolicy = "Append".parse().unwrap();
        assert_eq!(parsed, OverwritePolicy::Fill);
    }

    #[test]
    fn parse_is_case_insensitive() {
        let parsed: OverwritePolicy = "overwrite".parse().unwrap();
        assert_eq!(parsed, OverwritePolicy::Overwrite);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = "Merge".parse::<OverwritePolicy>();
        assert!(matches!(result, Err(HydroError::UnknownPolicy(s)) if s == "Merge"));
    }
}
