//! Protocol version tag for the observation exchange services.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HydroError, HydroResult};

/// Schema revision of a fetched observation document.
///
/// Parsed once from the version string the service reports, then used as
/// the decoder dispatch key. A closed tag avoids the fragile floating-point
/// equality the version check would otherwise need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1_0,
    V1_1,
}

impl ProtocolVersion {
    /// Parse a reported version string. Only revisions of the supported
    /// document family are accepted; anything else is an error, never a
    /// silent fallback.
    pub fn parse(s: &str) -> HydroResult<Self> {
        match s.trim() {
            "1.0" => Ok(ProtocolVersion::V1_0),
            "1.1" => Ok(ProtocolVersion::V1_1),
            other => Err(HydroError::UnsupportedVersion(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1_0 => "1.0",
            ProtocolVersion::V1_1 => "1.1",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
