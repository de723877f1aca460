//! Decoders for WaterML-style observation response documents.
//!
//! The exchange services report a protocol version when a client is first
//! constructed; that version, not the document content, selects the
//! decoder. Version 1.0 documents carry units as an attribute of the
//! `units` element, 1.1 documents use a nested `unit` element, and the
//! per-value attributes differ slightly between revisions.

mod v1_0;
mod v1_1;

use chrono::NaiveDateTime;
use tracing::debug;

use hydro_common::{HydroError, HydroResult, ProtocolVersion, Series};

/// Parse a raw observation document into its series.
///
/// Dispatches on the protocol version negotiated at fetch time. A document
/// that parses but yields no series is reported as [`HydroError::NoSeries`],
/// a distinct, expected outcome (e.g., no data in the requested range).
/// Documents with more than one series are returned in full.
pub fn parse_document(xml: &[u8], version: ProtocolVersion) -> HydroResult<Vec<Series>> {
    let series = match version {
        ProtocolVersion::V1_0 => v1_0::parse(xml)?,
        ProtocolVersion::V1_1 => v1_1::parse(xml)?,
    };

    if series.is_empty() {
        return Err(HydroError::NoSeries);
    }

    debug!(version = %version, series = series.len(), "Parsed observation document");
    Ok(series)
}

/// Parse a WaterML timestamp. Services emit local times with or without
/// fractional seconds.
pub(crate) fn parse_timestamp(s: &str) -> HydroResult<NaiveDateTime> {
    const FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(parsed);
        }
    }

    Err(HydroError::parse(
        format!("invalid dateTime value '{}'", s),
        anyhow::anyhow!("timestamp does not match any supported format"),
    ))
}

pub(crate) fn parse_value_text(s: &str) -> HydroResult<f64> {
    s.trim().parse::<f64>().map_err(|e| {
        HydroError::parse(format!("invalid data value '{}'", s), e)
    })
}
