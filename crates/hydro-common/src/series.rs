//! Domain model for observation series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An observation site. Looked up by `code`; created on first ingestion
/// that encounters a new code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Site code, unique within its network namespace
    pub code: String,
    /// Human-readable site name
    pub name: String,
    /// Network namespace (e.g., "NWISDV")
    pub network: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation above datum in meters, when reported
    pub elevation_m: Option<f64>,
}

impl Site {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            network: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            elevation_m: None,
        }
    }
}

/// An observed variable (what is measured, in which units).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable code, unique within its vocabulary
    pub code: String,
    pub name: String,
    /// Units abbreviation (e.g., "cfs")
    pub units: String,
    /// Data type (e.g., "Average", "Continuous")
    pub data_type: String,
    /// Time support (averaging window) in `time_units`, when reported
    pub time_support: Option<f64>,
    pub time_units: Option<String>,
}

impl Variable {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            units: String::new(),
            data_type: String::new(),
            time_support: None,
            time_units: None,
        }
    }
}

/// A single observed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub value: f64,
    /// Observation timestamp in the service's local time
    pub timestamp: NaiveDateTime,
    /// Qualifier / quality-control code, when reported
    pub qualifier: Option<String>,
}

impl DataValue {
    pub fn new(value: f64, timestamp: NaiveDateTime) -> Self {
        Self {
            value,
            timestamp,
            qualifier: None,
        }
    }
}

/// One (site, variable) time-ordered collection of observed values.
///
/// A `Series` is transient in memory until the repository persists it;
/// the repository assigns its stable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub site: Site,
    pub variable: Variable,
    /// Observation method description, when reported by the service
    pub method: Option<String>,
    /// Originating data source / organization, when reported
    pub source: Option<String>,
    pub values: Vec<DataValue>,
}

impl Series {
    pub fn new(site: Site, variable: Variable) -> Self {
        Self {
            site,
            variable,
            method: None,
            source: None,
            values: Vec::new(),
        }
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn push_value(&mut self, value: DataValue) {
        self.values.push(value);
    }

    /// Earliest timestamp in the series, if any values exist.
    pub fn begin_timestamp(&self) -> Option<NaiveDateTime> {
        self.values.iter().map(|v| v.timestamp).min()
    }

    /// Latest timestamp in the series, if any values exist.
    pub fn end_timestamp(&self) -> Option<NaiveDateTime> {
        self.values.iter().map(|v| v.timestamp).max()
    }

    /// Stable sort by timestamp; equal timestamps keep arrival order.
    pub fn sort_values(&mut self) {
        self.values.sort_by_key(|v| v.timestamp);
    }
}

/// A caller-assigned grouping label attached to series at import time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub description: Option<String>,
}

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn begin_end_timestamps() {
        let mut series = Series::new(Site::new("S1", "Site"), Variable::new("V1", "Flow"));
        series.push_value(DataValue::new(2.0, ts(2, 0)));
        series.push_value(DataValue::new(1.0, ts(1, 0)));
        series.push_value(DataValue::new(3.0, ts(3, 0)));

        assert_eq!(series.begin_timestamp(), Some(ts(1, 0)));
        assert_eq!(series.end_timestamp(), Some(ts(3, 0)));
    }

    #[test]
    fn sort_is_stable_for_equal_timestamps() {
        let mut series = Series::new(Site::new("S1", "Site"), Variable::new("V1", "Flow"));
        series.push_value(DataValue::new(1.0, ts(1, 0)));
        series.push_value(DataValue::new(2.0, ts(1, 0)));
        series.sort_values();

        assert_eq!(series.values[0].value, 1.0);
        assert_eq!(series.values[1].value, 2.0);
    }
}
