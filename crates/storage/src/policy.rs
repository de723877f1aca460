//! Pure overwrite-policy resolution helpers.
//!
//! Both repository implementations apply the same value-set arithmetic;
//! keeping it here keeps their policy semantics identical.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use hydro_common::DataValue;

/// Normalize an incoming value list before persistence: stable-sort by
/// timestamp, then collapse duplicate timestamps with the last arrival
/// winning (a corrected re-read later in the same document supersedes the
/// earlier reading). The result has strictly increasing timestamps.
pub fn normalize_values(values: &[DataValue]) -> Vec<DataValue> {
    let mut sorted: Vec<DataValue> = values.to_vec();
    sorted.sort_by_key(|v| v.timestamp);

    let mut result: Vec<DataValue> = Vec::with_capacity(sorted.len());
    for value in sorted {
        match result.last_mut() {
            Some(last) if last.timestamp == value.timestamp => *last = value,
            _ => result.push(value),
        }
    }
    result
}

/// Values from `incoming` whose timestamps are not already present in the
/// stored series. Input is expected to be normalized.
pub fn fill_values(existing: &HashSet<NaiveDateTime>, incoming: &[DataValue]) -> Vec<DataValue> {
    incoming
        .iter()
        .filter(|v| !existing.contains(&v.timestamp))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn dv(value: f64, hour: u32) -> DataValue {
        DataValue::new(value, ts(hour))
    }

    #[test]
    fn normalize_sorts_by_timestamp() {
        let values = [dv(3.0, 3), dv(1.0, 1), dv(2.0, 2)];
        let normalized = normalize_values(&values);
        let hours: Vec<f64> = normalized.iter().map(|v| v.value).collect();
        assert_eq!(hours, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn normalize_keeps_last_arrival_for_duplicate_timestamps() {
        let values = [dv(1.0, 1), dv(9.0, 1), dv(2.0, 2)];
        let normalized = normalize_values(&values);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].value, 9.0);
    }

    #[test]
    fn normalized_timestamps_are_strictly_increasing() {
        let values = [dv(1.0, 2), dv(2.0, 1), dv(3.0, 2), dv(4.0, 1)];
        let normalized = normalize_values(&values);
        for pair in normalized.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn fill_skips_existing_timestamps() {
        let existing: HashSet<_> = [ts(1), ts(2)].into_iter().collect();
        let incoming = [dv(5.0, 2), dv(6.0, 3)];
        let filled = fill_values(&existing, &incoming);
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].value, 6.0);
    }
}
