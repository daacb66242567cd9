use log::debug;

use crate::error::WearError;
use crate::models::{GroupKey, MeasurementRow, TrendFit};

/// Fits wear against minutes elapsed since the earliest selected row.
///
/// `filter` narrows the record to one tool/material pair; `None` uses every
/// row. At least two distinct elapsed times are needed for a line.
pub fn fit(record: &[MeasurementRow], filter: Option<&GroupKey>) -> Result<TrendFit, WearError> {
    let selected: Vec<&MeasurementRow> = record
        .iter()
        .filter(|row| filter.map_or(true, |group| group.matches(row)))
        .collect();

    let points = elapsed_points(&selected);
    let distinct = distinct_elapsed(&points);
    if distinct < 2 {
        return Err(WearError::InsufficientData { distinct });
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in points.iter() {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }

    if sxx <= 0.0 {
        return Err(WearError::InsufficientData { distinct: 1 });
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let span_minutes = points.iter().map(|(x, _)| *x).fold(0.0, f64::max);

    debug!(
        "trend over {} rows: slope {slope:.4}, intercept {intercept:.4}",
        points.len()
    );
    Ok(TrendFit {
        slope,
        intercept,
        points: points.len(),
        span_minutes,
    })
}

/// Distinct tool/material pairs in order of first appearance.
pub fn groups(record: &[MeasurementRow]) -> Vec<GroupKey> {
    let mut seen: Vec<GroupKey> = Vec::new();
    for row in record {
        if !seen.iter().any(|group| group.matches(row)) {
            seen.push(row.group());
        }
    }
    seen
}

fn distinct_elapsed(points: &[(f64, f64)]) -> usize {
    let mut minutes: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    minutes.sort_by(f64::total_cmp);
    minutes.dedup();
    minutes.len()
}

fn elapsed_points(rows: &[&MeasurementRow]) -> Vec<(f64, f64)> {
    let Some(start) = rows.iter().map(|row| row.timestamp).min() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            let elapsed = row.timestamp - start;
            let minutes = elapsed
                .num_nanoseconds()
                .map(|nanos| nanos as f64 / 60_000_000_000.0)
                .unwrap_or_else(|| elapsed.num_seconds() as f64 / 60.0);
            (minutes, row.wear_value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn row_at(minutes: i64, wear_value: f64, tool_type: &str, material: &str) -> MeasurementRow {
        let start = Utc.with_ymd_and_hms(2026, 5, 11, 7, 30, 0).unwrap();
        MeasurementRow {
            timestamp: start + Duration::minutes(minutes),
            batch_id: None,
            tool_type: tool_type.to_string(),
            usage_minutes: minutes as f64,
            material: material.to_string(),
            features: [0.0, 0.0],
            wear_value,
            capacity_percent: crate::wear::capacity_percent(wear_value),
        }
    }

    #[test]
    fn recovers_known_line() {
        let record: Vec<_> = [0, 15, 30, 45, 90]
            .iter()
            .map(|&m| row_at(m, 2.0 * m as f64 + 10.0, "drill", "steel"))
            .collect();
        let trend = fit(&record, None).unwrap();
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 10.0).abs() < 1e-9);
        assert_eq!(trend.points, 5);
        assert!((trend.span_minutes - 90.0).abs() < 1e-9);
        assert!((trend.wear_at(100.0) - 210.0).abs() < 1e-6);
    }

    #[test]
    fn single_timestamp_is_insufficient() {
        let record = vec![
            row_at(5, 40.0, "drill", "steel"),
            row_at(5, 60.0, "drill", "steel"),
        ];
        let err = fit(&record, None).unwrap_err();
        assert!(matches!(err, WearError::InsufficientData { distinct: 1 }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn sub_microsecond_spread_still_fits() {
        let first = row_at(0, 40.0, "drill", "steel");
        let mut second = row_at(0, 60.0, "drill", "steel");
        second.timestamp += Duration::nanoseconds(300);

        let trend = fit(&[first, second], None).unwrap();
        assert!(trend.slope.is_finite());
        assert!(trend.intercept.is_finite());
        assert!((trend.intercept - 40.0).abs() < 1e-6);
        assert_eq!(trend.points, 2);
    }

    #[test]
    fn fit_never_returns_nan() {
        let mut record = vec![row_at(0, 40.0, "drill", "steel")];
        for nanos in [1, 2, 300, 999] {
            let mut row = row_at(0, 40.0 + nanos as f64, "drill", "steel");
            row.timestamp += Duration::nanoseconds(nanos);
            record.push(row);
        }
        match fit(&record, None) {
            Ok(trend) => assert!(trend.slope.is_finite() && trend.intercept.is_finite()),
            Err(e) => assert!(matches!(e, WearError::InsufficientData { .. })),
        }
    }

    #[test]
    fn empty_selection_is_insufficient() {
        let record = vec![row_at(0, 40.0, "drill", "steel")];
        let filter = GroupKey::new("mill", "aluminium");
        assert!(matches!(
            fit(&record, Some(&filter)),
            Err(WearError::InsufficientData { distinct: 0 })
        ));
    }

    #[test]
    fn filter_restricts_to_one_group() {
        let record = vec![
            row_at(0, 10.0, "drill", "steel"),
            row_at(10, 999.0, "mill", "steel"),
            row_at(20, 20.0, "drill", "steel"),
            row_at(30, 1.0, "drill", "brass"),
            row_at(40, 30.0, "drill", "steel"),
        ];
        let trend = fit(&record, Some(&GroupKey::new("drill", "steel"))).unwrap();
        assert_eq!(trend.points, 3);
        assert!((trend.slope - 0.5).abs() < 1e-9);
        assert!((trend.intercept - 10.0).abs() < 1e-9);
    }

    #[test]
    fn elapsed_time_starts_at_earliest_row() {
        let record = vec![
            row_at(60, 130.0, "drill", "steel"),
            row_at(30, 70.0, "drill", "steel"),
        ];
        let trend = fit(&record, None).unwrap();
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 70.0).abs() < 1e-9);
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let record = vec![
            row_at(0, 1.0, "mill", "steel"),
            row_at(1, 1.0, "drill", "steel"),
            row_at(2, 1.0, "mill", "steel"),
        ];
        assert_eq!(
            groups(&record),
            vec![GroupKey::new("mill", "steel"), GroupKey::new("drill", "steel")]
        );
    }
}
