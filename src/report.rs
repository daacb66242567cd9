use std::fmt::Write;

use crate::error::WearError;
use crate::models::{GroupKey, GroupSummary, MeasurementRow, TrendFit};
use crate::trend;

pub fn summarize_by_group(record: &[MeasurementRow]) -> Vec<GroupSummary> {
    let mut summaries: Vec<GroupSummary> = Vec::new();

    for group in trend::groups(record) {
        let rows: Vec<&MeasurementRow> = record.iter().filter(|row| group.matches(row)).collect();
        let total: f64 = rows.iter().map(|row| row.wear_value).sum();
        let max_wear = rows
            .iter()
            .map(|row| row.wear_value)
            .fold(f64::NEG_INFINITY, f64::max);
        let latest_capacity = rows
            .iter()
            .max_by_key(|row| row.timestamp)
            .map(|row| row.capacity_percent)
            .unwrap_or(100);

        summaries.push(GroupSummary {
            count: rows.len(),
            avg_wear: if rows.is_empty() {
                0.0
            } else {
                total / rows.len() as f64
            },
            max_wear,
            latest_capacity,
            group,
        });
    }

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

pub fn build_report(
    filter: Option<&GroupKey>,
    record: &[MeasurementRow],
    trend: &Result<TrendFit, WearError>,
) -> String {
    let selected: Vec<MeasurementRow> = record
        .iter()
        .filter(|row| filter.map_or(true, |group| group.matches(row)))
        .cloned()
        .collect();
    let summaries = summarize_by_group(&selected);

    let mut output = String::new();
    let scope = filter
        .map(|group| group.to_string())
        .unwrap_or_else(|| "all tools".to_string());

    let _ = writeln!(output, "# Tool Wear Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} measurements)",
        scope,
        selected.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Wear by Tool and Material");

    if summaries.is_empty() {
        let _ = writeln!(output, "No measurements saved yet.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} measurements (avg wear {:.1}, max {:.1}, latest capacity {}%)",
                summary.group,
                summary.count,
                summary.avg_wear,
                summary.max_wear,
                summary.latest_capacity
            );
        }
    }

    let mut recent = selected;
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Measurements");

    if recent.is_empty() {
        let _ = writeln!(output, "No measurements saved yet.");
    } else {
        for row in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} {} on {}: wear {:.1} ({}, {}% capacity left)",
                row.timestamp.format("%Y-%m-%d %H:%M"),
                row.tool_type,
                row.material,
                row.wear_value,
                row.severity(),
                row.capacity_percent
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Wear Trend");
    match trend {
        Ok(fit) => {
            let _ = writeln!(
                output,
                "wear = {:.4} x minutes + {:.2} over {} measurements spanning {:.0} minutes",
                fit.slope, fit.intercept, fit.points, fit.span_minutes
            );
        }
        Err(WearError::InsufficientData { .. }) => {
            let _ = writeln!(output, "No trend yet: at least two measurement times are needed.");
        }
        Err(e) => {
            let _ = writeln!(output, "Trend unavailable: {e}");
        }
    }

    output
}
