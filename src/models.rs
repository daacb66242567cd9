use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WearError;
use crate::wear;

/// Number of feature columns the regression model consumes.
pub const FEATURE_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self { weights, intercept }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn apply(&self, features: &[f64]) -> f64 {
        features
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityBand {
    Lowest,
    Low,
    Moderate,
    Elevated,
    High,
    Critical,
}

impl SeverityBand {
    pub fn label(&self) -> &'static str {
        match self {
            SeverityBand::Lowest => "lowest",
            SeverityBand::Low => "low",
            SeverityBand::Moderate => "moderate",
            SeverityBand::Elevated => "elevated",
            SeverityBand::High => "high",
            SeverityBand::Critical => "critical",
        }
    }
}

impl std::fmt::Display for SeverityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub band: SeverityBand,
    pub capacity_percent: u8,
}

/// A predicted row that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRow {
    pub features: [f64; FEATURE_COUNT],
    pub wear_value: f64,
    pub capacity_percent: u8,
    pub severity: SeverityBand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub tool_type: String,
    pub usage_minutes: f64,
    pub material: String,
}

impl SessionContext {
    pub fn new(
        tool_type: impl Into<String>,
        usage_minutes: f64,
        material: impl Into<String>,
    ) -> Result<Self, WearError> {
        if !usage_minutes.is_finite() || usage_minutes < 0.0 {
            return Err(WearError::InvalidContext(format!(
                "usage duration must be a non-negative number of minutes, got {usage_minutes}"
            )));
        }
        Ok(Self {
            tool_type: tool_type.into(),
            usage_minutes,
            material: material.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub timestamp: DateTime<Utc>,
    pub batch_id: Option<Uuid>,
    pub tool_type: String,
    pub usage_minutes: f64,
    pub material: String,
    pub features: [f64; FEATURE_COUNT],
    pub wear_value: f64,
    pub capacity_percent: u8,
}

impl MeasurementRow {
    pub fn severity(&self) -> SeverityBand {
        wear::severity_band(self.wear_value)
    }

    pub fn group(&self) -> GroupKey {
        GroupKey {
            tool_type: self.tool_type.clone(),
            material: self.material.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub tool_type: String,
    pub material: String,
}

impl GroupKey {
    pub fn new(tool_type: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            tool_type: tool_type.into(),
            material: material.into(),
        }
    }

    pub fn matches(&self, row: &MeasurementRow) -> bool {
        row.tool_type == self.tool_type && row.material == self.material
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", self.tool_type, self.material)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub points: usize,
    pub span_minutes: f64,
}

impl TrendFit {
    pub fn wear_at(&self, minutes: f64) -> f64 {
        self.slope * minutes + self.intercept
    }
}

#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub group: GroupKey,
    pub count: usize,
    pub avg_wear: f64,
    pub max_wear: f64,
    pub latest_capacity: u8,
}
