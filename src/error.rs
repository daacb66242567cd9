use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Load,
    Predict,
    Save,
    Reset,
    Trend,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Load => "load",
            Stage::Predict => "predict",
            Stage::Save => "save",
            Stage::Reset => "reset",
            Stage::Trend => "trend",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WearError {
    #[error("load: cannot read model from {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("load: model has {found} weights but {expected} feature columns are configured")]
    WeightCount { expected: usize, found: usize },

    #[error("predict: no regression model is loaded")]
    ModelNotLoaded,

    #[error("predict: input is missing required feature columns: {}", .missing.join(", "))]
    FeatureMismatch { missing: Vec<String> },

    #[error("predict: row {row} has non-numeric value {value:?} in column {column:?}")]
    InvalidFeature {
        column: String,
        row: usize,
        value: String,
    },

    #[error("predict: row {row} produced a non-finite wear value")]
    NonFiniteWear { row: usize },

    #[error("input: {0}")]
    InputTable(String),

    #[error("save: invalid session context: {0}")]
    InvalidContext(String),

    #[error("load: history file {} is corrupt: {reason}", .path.display())]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("{stage}: history file {} is not accessible: {source}", .path.display())]
    HistoryIo {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trend: need at least 2 distinct measurement times, found {distinct}")]
    InsufficientData { distinct: usize },
}

impl WearError {
    pub fn stage(&self) -> Stage {
        match self {
            WearError::ModelLoad { .. }
            | WearError::WeightCount { .. }
            | WearError::CorruptRecord { .. } => Stage::Load,
            WearError::ModelNotLoaded
            | WearError::FeatureMismatch { .. }
            | WearError::InvalidFeature { .. }
            | WearError::NonFiniteWear { .. } => Stage::Predict,
            WearError::InputTable(_) => Stage::Input,
            WearError::InvalidContext(_) => Stage::Save,
            WearError::HistoryIo { stage, .. } => *stage,
            WearError::InsufficientData { .. } => Stage::Trend,
        }
    }

    /// Whether the caller can reasonably retry or carry on without aborting the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WearError::ModelNotLoaded
                | WearError::InsufficientData { .. }
                | WearError::HistoryIo { .. }
        )
    }
}
