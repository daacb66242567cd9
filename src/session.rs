use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::WearError;
use crate::history::HistoryStore;
use crate::models::{LinearModel, MeasurementRow, SessionContext, StagedRow};
use crate::predict::{predict_features, Predictor};
use crate::table::FeatureTable;
use crate::wear;

/// Predicts and classifies every row of `table` without touching storage.
pub fn stage(
    predictor: &Predictor,
    model: Option<&LinearModel>,
    table: &FeatureTable,
) -> Result<Vec<StagedRow>, WearError> {
    let model = model.ok_or(WearError::ModelNotLoaded)?;
    let features = predictor.extract(table)?;
    let predictions = predict_features(&features, model)?;

    Ok(features
        .into_iter()
        .zip(predictions)
        .map(|(features, wear_value)| {
            let classification = wear::classify(wear_value);
            StagedRow {
                features,
                wear_value,
                capacity_percent: classification.capacity_percent,
                severity: classification.band,
            }
        })
        .collect())
}

/// Stamps every row of one batch with the same context, time, and batch id.
pub fn attach_context(
    rows: &[StagedRow],
    context: &SessionContext,
    timestamp: DateTime<Utc>,
    batch_id: Uuid,
) -> Vec<MeasurementRow> {
    rows.iter()
        .map(|row| MeasurementRow {
            timestamp,
            batch_id: Some(batch_id),
            tool_type: context.tool_type.clone(),
            usage_minutes: context.usage_minutes,
            material: context.material.clone(),
            features: row.features,
            wear_value: row.wear_value,
            capacity_percent: row.capacity_percent,
        })
        .collect()
}

/// Appends `new_rows` after `existing`. No reordering, no deduplication.
pub fn merge(new_rows: Vec<MeasurementRow>, mut existing: Vec<MeasurementRow>) -> Vec<MeasurementRow> {
    existing.extend(new_rows);
    existing
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveSummary {
    pub batch_id: Option<Uuid>,
    pub rows_added: usize,
    pub total_rows: usize,
}

/// One operator session: a working copy of the history plus the batch
/// waiting to be saved.
pub struct Session<'a> {
    store: &'a HistoryStore,
    working: Option<Vec<MeasurementRow>>,
    staged: Vec<StagedRow>,
}

impl<'a> Session<'a> {
    pub fn new(store: &'a HistoryStore) -> Self {
        Self {
            store,
            working: None,
            staged: Vec::new(),
        }
    }

    pub fn stage(
        &mut self,
        predictor: &Predictor,
        model: Option<&LinearModel>,
        table: &FeatureTable,
    ) -> Result<&[StagedRow], WearError> {
        let rows = stage(predictor, model, table)?;
        info!("staged {} predicted rows", rows.len());
        self.staged = rows;
        Ok(&self.staged)
    }

    pub fn staged(&self) -> &[StagedRow] {
        &self.staged
    }

    pub fn record(&mut self) -> Result<&[MeasurementRow], WearError> {
        if self.working.is_none() {
            self.working = Some(self.store.load()?);
        }
        Ok(self.working.as_deref().unwrap_or_default())
    }

    pub fn save(&mut self, context: &SessionContext) -> Result<SaveSummary, WearError> {
        self.save_at(context, Utc::now())
    }

    /// The working copy is only replaced once the store write succeeds.
    pub fn save_at(
        &mut self,
        context: &SessionContext,
        timestamp: DateTime<Utc>,
    ) -> Result<SaveSummary, WearError> {
        let existing = self.record()?.to_vec();
        if self.staged.is_empty() {
            warn!("nothing staged, skipping save");
            return Ok(SaveSummary {
                batch_id: None,
                rows_added: 0,
                total_rows: existing.len(),
            });
        }

        let batch_id = Uuid::new_v4();
        let new_rows = attach_context(&self.staged, context, timestamp, batch_id);
        let rows_added = new_rows.len();
        let combined = merge(new_rows, existing);
        self.store.save(&combined)?;

        let total_rows = combined.len();
        self.working = Some(combined);
        self.staged.clear();
        info!(
            "saved batch {batch_id} ({rows_added} rows) for {} on {}, history now {total_rows} rows",
            context.tool_type, context.material
        );
        Ok(SaveSummary {
            batch_id: Some(batch_id),
            rows_added,
            total_rows,
        })
    }

    pub fn reset(&mut self) -> Result<(), WearError> {
        self.store.reset()?;
        self.working = Some(Vec::new());
        self.staged.clear();
        debug!("session reset");
        Ok(())
    }
}
