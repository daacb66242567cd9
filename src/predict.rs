use log::debug;

use crate::error::WearError;
use crate::models::{LinearModel, FEATURE_COUNT};
use crate::table::FeatureTable;

#[derive(Debug, Clone)]
pub struct Predictor {
    features: [String; FEATURE_COUNT],
}

impl Predictor {
    /// `features` must be in the order the model was trained with.
    pub fn new(features: [String; FEATURE_COUNT]) -> Self {
        Self { features }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn extract(&self, table: &FeatureTable) -> Result<Vec<[f64; FEATURE_COUNT]>, WearError> {
        let mut indices = [0usize; FEATURE_COUNT];
        let mut missing = Vec::new();
        for (slot, name) in indices.iter_mut().zip(self.features.iter()) {
            match table.column_index(name) {
                Some(index) => *slot = index,
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(WearError::FeatureMismatch { missing });
        }

        let mut values = Vec::with_capacity(table.len());
        for (row_number, row) in table.rows().iter().enumerate() {
            let mut features = [0.0; FEATURE_COUNT];
            for (i, &index) in indices.iter().enumerate() {
                let raw = row.get(index).map(String::as_str).unwrap_or("");
                features[i] = parse_feature(raw).ok_or_else(|| WearError::InvalidFeature {
                    column: self.features[i].clone(),
                    row: row_number + 1,
                    value: raw.to_string(),
                })?;
            }
            values.push(features);
        }
        Ok(values)
    }

    /// One wear value per row, in row order. Any bad row fails the whole batch.
    pub fn predict(
        &self,
        table: &FeatureTable,
        model: Option<&LinearModel>,
    ) -> Result<Vec<f64>, WearError> {
        let model = model.ok_or(WearError::ModelNotLoaded)?;
        let features = self.extract(table)?;
        predict_features(&features, model)
    }
}

pub fn predict_features(
    features: &[[f64; FEATURE_COUNT]],
    model: &LinearModel,
) -> Result<Vec<f64>, WearError> {
    if model.weights().len() != FEATURE_COUNT {
        return Err(WearError::WeightCount {
            expected: FEATURE_COUNT,
            found: model.weights().len(),
        });
    }

    let mut predictions = Vec::with_capacity(features.len());
    for (row_number, row) in features.iter().enumerate() {
        let wear_value = model.apply(row);
        if !wear_value.is_finite() {
            return Err(WearError::NonFiniteWear {
                row: row_number + 1,
            });
        }
        predictions.push(wear_value);
    }
    debug!("predicted wear for {} rows", predictions.len());
    Ok(predictions)
}

fn parse_feature(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor() -> Predictor {
        Predictor::new([
            "Mean Amplitude".to_string(),
            "Standard Deviation (Amplitude)".to_string(),
        ])
    }

    fn table(rows: &[[&str; 3]]) -> FeatureTable {
        FeatureTable::new(
            vec![
                "Standard Deviation (Amplitude)".to_string(),
                "Batch".to_string(),
                "Mean Amplitude".to_string(),
            ],
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn applies_dot_product_plus_intercept() {
        let model = LinearModel::new(vec![1.0, 2.0], 5.0);
        let input = table(&[["20", "x", "10"], ["0", "y", "0"], ["-1", "z", "3"]]);
        let wear = predictor().predict(&input, Some(&model)).unwrap();
        assert_eq!(wear, vec![55.0, 5.0, 6.0]);
    }

    #[test]
    fn prediction_is_deterministic() {
        let model = LinearModel::new(vec![0.731, 1.913], -3.27);
        let input = table(&[["0.17", "a", "12.33"], ["4.9", "b", "88.1"]]);
        let first = predictor().predict(&input, Some(&model)).unwrap();
        for _ in 0..10 {
            let again = predictor().predict(&input, Some(&model)).unwrap();
            let same = first
                .iter()
                .zip(again.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits());
            assert!(same);
        }
    }

    #[test]
    fn missing_model_is_reported() {
        let input = table(&[["1", "a", "2"]]);
        let err = predictor().predict(&input, None).unwrap_err();
        assert!(matches!(err, WearError::ModelNotLoaded));
    }

    #[test]
    fn missing_columns_are_named() {
        let model = LinearModel::new(vec![1.0, 2.0], 5.0);
        let input = FeatureTable::new(vec!["Other".to_string()], vec![vec!["1".to_string()]]);
        match predictor().predict(&input, Some(&model)) {
            Err(WearError::FeatureMismatch { missing }) => {
                assert_eq!(
                    missing,
                    vec![
                        "Mean Amplitude".to_string(),
                        "Standard Deviation (Amplitude)".to_string()
                    ]
                );
            }
            other => panic!("expected feature mismatch, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_cell_aborts_the_batch() {
        let model = LinearModel::new(vec![1.0, 2.0], 5.0);
        let input = table(&[["1", "a", "2"], ["n/a", "b", "3"]]);
        match predictor().predict(&input, Some(&model)) {
            Err(WearError::InvalidFeature { column, row, .. }) => {
                assert_eq!(column, "Standard Deviation (Amplitude)");
                assert_eq!(row, 2);
            }
            other => panic!("expected invalid feature, got {other:?}"),
        }
    }
}
