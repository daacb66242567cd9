use std::path::{Path, PathBuf};

use log::info;

use crate::error::WearError;
use crate::models::LinearModel;

#[derive(Debug)]
pub struct ModelStore {
    path: PathBuf,
    expected_features: usize,
    model: Option<LinearModel>,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>, expected_features: usize) -> Self {
        Self {
            path: path.into(),
            expected_features,
            model: None,
        }
    }

    pub fn with_model(model: LinearModel) -> Self {
        Self {
            path: PathBuf::new(),
            expected_features: model.weights().len(),
            model: Some(model),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> Option<&LinearModel> {
        self.model.as_ref()
    }

    pub fn load(&mut self) -> Result<&LinearModel, WearError> {
        if self.model.is_none() {
            let model = read_model(&self.path, self.expected_features)?;
            self.model = Some(model);
        }
        self.model.as_ref().ok_or(WearError::ModelNotLoaded)
    }

    /// Re-reads the model file; the cached model survives a failed reload.
    pub fn reload(&mut self) -> Result<&LinearModel, WearError> {
        let model = read_model(&self.path, self.expected_features)?;
        self.model = Some(model);
        self.model.as_ref().ok_or(WearError::ModelNotLoaded)
    }
}

fn read_model(path: &Path, expected_features: usize) -> Result<LinearModel, WearError> {
    let content = std::fs::read_to_string(path).map_err(|e| WearError::ModelLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let model: LinearModel = serde_json::from_str(&content).map_err(|e| WearError::ModelLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if model.weights().len() != expected_features {
        return Err(WearError::WeightCount {
            expected: expected_features,
            found: model.weights().len(),
        });
    }
    if !model.intercept().is_finite() || model.weights().iter().any(|w| !w.is_finite()) {
        return Err(WearError::ModelLoad {
            path: path.to_path_buf(),
            reason: "weights and intercept must be finite".to_string(),
        });
    }

    info!(
        "loaded model from {} ({} weights, intercept {})",
        path.display(),
        model.weights().len(),
        model.intercept()
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FEATURE_COUNT;
    use tempfile::tempdir;

    #[test]
    fn loads_weights_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"weights": [0.1234567890123456789, -2.5e-7], "intercept": 5.000000000000001}"#,
        )
        .unwrap();

        let mut store = ModelStore::new(&path, FEATURE_COUNT);
        let model = store.load().unwrap();
        assert_eq!(model.weights(), &[0.1234567890123456789, -2.5e-7]);
        assert_eq!(model.intercept(), 5.000000000000001);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        let mut store = ModelStore::new(dir.path().join("absent.json"), FEATURE_COUNT);
        let err = store.load().unwrap_err();
        assert!(matches!(err, WearError::ModelLoad { .. }));
        assert!(store.model().is_none());
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"weights": [1.0, 2.0]}"#).unwrap();
        let mut store = ModelStore::new(&path, FEATURE_COUNT);
        assert!(matches!(store.load(), Err(WearError::ModelLoad { .. })));
        assert!(store.model().is_none());
    }

    #[test]
    fn rejects_wrong_weight_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"weights": [1.0, 2.0, 3.0], "intercept": 0.0}"#).unwrap();
        let mut store = ModelStore::new(&path, FEATURE_COUNT);
        let err = store.load().unwrap_err();
        assert!(matches!(
            err,
            WearError::WeightCount {
                expected: 2,
                found: 3
            }
        ));
        assert!(store.model().is_none());
    }

    #[test]
    fn repeated_load_returns_cached_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"weights": [1.0, 2.0], "intercept": 5.0}"#).unwrap();
        let mut store = ModelStore::new(&path, FEATURE_COUNT);
        let first = store.load().unwrap().clone();

        std::fs::remove_file(&path).unwrap();
        let second = store.load().unwrap();
        assert_eq!(&first, second);
        assert!(store.reload().is_err());
        assert_eq!(store.model(), Some(&first));
    }
}
