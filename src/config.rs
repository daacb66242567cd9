//! Configuration management (TOML)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::history::RESERVED_COLUMNS;
use crate::models::FEATURE_COUNT;

pub const DEFAULT_CONFIG_PATH: &str = "tool-wear.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Feature column names, in the order the model was trained with.
    #[serde(deserialize_with = "exact_features")]
    pub features: [String; FEATURE_COUNT],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: ModelConfig {
                path: PathBuf::from("regression_model.json"),
                features: [
                    "Mean Amplitude".to_string(),
                    "Standard Deviation (Amplitude)".to_string(),
                ],
            },
            history: HistoryConfig {
                path: PathBuf::from("wear_history.csv"),
            },
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let [first, second] = &self.model.features;
        if first == second {
            bail!("feature columns must be distinct, got {first:?} twice");
        }
        for name in self.model.features.iter() {
            if RESERVED_COLUMNS.contains(&name.as_str()) {
                bail!("feature column {name:?} clashes with a history column");
            }
        }
        Ok(())
    }

    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

fn exact_features<'de, D>(deserializer: D) -> Result<[String; FEATURE_COUNT], D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    let found = names.len();
    names.try_into().map_err(|_| {
        D::Error::custom(format!(
            "expected {FEATURE_COUNT} feature columns, found {found}"
        ))
    })
}
