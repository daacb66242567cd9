use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Stage, WearError};
use crate::models::{MeasurementRow, FEATURE_COUNT};

const TIMESTAMP: &str = "timestamp";
const BATCH_ID: &str = "batch_id";
const TOOL_TYPE: &str = "tool_type";
const USAGE_MINUTES: &str = "usage_minutes";
const MATERIAL: &str = "material";
const WEAR_VALUE: &str = "wear_value";
const CAPACITY_PERCENT: &str = "capacity_percent";

/// Column names the store writes itself; feature columns may not reuse them.
pub const RESERVED_COLUMNS: [&str; 7] = [
    TIMESTAMP,
    BATCH_ID,
    TOOL_TYPE,
    USAGE_MINUTES,
    MATERIAL,
    WEAR_VALUE,
    CAPACITY_PERCENT,
];

/// CSV-backed record of every saved measurement.
///
/// Saves rewrite the whole file through a temporary file in the same
/// directory, so readers only ever see the old or the new record.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    features: [String; FEATURE_COUNT],
}

struct Columns {
    timestamp: usize,
    batch_id: Option<usize>,
    tool_type: usize,
    usage_minutes: usize,
    material: usize,
    features: [usize; FEATURE_COUNT],
    wear_value: usize,
    capacity_percent: usize,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, features: [String; FEATURE_COUNT]) -> Self {
        Self {
            path: path.into(),
            features,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<MeasurementRow>, WearError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "no history at {}, starting with an empty record",
                    self.path.display()
                );
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(WearError::HistoryIo {
                    stage: Stage::Load,
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_reader(content.as_slice());
        let headers = reader.headers().map_err(|e| self.corrupt(e))?.clone();
        let columns = self.columns(&headers)?;

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| self.corrupt(e))?;
            let row = parse_row(&record, &columns)
                .map_err(|reason| self.corrupt(format!("row {}: {reason}", index + 1)))?;
            rows.push(row);
        }

        debug!("loaded {} history rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }

    pub fn save(&self, record: &[MeasurementRow]) -> Result<(), WearError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(Stage::Save, e))?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| self.io_error(Stage::Save, e))?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file_mut());
            writer
                .write_record(self.header())
                .map_err(|e| self.io_error(Stage::Save, e.into()))?;
            for row in record {
                writer
                    .write_record(format_row(row))
                    .map_err(|e| self.io_error(Stage::Save, e.into()))?;
            }
            writer.flush().map_err(|e| self.io_error(Stage::Save, e))?;
        }
        temp.as_file_mut().flush().map_err(|e| self.io_error(Stage::Save, e))?;
        temp.as_file().sync_all().map_err(|e| self.io_error(Stage::Save, e))?;
        temp.persist(&self.path)
            .map_err(|e| self.io_error(Stage::Save, e.error))?;

        debug!("wrote {} history rows to {}", record.len(), self.path.display());
        Ok(())
    }

    pub fn reset(&self) -> Result<(), WearError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("cleared history at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(Stage::Reset, e)),
        }
    }

    fn header(&self) -> Vec<&str> {
        let mut header = vec![TIMESTAMP, BATCH_ID, TOOL_TYPE, USAGE_MINUTES, MATERIAL];
        header.extend(self.features.iter().map(String::as_str));
        header.push(WEAR_VALUE);
        header.push(CAPACITY_PERCENT);
        header
    }

    fn columns(&self, headers: &csv::StringRecord) -> Result<Columns, WearError> {
        let find = |name: &str| headers.iter().position(|header| header == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| self.corrupt(format!("missing column {name:?}")))
        };

        let mut features = [0usize; FEATURE_COUNT];
        for (slot, name) in features.iter_mut().zip(self.features.iter()) {
            *slot = require(name.as_str())?;
        }

        Ok(Columns {
            timestamp: require(TIMESTAMP)?,
            batch_id: find(BATCH_ID),
            tool_type: require(TOOL_TYPE)?,
            usage_minutes: require(USAGE_MINUTES)?,
            material: require(MATERIAL)?,
            features,
            wear_value: require(WEAR_VALUE)?,
            capacity_percent: require(CAPACITY_PERCENT)?,
        })
    }

    fn corrupt(&self, reason: impl ToString) -> WearError {
        WearError::CorruptRecord {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn io_error(&self, stage: Stage, source: std::io::Error) -> WearError {
        WearError::HistoryIo {
            stage,
            path: self.path.clone(),
            source,
        }
    }
}

fn format_row(row: &MeasurementRow) -> Vec<String> {
    let mut fields = vec![
        row.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        row.batch_id.map(|id| id.to_string()).unwrap_or_default(),
        row.tool_type.clone(),
        row.usage_minutes.to_string(),
        row.material.clone(),
    ];
    fields.extend(row.features.iter().map(f64::to_string));
    fields.push(row.wear_value.to_string());
    fields.push(row.capacity_percent.to_string());
    fields
}

fn parse_row(record: &csv::StringRecord, columns: &Columns) -> Result<MeasurementRow, String> {
    let field = |index: usize| record.get(index).unwrap_or("");
    let number = |index: usize| {
        let raw = field(index);
        raw.parse::<f64>()
            .map_err(|_| format!("{raw:?} is not a number"))
    };

    let timestamp = DateTime::parse_from_rfc3339(field(columns.timestamp))
        .map_err(|e| format!("bad timestamp {:?}: {e}", field(columns.timestamp)))?
        .with_timezone(&Utc);

    let batch_id = match columns.batch_id.map(field) {
        Some(raw) if !raw.is_empty() => {
            Some(Uuid::parse_str(raw).map_err(|e| format!("bad batch id {raw:?}: {e}"))?)
        }
        _ => None,
    };

    let mut features = [0.0; FEATURE_COUNT];
    for (value, &index) in features.iter_mut().zip(columns.features.iter()) {
        *value = number(index)?;
    }

    let capacity_raw = field(columns.capacity_percent);
    let capacity_percent = capacity_raw
        .parse::<u8>()
        .ok()
        .filter(|value| *value <= 100)
        .ok_or_else(|| format!("capacity {capacity_raw:?} is not a percentage"))?;

    Ok(MeasurementRow {
        timestamp,
        batch_id,
        tool_type: field(columns.tool_type).to_string(),
        usage_minutes: number(columns.usage_minutes)?,
        material: field(columns.material).to_string(),
        features,
        wear_value: number(columns.wear_value)?,
        capacity_percent,
    })
}
