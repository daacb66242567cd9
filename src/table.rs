use std::io::Read;
use std::path::Path;

use crate::error::WearError;

/// A parsed input table: named columns of raw string cells.
///
/// Only the configured feature columns are ever inspected; everything else
/// rides along untouched.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn from_path(path: &Path) -> Result<Self, WearError> {
        let file = std::fs::File::open(path).map_err(|e| {
            WearError::InputTable(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, WearError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let columns = reader
            .headers()
            .map_err(|e| WearError::InputTable(format!("cannot read header row: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record =
                result.map_err(|e| WearError::InputTable(format!("malformed row: {e}")))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_rows() {
        let data = "Mean Amplitude, Standard Deviation (Amplitude),Spindle\n10,20,A\n11.5,19,B\n";
        let table = FeatureTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.column_index("Standard Deviation (Amplitude)"), Some(1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1][0], "11.5");
    }

    #[test]
    fn rejects_ragged_rows() {
        let data = "a,b\n1,2\n3\n";
        let err = FeatureTable::from_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, WearError::InputTable(_)));
    }
}
