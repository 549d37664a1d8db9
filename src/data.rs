use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{ChartBuildError, DataLoadError};

/// Columns every event record must carry. Rows with a null in any of them are dropped on load.
pub const MANDATORY_COLUMNS: [&str; 4] = ["event_date", "actor_type", "country", "industry"];

/// Immutable in-memory event table. Cells are kept as strings; an empty cell is null.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from raw headers and rows, dropping incomplete records.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DataLoadError> {
        let mut missing = Vec::new();
        let mut mandatory = Vec::new();
        for name in MANDATORY_COLUMNS {
            match find_col_index(&headers, name) {
                Some(idx) => mandatory.push(idx),
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(DataLoadError::MissingColumns(missing));
        }

        let width = headers.len();
        let total = rows.len();
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .filter(|row| mandatory.iter().all(|&idx| !is_null(&row[idx])))
            .collect();

        log::debug!(
            "loaded {} records ({} dropped for missing mandatory fields)",
            rows.len(),
            total - rows.len()
        );
        Ok(Self { headers, rows })
    }

    /// Load a dataset from a `.csv` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, DataLoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => {
                let file =
                    fs::File::open(path).map_err(|e| DataLoadError::Io(path.to_path_buf(), e))?;
                Self::from_csv_reader(file)
            }
            Some("json") => {
                let text = fs::read_to_string(path)
                    .map_err(|e| DataLoadError::Io(path.to_path_buf(), e))?;
                Self::from_json(&serde_json::from_str(&text)?)
            }
            _ => Err(DataLoadError::UnsupportedFileType(path.to_path_buf())),
        }
    }

    /// Read CSV with a header row.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self, DataLoadError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Self::new(headers, rows)
    }

    /// Create a dataset from a JSON array of flat objects.
    pub fn from_json(value: &Value) -> Result<Self, DataLoadError> {
        let array = value.as_array().ok_or(DataLoadError::NotAnArray)?;

        // Headers are the union of keys, in first-seen order.
        let mut headers: Vec<String> = Vec::new();
        for item in array {
            let obj = item.as_object().ok_or(DataLoadError::NotAnArray)?;
            for key in obj.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item.as_object().ok_or(DataLoadError::NotAnArray)?;
            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(v) => scalar_to_string(v)
                        .ok_or_else(|| DataLoadError::UnsupportedValue(header.clone()))?,
                    None => String::new(),
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        find_col_index(&self.headers, name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ChartBuildError> {
        find_col_index(&self.headers, name)
            .ok_or_else(|| ChartBuildError::MissingColumn(name.to_string()))
    }

    /// Sorted distinct non-null values of a column.
    pub fn unique_values(&self, name: &str) -> Vec<String> {
        let Some(idx) = find_col_index(&self.headers, name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .map(|row| &row[idx])
            .filter(|v| !is_null(v))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// A view over every record.
    pub fn view(&self) -> DatasetView<'_> {
        DatasetView {
            dataset: self,
            rows: (0..self.rows.len()).collect(),
        }
    }
}

/// A transient selection of dataset rows. The dataset itself is never copied or mutated.
#[derive(Debug, Clone)]
pub struct DatasetView<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
}

impl<'a> DatasetView<'a> {
    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only rows whose `column` equals `value` exactly.
    pub fn retain_eq(&mut self, column: usize, value: &str) {
        let rows = &self.dataset.rows;
        self.rows.retain(|&r| rows[r][column] == value);
    }

    /// Iterate the rows of the view in dataset order.
    pub fn rows(&self) -> impl Iterator<Item = &'a [String]> + '_ {
        let rows = &self.dataset.rows;
        self.rows.iter().map(move |&r| rows[r].as_slice())
    }

    /// Non-null values of one column.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &'a str> + '_, ChartBuildError> {
        let idx = self.dataset.column_index(name)?;
        Ok(self
            .rows()
            .map(move |row| row[idx].as_str())
            .filter(|v| !is_null(v)))
    }
}

/// Empty and whitespace-only cells are null.
pub fn is_null(value: &str) -> bool {
    value.trim().is_empty()
}

/// Stringify a JSON scalar the way dataset cells are stored.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn find_col_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}
