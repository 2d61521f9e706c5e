//! The record store boundary and the bundled store implementations.
//!
//! The engine treats persistence as an abstract append-only tabular store:
//! one header row plus data rows of the shape
//! `[date, roll_id, <categorical attributes...>, <one cell per position>]`.
//! Cells are strings because the backing stores in the field are remote
//! spreadsheets; blank cells are how sparsity is represented.
//!
//! # Column Addressing
//!
//! Store headers in the field are unreliable: repeated names and blank names
//! both occur. Columns are therefore always addressed **by position** using
//! the deployment configuration's layout, never by header name. Header names
//! exist for display only, and [`disambiguate_headers`] can rename duplicates
//! for display when the deployment opts in.
//!
//! # Implementations
//!
//! - [`MemoryStore`] - in-memory rows, used by tests and embedders.
//! - [`JsonFileStore`] - a JSON document on disk, used by the CLI. The whole
//!   document is rewritten on each mutation; an append either fully succeeds
//!   or leaves the document untouched.
//!
//! Remote spreadsheet bindings live outside this crate; anything that can
//! speak the [`RecordStore`] trait plugs into the repository unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProfileConfig;
use crate::error::StoreError;
use crate::measurement::{MeasurementSet, StoredRecord};

/// Store document format version for [`JsonFileStore`].
const STORE_VERSION: u32 = 1;

/// The abstract append-only record store boundary.
///
/// All methods are synchronous; the engine performs no retries and holds no
/// locks. A failing store call is surfaced to the caller as-is.
pub trait RecordStore {
    /// Returns the header row, one name per column.
    fn header(&self) -> &[String];

    /// Appends one row. The row must match the header width exactly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RowWidthMismatch`] on a malformed row, or a
    /// store-specific error if persistence fails. No partial row is ever
    /// kept on failure.
    fn append_row(&mut self, row: Vec<String>) -> Result<(), StoreError>;

    /// Fetches all rows in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a store-specific error if the store cannot be read.
    fn fetch_all_rows(&self) -> Result<Vec<Vec<String>>, StoreError>;

    /// Deletes the row at a 0-based index. Optional capability; stores that
    /// cannot delete return [`StoreError::DeleteUnsupported`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeleteUnsupported`] by default.
    fn delete_row(&mut self, index: usize) -> Result<(), StoreError> {
        let _ = index;
        Err(StoreError::DeleteUnsupported)
    }
}

/// Builds the canonical header row for a deployment configuration:
/// `[date, roll_id, <attribute names...>, <"{position} mm"...>]`.
pub fn build_header(config: &ProfileConfig) -> Vec<String> {
    let mut header = Vec::with_capacity(2 + config.attributes.len() + config.positions.len());
    header.push("date".to_string());
    header.push("roll_id".to_string());
    for attribute in &config.attributes {
        header.push(attribute.name.clone());
    }
    for &position in &config.positions {
        header.push(format!("{position} mm"));
    }
    header
}

/// Renames duplicate header names to unique display names.
///
/// The second occurrence of `dia` becomes `dia (2)`, the third `dia (3)`,
/// and so on. Blank names become `column N`. This only affects display;
/// column addressing stays positional either way.
pub fn disambiguate_headers(header: &[String]) -> Vec<String> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    header
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if name.trim().is_empty() {
                return format!("column {}", index + 1);
            }
            let count = seen.entry(name.as_str()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name.clone()
            } else {
                format!("{name} ({count})")
            }
        })
        .collect()
}

/// Serializes a validated measurement set into a store row.
///
/// Readings are written with `f64`'s shortest round-trip formatting, so the
/// stored cell parses back to exactly the validated value no matter how the
/// display layer later formats it. Absent readings and unselected attributes
/// become blank cells.
pub fn record_to_row(set: &MeasurementSet, config: &ProfileConfig) -> Vec<String> {
    let mut row = Vec::with_capacity(2 + config.attributes.len() + config.positions.len());
    row.push(set.date_label());
    row.push(set.roll_id.clone());
    for attribute in &config.attributes {
        row.push(set.attributes.get(&attribute.name).cloned().unwrap_or_default());
    }
    for &position in &config.positions {
        row.push(
            set.reading(position)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        );
    }
    row
}

/// Parses a store row back into a [`StoredRecord`] using the positional
/// column layout from the configuration.
///
/// Rows shorter than the layout are tolerated (trailing cells absent), since
/// external writers produce sparse rows. Blank and unparseable reading cells
/// are absent; a stored zero is absent under the `zero_is_absent` policy,
/// mirroring the write-side sentinel.
pub fn row_to_record(row: &[String], config: &ProfileConfig) -> StoredRecord {
    let cell = |index: usize| row.get(index).map(String::as_str).unwrap_or("").trim();

    let mut attributes = BTreeMap::new();
    for (offset, attribute) in config.attributes.iter().enumerate() {
        let value = cell(2 + offset);
        if !value.is_empty() {
            attributes.insert(attribute.name.clone(), value.to_string());
        }
    }

    let readings_base = 2 + config.attributes.len();
    let mut readings = BTreeMap::new();
    for (offset, &position) in config.positions.iter().enumerate() {
        if let Ok(value) = cell(readings_base + offset).parse::<f64>()
            && !(value == 0.0 && config.zero_is_absent)
        {
            readings.insert(position, value);
        }
    }

    StoredRecord {
        date_raw: cell(0).to_string(),
        roll_id: cell(1).to_string(),
        attributes,
        readings,
    }
}

/// In-memory record store for tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemoryStore {
    /// Creates an empty store with the canonical header for a configuration.
    pub fn for_config(config: &ProfileConfig) -> Self {
        Self::with_header(build_header(config))
    }

    /// Creates an empty store with an arbitrary header, e.g. to mirror an
    /// upstream sheet with repeated or blank column names.
    pub fn with_header(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<(), StoreError> {
        if row.len() != self.header.len() {
            return Err(StoreError::RowWidthMismatch {
                expected: self.header.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    fn fetch_all_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.rows.clone())
    }

    fn delete_row(&mut self, index: usize) -> Result<(), StoreError> {
        if index >= self.rows.len() {
            return Err(StoreError::RowIndexOutOfBounds {
                index,
                rows: self.rows.len(),
            });
        }
        self.rows.remove(index);
        Ok(())
    }
}

/// Document layout persisted by [`JsonFileStore`].
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    /// Document format version.
    version: u32,
    /// Header row.
    header: Vec<String>,
    /// Data rows in insertion order.
    rows: Vec<Vec<String>>,
}

/// A record store persisted as a single pretty-printed JSON document.
///
/// The whole document is rewritten on each mutation, which keeps appends
/// all-or-nothing at the file level and matches the single-writer session
/// model: no locks are taken, and concurrent writers are last-write-wins.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    document: StoreDocument,
}

impl JsonFileStore {
    /// Opens an existing store document or creates an empty one with the
    /// canonical header for the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read or written,
    /// [`StoreError::Corrupted`] on an unsupported version, or
    /// [`StoreError::Serialize`] if the document does not parse.
    pub fn open<P: AsRef<Path>>(path: P, config: &ProfileConfig) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            let data = fs::read_to_string(&path).map_err(|e| StoreError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            let document: StoreDocument = serde_json::from_str(&data)?;

            if document.version != STORE_VERSION {
                return Err(StoreError::Corrupted {
                    path: path.display().to_string(),
                    reason: format!(
                        "unsupported store version: expected {STORE_VERSION}, found {}",
                        document.version
                    ),
                });
            }

            debug!(path = %path.display(), rows = document.rows.len(), "opened store document");
            Ok(Self { path, document })
        } else {
            let store = Self {
                path,
                document: StoreDocument {
                    version: STORE_VERSION,
                    header: build_header(config),
                    rows: Vec::new(),
                },
            };
            store.persist()?;
            debug!(path = %store.path.display(), "created store document");
            Ok(store)
        }
    }

    /// Returns the path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.document)?;
        fs::write(&self.path, json).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

impl RecordStore for JsonFileStore {
    fn header(&self) -> &[String] {
        &self.document.header
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<(), StoreError> {
        if row.len() != self.document.header.len() {
            return Err(StoreError::RowWidthMismatch {
                expected: self.document.header.len(),
                found: row.len(),
            });
        }

        self.document.rows.push(row);
        if let Err(e) = self.persist() {
            // No partial write: drop the in-memory row if the file write failed.
            self.document.rows.pop();
            return Err(e);
        }
        debug!(rows = self.document.rows.len(), "appended row");
        Ok(())
    }

    fn fetch_all_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.document.rows.clone())
    }

    fn delete_row(&mut self, index: usize) -> Result<(), StoreError> {
        if index >= self.document.rows.len() {
            return Err(StoreError::RowIndexOutOfBounds {
                index,
                rows: self.document.rows.len(),
            });
        }
        let removed = self.document.rows.remove(index);
        if let Err(e) = self.persist() {
            self.document.rows.insert(index, removed);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttributeSpec, ToleranceBand};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn config() -> ProfileConfig {
        ProfileConfig::new(vec![100, 350, 600], ToleranceBand::new(1200.0, 1400.0))
            .unwrap()
            .with_attribute(AttributeSpec::required("stand", ["F1", "F2"]))
    }

    fn sample_set() -> MeasurementSet {
        let mut attributes = BTreeMap::new();
        attributes.insert("stand".to_string(), "F2".to_string());
        let mut readings = BTreeMap::new();
        readings.insert(100, 1305.25);
        readings.insert(600, 1304.5);

        MeasurementSet {
            capture_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            roll_id: "BR-17".to_string(),
            attributes,
            readings,
        }
    }

    #[test]
    fn test_build_header_layout() {
        let header = build_header(&config());
        assert_eq!(
            header,
            ["date", "roll_id", "stand", "100 mm", "350 mm", "600 mm"]
        );
    }

    #[test]
    fn test_disambiguate_headers() {
        let header: Vec<String> = ["date", "dia", "dia", "", "dia"]
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            disambiguate_headers(&header),
            ["date", "dia", "dia (2)", "column 4", "dia (3)"]
        );
    }

    #[test]
    fn test_row_codec_round_trips_raw_values() {
        let config = config();
        let set = sample_set();

        let row = record_to_row(&set, &config);
        assert_eq!(row, ["2024-01-15", "BR-17", "F2", "1305.25", "", "1304.5"]);

        let record = row_to_record(&row, &config);
        assert_eq!(record.date_raw, "2024-01-15");
        assert_eq!(record.roll_id, "BR-17");
        assert_eq!(record.readings.get(&100), Some(&1305.25));
        assert_eq!(record.readings.get(&600), Some(&1304.5));
        assert!(!record.readings.contains_key(&350));
    }

    #[test]
    fn test_row_to_record_tolerates_short_rows() {
        let config = config();
        let row: Vec<String> = ["2024-01-15", "R1"].iter().map(ToString::to_string).collect();

        let record = row_to_record(&row, &config);
        assert_eq!(record.roll_id, "R1");
        assert!(record.attributes.is_empty());
        assert!(record.readings.is_empty());
    }

    #[test]
    fn test_row_to_record_zero_cell_is_absent() {
        let mut config = config();
        let row: Vec<String> = ["2024-01-15", "R1", "F1", "0", "1300.0", ""]
            .iter()
            .map(ToString::to_string)
            .collect();

        let record = row_to_record(&row, &config);
        assert!(!record.readings.contains_key(&100));
        assert_eq!(record.readings.get(&350), Some(&1300.0));

        config.zero_is_absent = false;
        let record = row_to_record(&row, &config);
        assert_eq!(record.readings.get(&100), Some(&0.0));
    }

    #[test]
    fn test_memory_store_append_and_width_check() {
        let config = config();
        let mut store = MemoryStore::for_config(&config);

        store
            .append_row(record_to_row(&sample_set(), &config))
            .unwrap();
        assert_eq!(store.len(), 1);

        let result = store.append_row(vec!["too".to_string(), "short".to_string()]);
        assert!(matches!(
            result,
            Err(StoreError::RowWidthMismatch {
                expected: 6,
                found: 2
            })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_delete() {
        let config = config();
        let mut store = MemoryStore::for_config(&config);
        store
            .append_row(record_to_row(&sample_set(), &config))
            .unwrap();

        assert!(matches!(
            store.delete_row(5),
            Err(StoreError::RowIndexOutOfBounds { index: 5, rows: 1 })
        ));

        store.delete_row(0).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_file_store_create_and_reopen() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("measurements.json");
        let config = config();

        let mut store = JsonFileStore::open(&path, &config).unwrap();
        assert_eq!(store.header(), build_header(&config));

        store
            .append_row(record_to_row(&sample_set(), &config))
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path, &config).unwrap();
        let rows = reopened.fetch_all_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], "BR-17");
    }

    #[test]
    fn test_json_file_store_rejects_bad_version() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("measurements.json");
        fs::write(
            &path,
            r#"{ "version": 99, "header": ["date", "roll_id"], "rows": [] }"#,
        )
        .unwrap();

        let result = JsonFileStore::open(&path, &config());
        assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_json_file_store_rejects_invalid_json() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("measurements.json");
        fs::write(&path, "{ not json").unwrap();

        let result = JsonFileStore::open(&path, &config());
        assert!(matches!(result, Err(StoreError::Serialize(_))));
    }
}
