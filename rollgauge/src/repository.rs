//! Record repository: append, dedup, pagination, and roll lookup.
//!
//! The repository sits between validated measurement sets and the abstract
//! [`RecordStore`], applying the deployment's dedup policy on the write path
//! and shaping the read path into pages and per-roll record sequences.
//!
//! Pagination state is explicit: the caller passes a page number and gets a
//! [`Page`] back, including the clamped page number actually served. Nothing
//! here keeps ambient session state.
//!
//! # Example
//!
//! ```rust
//! use rollgauge::config::{ProfileConfig, ToleranceBand};
//! use rollgauge::repository::RecordRepository;
//! use rollgauge::store::MemoryStore;
//!
//! # fn main() -> rollgauge::Result<()> {
//! let config = ProfileConfig::new(vec![100, 350], ToleranceBand::new(1200.0, 1400.0))?;
//! let store = MemoryStore::for_config(&config);
//! let repository = RecordRepository::new(store, config)?;
//!
//! let page = repository.fetch_page(1)?;
//! assert_eq!(page.total_pages, 1);
//! assert!(page.rows.is_empty());
//! # Ok(())
//! # }
//! ```

use tracing::{debug, warn};

use crate::config::{DedupPolicy, ProfileConfig};
use crate::error::{RepositoryError, Result};
use crate::measurement::{MeasurementSet, StoredRecord, normalize_roll_id};
use crate::store::{RecordStore, disambiguate_headers, record_to_row, row_to_record};

/// One page of stored records.
#[derive(Debug, Clone)]
pub struct Page {
    /// The records on this page, in insertion order.
    pub rows: Vec<StoredRecord>,
    /// The 1-indexed page number actually served, after clamping.
    pub page_number: usize,
    /// Total number of pages; at least 1 even for an empty store.
    pub total_pages: usize,
    /// Total number of stored rows.
    pub total_rows: usize,
}

/// Repository over an abstract record store.
///
/// Owns the store handle and a copy of the deployment configuration. All
/// operations are synchronous and single-writer; see the crate docs for the
/// concurrency model.
#[derive(Debug)]
pub struct RecordRepository<S: RecordStore> {
    store: S,
    config: ProfileConfig,
}

impl<S: RecordStore> RecordRepository<S> {
    /// Creates a repository, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error if the configuration is invalid.
    pub fn new(store: S, config: ProfileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Returns the deployment configuration.
    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the header for display, with duplicate names renamed when the
    /// deployment opts into `rename_duplicate_headers`.
    pub fn display_header(&self) -> Vec<String> {
        if self.config.rename_duplicate_headers {
            disambiguate_headers(self.store.header())
        } else {
            self.store.header().to_vec()
        }
    }

    /// Appends a validated measurement set, applying the dedup policy for
    /// its `(capture_date, roll_id)` key.
    ///
    /// The only precondition is that the set has already passed validation;
    /// the repository performs no re-validation.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::DuplicateRecord`] under the `Reject`
    /// policy when the key already exists, or a store error if the append
    /// (or, under `Overwrite`, the delete) fails.
    pub fn append(&mut self, set: &MeasurementSet) -> Result<()> {
        let date_label = set.date_label();

        match self.config.dedup_policy {
            DedupPolicy::Allow => {}
            DedupPolicy::Reject => {
                if !self.matching_row_indexes(&date_label, &set.roll_id)?.is_empty() {
                    return Err(RepositoryError::DuplicateRecord {
                        roll_id: set.roll_id.clone(),
                        capture_date: date_label,
                    }
                    .into());
                }
            }
            DedupPolicy::Overwrite => {
                let matches = self.matching_row_indexes(&date_label, &set.roll_id)?;
                // Delete from the back so earlier indexes stay valid.
                for index in matches.into_iter().rev() {
                    warn!(
                        roll_id = %set.roll_id,
                        date = %date_label,
                        row = index,
                        "overwriting existing record"
                    );
                    self.store.delete_row(index)?;
                }
            }
        }

        self.store
            .append_row(record_to_row(set, &self.config))?;
        debug!(roll_id = %set.roll_id, date = %date_label, "appended record");
        Ok(())
    }

    /// Fetches all stored records in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a store error if the store cannot be read.
    pub fn all_records(&self) -> Result<Vec<StoredRecord>> {
        let rows = self.store.fetch_all_rows()?;
        Ok(rows
            .iter()
            .map(|row| row_to_record(row, &self.config))
            .collect())
    }

    /// Fetches one page of records.
    ///
    /// Pages are 1-indexed with the configured page size. A request beyond
    /// the last page clamps to the last page; a request for page 0 clamps to
    /// page 1. An empty store serves one empty page.
    ///
    /// # Errors
    ///
    /// Returns a store error if the store cannot be read.
    pub fn fetch_page(&self, page_number: usize) -> Result<Page> {
        let records = self.all_records()?;
        let total_rows = records.len();
        let total_pages = total_rows.div_ceil(self.config.page_size).max(1);
        let page_number = page_number.clamp(1, total_pages);

        let start = (page_number - 1) * self.config.page_size;
        let rows = records
            .into_iter()
            .skip(start)
            .take(self.config.page_size)
            .collect();

        Ok(Page {
            rows,
            page_number,
            total_pages,
            total_rows,
        })
    }

    /// Fetches all records for a roll id in insertion order, comparing roll
    /// ids after trim and uppercase normalization.
    ///
    /// # Errors
    ///
    /// Returns a store error if the store cannot be read.
    pub fn find_by_roll_id(&self, roll_id: &str) -> Result<Vec<StoredRecord>> {
        let wanted = normalize_roll_id(roll_id);
        Ok(self
            .all_records()?
            .into_iter()
            .filter(|record| record.normalized_roll_id() == wanted)
            .collect())
    }

    /// Deletes the stored row at a 0-based index, on stores that support it.
    ///
    /// Deletion is a passthrough to the store boundary; it is not part of
    /// the engine's invariants.
    ///
    /// # Errors
    ///
    /// Returns the store's error, including `DeleteUnsupported`.
    pub fn delete(&mut self, index: usize) -> Result<()> {
        self.store.delete_row(index)?;
        debug!(row = index, "deleted record");
        Ok(())
    }

    /// Returns the 0-based indexes of rows matching a dedup key.
    fn matching_row_indexes(&self, date_label: &str, roll_id: &str) -> Result<Vec<usize>> {
        let records = self.all_records()?;
        Ok(records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                record.date_label() == date_label && record.normalized_roll_id() == roll_id
            })
            .map(|(index, _)| index)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToleranceBand;
    use crate::error::RollgaugeError;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn config() -> ProfileConfig {
        ProfileConfig::new(vec![100, 350, 600], ToleranceBand::new(1200.0, 1400.0)).unwrap()
    }

    fn set(roll_id: &str, day: u32, value: f64) -> MeasurementSet {
        let mut readings = BTreeMap::new();
        readings.insert(100, value);

        MeasurementSet {
            capture_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            roll_id: roll_id.to_string(),
            attributes: BTreeMap::new(),
            readings,
        }
    }

    fn repository(config: ProfileConfig) -> RecordRepository<MemoryStore> {
        let store = MemoryStore::for_config(&config);
        RecordRepository::new(store, config).unwrap()
    }

    #[test]
    fn test_pagination_shape_with_23_rows() {
        let mut repo = repository(config());
        for day in 1..=23 {
            repo.append(&set(&format!("R{day}"), day, 1300.0)).unwrap();
        }

        let page1 = repo.fetch_page(1).unwrap();
        assert_eq!(page1.total_pages, 3);
        assert_eq!(page1.total_rows, 23);
        assert_eq!(page1.rows.len(), 10);
        assert_eq!(page1.rows[0].roll_id, "R1");
        assert_eq!(page1.rows[9].roll_id, "R10");

        let page3 = repo.fetch_page(3).unwrap();
        assert_eq!(page3.rows.len(), 3);
        assert_eq!(page3.rows[0].roll_id, "R21");
        assert_eq!(page3.rows[2].roll_id, "R23");

        // Beyond the last page clamps to the last page's content.
        let page4 = repo.fetch_page(4).unwrap();
        assert_eq!(page4.page_number, 3);
        assert_eq!(page4.rows[0].roll_id, "R21");

        // Page 0 clamps to page 1.
        let page0 = repo.fetch_page(0).unwrap();
        assert_eq!(page0.page_number, 1);
        assert_eq!(page0.rows[0].roll_id, "R1");
    }

    #[test]
    fn test_empty_store_serves_one_empty_page() {
        let repo = repository(config());

        let page = repo.fetch_page(1).unwrap();
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_rows, 0);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_exact_page_boundary() {
        let mut repo = repository(config());
        for day in 1..=20 {
            repo.append(&set(&format!("R{day}"), day, 1300.0)).unwrap();
        }

        let page = repo.fetch_page(2).unwrap();
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.rows.len(), 10);
    }

    #[test]
    fn test_reject_policy_keeps_single_row_per_key() {
        let mut repo = repository(config());

        repo.append(&set("R1", 1, 1300.0)).unwrap();
        let result = repo.append(&set("R1", 1, 1310.0));

        assert!(matches!(
            result,
            Err(RollgaugeError::Repository(
                RepositoryError::DuplicateRecord { .. }
            ))
        ));
        assert_eq!(repo.store().len(), 1);

        let records = repo.find_by_roll_id("R1").unwrap();
        assert_eq!(records[0].readings.get(&100), Some(&1300.0));
    }

    #[test]
    fn test_reject_policy_allows_same_roll_on_other_dates() {
        let mut repo = repository(config());

        repo.append(&set("R1", 1, 1300.0)).unwrap();
        repo.append(&set("R1", 2, 1301.0)).unwrap();
        assert_eq!(repo.store().len(), 2);
    }

    #[test]
    fn test_overwrite_policy_replaces_existing_row() {
        let mut repo = repository(config().with_dedup_policy(DedupPolicy::Overwrite));

        repo.append(&set("R1", 1, 1300.0)).unwrap();
        repo.append(&set("R1", 1, 1310.0)).unwrap();

        assert_eq!(repo.store().len(), 1);
        let records = repo.find_by_roll_id("R1").unwrap();
        assert_eq!(records[0].readings.get(&100), Some(&1310.0));
    }

    #[test]
    fn test_allow_policy_accumulates_rows() {
        let mut repo = repository(config().with_dedup_policy(DedupPolicy::Allow));

        repo.append(&set("R1", 1, 1300.0)).unwrap();
        repo.append(&set("R1", 1, 1310.0)).unwrap();
        assert_eq!(repo.store().len(), 2);
    }

    #[test]
    fn test_find_by_roll_id_normalizes_and_keeps_insertion_order() {
        let mut repo = repository(config());

        repo.append(&set("BR-17", 1, 1300.0)).unwrap();
        repo.append(&set("OTHER", 1, 1305.0)).unwrap();
        repo.append(&set("BR-17", 2, 1301.0)).unwrap();

        let records = repo.find_by_roll_id(" br-17 ").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date_label(), "2024-01-01");
        assert_eq!(records[1].date_label(), "2024-01-02");
    }

    #[test]
    fn test_display_header_rename_flag() {
        let mut config = config();
        config.rename_duplicate_headers = true;

        let header: Vec<String> = ["date", "dia", "dia"].iter().map(ToString::to_string).collect();
        let store = MemoryStore::with_header(header);
        let repo = RecordRepository::new(store, config).unwrap();

        assert_eq!(repo.display_header(), ["date", "dia", "dia (2)"]);
    }

    #[test]
    fn test_delete_passthrough() {
        let mut repo = repository(config());
        repo.append(&set("R1", 1, 1300.0)).unwrap();

        repo.delete(0).unwrap();
        assert!(repo.store().is_empty());
    }
}
