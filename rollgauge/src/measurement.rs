//! Measurement sets and tolerance validation.
//!
//! A submission arrives as raw form fields: a capture date, a roll id, a set
//! of categorical attribute selections, and one free-text diameter field per
//! configured axial position. [`validate`] turns that into a
//! [`MeasurementSet`] or an ordered batch of [`ValidationIssue`]s.
//!
//! # Validation Rules
//!
//! - The roll id must be non-empty after trimming and uppercasing.
//! - Required categorical attributes must not be left at the unselected
//!   sentinel; which attributes are required is deployment configuration.
//! - A blank or unparseable reading is **absent**, not an error.
//! - A reading of exactly zero is absent when `zero_is_absent` is on (the
//!   default), since the source systems used zero as a "not measured"
//!   sentinel.
//! - A non-zero reading outside the tolerance band yields one
//!   [`ValidationIssue::OutOfRangeReading`] per offending position.
//!
//! Issues are collected exhaustively, never short-circuited. On success the
//! returned set contains only the present, in-bounds readings.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use rollgauge::config::{ProfileConfig, ToleranceBand};
//! use rollgauge::measurement::{RawSubmission, validate};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProfileConfig::new(vec![100, 350], ToleranceBand::new(1200.0, 1400.0))?;
//!
//! let mut readings = BTreeMap::new();
//! readings.insert(100, "1305.25".to_string());
//! readings.insert(350, "".to_string()); // not measured
//!
//! let raw = RawSubmission {
//!     capture_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!     roll_id: " br-17 ".to_string(),
//!     attributes: BTreeMap::new(),
//!     readings,
//! };
//!
//! let set = validate(&raw, &config).expect("in-bounds submission");
//! assert_eq!(set.roll_id, "BR-17");
//! assert_eq!(set.readings.get(&100), Some(&1305.25));
//! assert!(!set.readings.contains_key(&350));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ProfileConfig;
use crate::error::ValidationIssue;

/// Canonical date format used for storage and comparison labels.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stored date formats accepted when re-parsing rows fetched from the store.
///
/// Only unambiguous year-first formats are accepted; anything else falls back
/// to the raw string label rather than guessing day/month order.
const ACCEPTED_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// A raw submission as captured by the form layer, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSubmission {
    /// The capture date selected in the form.
    pub capture_date: NaiveDate,
    /// The roll identifier as typed, possibly padded or lowercase.
    pub roll_id: String,
    /// Categorical attribute selections, keyed by attribute name. A missing
    /// entry and the configured unselected sentinel are equivalent.
    pub attributes: BTreeMap<String, String>,
    /// Free-text diameter fields keyed by axial position in mm.
    pub readings: BTreeMap<u32, String>,
}

/// A validated measurement record, ready to append to the store.
///
/// `readings` holds only the present, in-bounds values; absent positions are
/// simply missing from the map rather than stored as nulls or zeros. The raw
/// `f64` values are what gets persisted, so display formatting never
/// overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    /// The capture date.
    pub capture_date: NaiveDate,
    /// The roll identifier, trimmed and uppercased.
    pub roll_id: String,
    /// Selected categorical attribute values, keyed by attribute name.
    /// Unselected attributes are omitted.
    pub attributes: BTreeMap<String, String>,
    /// Present, in-bounds diameter readings keyed by axial position in mm.
    pub readings: BTreeMap<u32, f64>,
}

impl MeasurementSet {
    /// Returns the reading at a position, if one was measured.
    pub fn reading(&self, position: u32) -> Option<f64> {
        self.readings.get(&position).copied()
    }

    /// Returns the reading at a position formatted for display with 2
    /// decimal places. The stored value itself is never rounded.
    pub fn formatted_reading(&self, position: u32) -> Option<String> {
        self.reading(position).map(|v| format!("{v:.2}"))
    }

    /// Returns the canonical `YYYY-MM-DD` date label for this record.
    pub fn date_label(&self) -> String {
        self.capture_date.format(DATE_FORMAT).to_string()
    }
}

/// A record as read back from the store.
///
/// Unlike [`MeasurementSet`], the date is kept as the raw stored string:
/// rows written by other tooling may carry dates the engine cannot parse,
/// and those label themselves verbatim instead of failing the fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// The stored date cell, verbatim.
    pub date_raw: String,
    /// The stored roll identifier, verbatim.
    pub roll_id: String,
    /// Categorical attribute cells, keyed by attribute name. Blank cells are
    /// omitted.
    pub attributes: BTreeMap<String, String>,
    /// Numeric reading cells keyed by axial position. Blank or unparseable
    /// cells are omitted.
    pub readings: BTreeMap<u32, f64>,
}

impl StoredRecord {
    /// Returns the capture date, if the stored cell parses as a calendar
    /// date in an accepted unambiguous format.
    pub fn capture_date(&self) -> Option<NaiveDate> {
        ACCEPTED_DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(self.date_raw.trim(), format).ok())
    }

    /// Returns the date label for this record: the canonical `YYYY-MM-DD`
    /// form when the stored date parses, otherwise the raw string verbatim.
    ///
    /// The fallback is deliberate: an ambiguous or malformed stored date is
    /// non-fatal and labels itself rather than getting a synthetic label.
    pub fn date_label(&self) -> String {
        match self.capture_date() {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => {
                warn!(date = %self.date_raw, "stored date does not parse, using raw label");
                self.date_raw.clone()
            }
        }
    }

    /// Returns the roll id normalized for comparison.
    pub fn normalized_roll_id(&self) -> String {
        normalize_roll_id(&self.roll_id)
    }
}

impl From<&MeasurementSet> for StoredRecord {
    fn from(set: &MeasurementSet) -> Self {
        Self {
            date_raw: set.date_label(),
            roll_id: set.roll_id.clone(),
            attributes: set.attributes.clone(),
            readings: set.readings.clone(),
        }
    }
}

/// Normalizes a roll id for storage and comparison: trim, then uppercase.
pub fn normalize_roll_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Validates a raw submission against the deployment configuration.
///
/// All issues are collected and returned together so the caller can display
/// every violation in one round trip. Pure function over its inputs.
///
/// # Errors
///
/// Returns the ordered batch of [`ValidationIssue`]s found: a missing roll
/// id first, then unselected required attributes in configuration order,
/// then out-of-range readings in position order.
pub fn validate(
    raw: &RawSubmission,
    config: &ProfileConfig,
) -> std::result::Result<MeasurementSet, Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let roll_id = normalize_roll_id(&raw.roll_id);
    if roll_id.is_empty() {
        issues.push(ValidationIssue::MissingRequiredField {
            field: "roll_id".to_string(),
        });
    }

    // Attribute selections. A missing entry and the unselected sentinel are
    // equivalent; only required attributes reject on it.
    let mut attributes = BTreeMap::new();
    for spec in &config.attributes {
        let selected = raw
            .attributes
            .get(&spec.name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != config.unselected_sentinel);

        match selected {
            Some(value) => {
                attributes.insert(spec.name.clone(), value.to_string());
            }
            None if spec.required => {
                issues.push(ValidationIssue::MissingRequiredField {
                    field: spec.name.clone(),
                });
            }
            None => {}
        }
    }

    // Readings, in canonical position order. Blank and unparseable cells are
    // absent; zero is absent under the zero_is_absent policy.
    let mut readings = BTreeMap::new();
    for &position in &config.positions {
        let Some(raw_value) = raw.readings.get(&position) else {
            continue;
        };
        let Ok(value) = raw_value.trim().parse::<f64>() else {
            continue;
        };
        if value == 0.0 && config.zero_is_absent {
            continue;
        }

        if config.tolerance.contains(value) {
            readings.insert(position, value);
        } else {
            issues.push(ValidationIssue::OutOfRangeReading {
                position,
                value,
                min: config.tolerance.min_dia,
                max: config.tolerance.max_dia,
            });
        }
    }

    if issues.is_empty() {
        Ok(MeasurementSet {
            capture_date: raw.capture_date,
            roll_id,
            attributes,
            readings,
        })
    } else {
        Err(issues)
    }
}
