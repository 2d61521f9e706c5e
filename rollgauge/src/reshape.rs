//! Reshaping stored records into comparable series and pivoted tables.
//!
//! Historical records for one roll accumulate as wide rows (one column per
//! axial position). For comparison plotting and export they are reshaped two
//! ways:
//!
//! - **Long-form series** - a flat, ordered sequence of
//!   `(position, date_label, diameter)` triples across the chosen capture
//!   dates, the shape chart renderers consume.
//! - **Pivot table** - one row per configured position with one column per
//!   date label, the shape tabular displays and spreadsheet exporters
//!   consume.
//!
//! Both are derived, transient views: recomputed on every request and never
//! persisted. Absent readings are skipped in the series and left blank in
//! the pivot; nothing is zero-filled or interpolated.
//!
//! # Example
//!
//! ```rust
//! use rollgauge::config::{ProfileConfig, ToleranceBand};
//! use rollgauge::reshape::ComparisonReshaper;
//!
//! # fn main() -> rollgauge::Result<()> {
//! let config = ProfileConfig::new(vec![100, 350], ToleranceBand::new(1200.0, 1400.0))?;
//! let reshaper = ComparisonReshaper::new(&config);
//!
//! let series = reshaper.for_roll(&[], "BR-17", &[]);
//! assert!(series.points.is_empty());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use crate::config::{AxisScaling, ProfileConfig};
use crate::measurement::{StoredRecord, normalize_roll_id};

/// One `(position, date_label, diameter)` triple of a comparison series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Axial position in mm.
    pub position: u32,
    /// Canonical date label, or the raw stored date when unparseable.
    pub date_label: String,
    /// Measured diameter in mm, as stored.
    pub diameter: f64,
}

/// Long-form comparison series for a single roll across chosen dates.
///
/// Points are ordered by chosen date label first, then by configured
/// position. Only positions with a present numeric reading appear.
#[derive(Debug, Clone, Default)]
pub struct ComparisonSeries {
    /// The normalized roll identifier the series was built for.
    pub roll_id: String,
    /// The ordered series points.
    pub points: Vec<SeriesPoint>,
}

impl ComparisonSeries {
    /// Returns the distinct date labels in first-appearance order.
    pub fn date_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for point in &self.points {
            if !labels.contains(&point.date_label) {
                labels.push(point.date_label.clone());
            }
        }
        labels
    }

    /// Returns the observed `(min, max)` diameter, if any point exists.
    pub fn diameter_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for point in &self.points {
            range = Some(match range {
                None => (point.diameter, point.diameter),
                Some((min, max)) => (min.min(point.diameter), max.max(point.diameter)),
            });
        }
        range
    }
}

/// Pivoted position-by-date view of a comparison series.
///
/// Rows cover every configured position even when no date measured it;
/// missing `(position, date)` cells stay blank rather than being
/// interpolated.
#[derive(Debug, Clone)]
pub struct PivotTable {
    /// Row axis: the configured positions, in canonical order.
    pub positions: Vec<u32>,
    /// Column axis: distinct date labels in series order.
    pub date_labels: Vec<String>,
    /// Cell values, keyed by position then date label.
    pub cells: BTreeMap<u32, BTreeMap<String, f64>>,
}

impl PivotTable {
    /// Returns the cell for a position and date label, if measured.
    pub fn cell(&self, position: u32, date_label: &str) -> Option<f64> {
        self.cells.get(&position).and_then(|row| row.get(date_label)).copied()
    }
}

/// Builds comparison series and pivot tables from stored records.
pub struct ComparisonReshaper<'a> {
    config: &'a ProfileConfig,
}

impl<'a> ComparisonReshaper<'a> {
    /// Creates a reshaper over a deployment configuration.
    pub fn new(config: &'a ProfileConfig) -> Self {
        Self { config }
    }

    /// Builds the long-form series for a roll over the chosen date labels.
    ///
    /// Records are filtered to the roll id (normalized comparison) and
    /// grouped by date label; when several records share a label the most
    /// recently inserted one wins, matching the store's last-write-wins
    /// behavior. A triple is emitted only where a numeric reading exists.
    pub fn for_roll(
        &self,
        records: &[StoredRecord],
        roll_id: &str,
        chosen_dates: &[String],
    ) -> ComparisonSeries {
        let wanted = normalize_roll_id(roll_id);

        // Last record per label, in insertion order.
        let mut by_label: BTreeMap<String, &StoredRecord> = BTreeMap::new();
        for record in records {
            if record.normalized_roll_id() == wanted {
                by_label.insert(record.date_label(), record);
            }
        }

        let mut points = Vec::new();
        for label in chosen_dates {
            let Some(record) = by_label.get(label) else {
                continue;
            };
            for &position in &self.config.positions {
                if let Some(&diameter) = record.readings.get(&position) {
                    points.push(SeriesPoint {
                        position,
                        date_label: label.clone(),
                        diameter,
                    });
                }
            }
        }

        ComparisonSeries {
            roll_id: wanted,
            points,
        }
    }

    /// Returns the default date selection for a roll: the label of its most
    /// recently inserted record, or nothing when the roll has no records.
    pub fn default_dates(&self, records: &[StoredRecord], roll_id: &str) -> Vec<String> {
        let wanted = normalize_roll_id(roll_id);
        records
            .iter()
            .rev()
            .find(|record| record.normalized_roll_id() == wanted)
            .map(|record| vec![record.date_label()])
            .unwrap_or_default()
    }

    /// Returns every distinct date label recorded for a roll, in insertion
    /// order, for building a date picker.
    pub fn available_dates(&self, records: &[StoredRecord], roll_id: &str) -> Vec<String> {
        let wanted = normalize_roll_id(roll_id);
        let mut labels: Vec<String> = Vec::new();
        for record in records {
            if record.normalized_roll_id() == wanted {
                let label = record.date_label();
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
        }
        labels
    }

    /// Pivots a series into a position-by-date table.
    pub fn pivot(&self, series: &ComparisonSeries) -> PivotTable {
        let mut cells: BTreeMap<u32, BTreeMap<String, f64>> = BTreeMap::new();
        for point in &series.points {
            cells
                .entry(point.position)
                .or_default()
                .insert(point.date_label.clone(), point.diameter);
        }

        PivotTable {
            positions: self.config.positions.clone(),
            date_labels: series.date_labels(),
            cells,
        }
    }

    /// Returns the `(low, high)` diameter axis range for charting a series,
    /// per the configured [`AxisScaling`] mode.
    ///
    /// An empty series under `FitObserved` has nothing to fit, so it falls
    /// back to the tolerance band with the same padding.
    pub fn axis_range(&self, series: &ComparisonSeries) -> (f64, f64) {
        let band = self.config.tolerance;
        match self.config.axis_scaling {
            AxisScaling::FitObserved { padding } => match series.diameter_range() {
                Some((min, max)) => (min - padding, max + padding),
                None => (band.min_dia - padding, band.max_dia + padding),
            },
            AxisScaling::ToleranceBand { margin } => {
                (band.min_dia - margin, band.max_dia + margin)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToleranceBand;

    fn config() -> ProfileConfig {
        ProfileConfig::new(vec![100, 350, 600], ToleranceBand::new(1200.0, 1400.0)).unwrap()
    }

    fn record(date: &str, roll_id: &str, readings: &[(u32, f64)]) -> StoredRecord {
        StoredRecord {
            date_raw: date.to_string(),
            roll_id: roll_id.to_string(),
            attributes: BTreeMap::new(),
            readings: readings.iter().copied().collect(),
        }
    }

    fn labels(labels: &[&str]) -> Vec<String> {
        labels.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_series_orders_dates_then_positions() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        let records = [
            record("2024-01-01", "R1", &[(100, 1300.0), (350, 1301.0)]),
            record("2024-02-01", "R1", &[(100, 1302.0), (600, 1303.0)]),
        ];

        let series = reshaper.for_roll(&records, "R1", &labels(&["2024-01-01", "2024-02-01"]));

        let shape: Vec<(u32, &str, f64)> = series
            .points
            .iter()
            .map(|p| (p.position, p.date_label.as_str(), p.diameter))
            .collect();
        assert_eq!(
            shape,
            [
                (100, "2024-01-01", 1300.0),
                (350, "2024-01-01", 1301.0),
                (100, "2024-02-01", 1302.0),
                (600, "2024-02-01", 1303.0),
            ]
        );
    }

    #[test]
    fn test_series_filters_roll_id_normalized() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        let records = [
            record("2024-01-01", " br-17 ", &[(100, 1300.0)]),
            record("2024-01-01", "OTHER", &[(100, 1310.0)]),
        ];

        let series = reshaper.for_roll(&records, "BR-17", &labels(&["2024-01-01"]));

        assert_eq!(series.roll_id, "BR-17");
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].diameter, 1300.0);
    }

    #[test]
    fn test_series_skips_absent_cells_without_zero_fill() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        let records = [record("2024-01-01", "R1", &[(350, 1301.0)])];

        let series = reshaper.for_roll(&records, "R1", &labels(&["2024-01-01"]));

        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].position, 350);
    }

    #[test]
    fn test_unparseable_date_uses_raw_label() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        let records = [record("regrind #3", "R1", &[(100, 1300.0)])];

        assert_eq!(reshaper.available_dates(&records, "R1"), ["regrind #3"]);

        let series = reshaper.for_roll(&records, "R1", &labels(&["regrind #3"]));
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].date_label, "regrind #3");
    }

    #[test]
    fn test_same_label_last_record_wins() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        let records = [
            record("2024-01-01", "R1", &[(100, 1300.0)]),
            record("2024-01-01", "R1", &[(100, 1310.0)]),
        ];

        let series = reshaper.for_roll(&records, "R1", &labels(&["2024-01-01"]));
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].diameter, 1310.0);
    }

    #[test]
    fn test_default_dates_is_most_recently_inserted() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        // Insertion order deliberately not chronological.
        let records = [
            record("2024-03-01", "R1", &[(100, 1300.0)]),
            record("2024-01-01", "R1", &[(100, 1301.0)]),
            record("2024-02-01", "OTHER", &[(100, 1302.0)]),
        ];

        assert_eq!(reshaper.default_dates(&records, "R1"), ["2024-01-01"]);
        assert!(reshaper.default_dates(&records, "UNKNOWN").is_empty());
    }

    #[test]
    fn test_pivot_full_grid_round_trip() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        let records = [
            record("2024-01-01", "R1", &[(100, 1300.0), (350, 1301.0), (600, 1302.0)]),
            record("2024-02-01", "R1", &[(100, 1305.0), (350, 1306.0), (600, 1307.0)]),
        ];
        let chosen = labels(&["2024-01-01", "2024-02-01"]);

        let series = reshaper.for_roll(&records, "R1", &chosen);
        let pivot = reshaper.pivot(&series);

        assert_eq!(pivot.positions, [100, 350, 600]);
        assert_eq!(pivot.date_labels, chosen);
        for point in &series.points {
            assert_eq!(
                pivot.cell(point.position, &point.date_label),
                Some(point.diameter)
            );
        }
    }

    #[test]
    fn test_pivot_leaves_missing_cells_blank() {
        let config = config();
        let reshaper = ComparisonReshaper::new(&config);
        let records = [record("2024-01-01", "R1", &[(100, 1300.0)])];

        let series = reshaper.for_roll(&records, "R1", &labels(&["2024-01-01"]));
        let pivot = reshaper.pivot(&series);

        // All configured positions appear as rows, measured or not.
        assert_eq!(pivot.positions, [100, 350, 600]);
        assert_eq!(pivot.cell(100, "2024-01-01"), Some(1300.0));
        assert_eq!(pivot.cell(350, "2024-01-01"), None);
        assert_eq!(pivot.cell(600, "2024-01-01"), None);
    }

    #[test]
    fn test_axis_range_fit_observed() {
        let mut config = config();
        config.axis_scaling = AxisScaling::FitObserved { padding: 0.5 };
        let reshaper = ComparisonReshaper::new(&config);
        let records = [record("2024-01-01", "R1", &[(100, 1300.0), (350, 1310.0)])];

        let series = reshaper.for_roll(&records, "R1", &labels(&["2024-01-01"]));
        assert_eq!(reshaper.axis_range(&series), (1299.5, 1310.5));

        // Empty series falls back to the tolerance band.
        let empty = reshaper.for_roll(&records, "UNKNOWN", &labels(&["2024-01-01"]));
        assert_eq!(reshaper.axis_range(&empty), (1199.5, 1400.5));
    }

    #[test]
    fn test_axis_range_tolerance_band() {
        let mut config = config();
        config.axis_scaling = AxisScaling::ToleranceBand { margin: 2.0 };
        let reshaper = ComparisonReshaper::new(&config);

        let series = ComparisonSeries::default();
        assert_eq!(reshaper.axis_range(&series), (1198.0, 1402.0));
    }
}
