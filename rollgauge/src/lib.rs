//! # rollgauge
//!
//! Roll profile measurement validation, ideal-curve, and comparison engine.
//!
//! rollgauge is a Rust library for collecting roll-diameter measurements at
//! fixed axial positions, validating them against manufacturing tolerances,
//! and reshaping the accumulated history for comparison against an ideal
//! taper profile. It is the engine behind shop-floor measurement forms: the
//! form rendering, the remote spreadsheet binding, and the chart/document
//! exporters all sit outside and consume its plain tabular shapes.
//!
//! ## Key Properties
//!
//! - Exhaustive validation: every violation in a submission is collected and
//!   returned in one batch, never short-circuited
//! - Deterministic ideal curves from roll geometry, linear or crown taper
//! - Append-only storage behind an abstract [`RecordStore`] boundary
//! - Explicit, configuration-driven policies for everything that varies
//!   across mill deployments: positions, tolerance bands, attributes, dedup,
//!   the zero-as-absent sentinel, pagination, and axis scaling
//! - Pure, stateless reshape: series and pivots are recomputed per request
//!   and carry no persistent identity
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use rollgauge::{
//!     ComparisonReshaper, MemoryStore, ProfileConfig, RawSubmission, RecordRepository,
//!     ToleranceBand, validate,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Deployment configuration: positions and tolerance band come from the
//! // roll family, never from the engine.
//! let config = ProfileConfig::new(
//!     vec![100, 350, 600, 850, 1100, 1350, 1600],
//!     ToleranceBand::new(1200.0, 1400.0),
//! )?;
//!
//! // Validate a submission.
//! let mut readings = BTreeMap::new();
//! readings.insert(100, "1305.25".to_string());
//! readings.insert(850, "1304.20".to_string());
//! let raw = RawSubmission {
//!     capture_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!     roll_id: "br-17".to_string(),
//!     attributes: BTreeMap::new(),
//!     readings,
//! };
//! let set = validate(&raw, &config).expect("in-bounds submission");
//!
//! // Append it and read the history back.
//! let store = MemoryStore::for_config(&config);
//! let mut repository = RecordRepository::new(store, config.clone())?;
//! repository.append(&set)?;
//!
//! let records = repository.find_by_roll_id("BR-17")?;
//! let reshaper = ComparisonReshaper::new(&config);
//! let dates = reshaper.default_dates(&records, "BR-17");
//! let series = reshaper.for_roll(&records, "BR-17", &dates);
//! assert_eq!(series.points.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ProfileConfig`] - externally supplied deployment configuration
//! - [`validate`] - tolerance validation of raw submissions
//! - [`TaperGeometry`] - ideal profile strategies (linear / crown taper)
//! - [`RecordRepository`] - append, dedup, pagination, roll lookup
//! - [`ComparisonReshaper`] - long-form series, pivot tables, axis ranges
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`config`] - deployment configuration types
//! - [`measurement`] - measurement sets and validation
//! - [`profile`] - ideal profile generation and deviation
//! - [`store`] - the record store boundary and bundled implementations
//! - [`repository`] - pagination, dedup, and lookup over a store
//! - [`reshape`] - comparison series and pivot views
//! - [`error`] - error types
//!
//! ## Concurrency Model
//!
//! Single-threaded, request-per-interaction: each operation is one
//! synchronous call chain with no background tasks, no locks, and no
//! retries. The record store is the only boundary that may block, and
//! concurrent writers are last-write-wins there; coordinating them is
//! explicitly out of scope.

pub mod config;
pub mod error;
pub mod measurement;
pub mod profile;
pub mod repository;
pub mod reshape;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use config::{AttributeSpec, AxisScaling, DedupPolicy, ProfileConfig, ToleranceBand};
pub use error::{Result, RollgaugeError, StoreError, ValidationIssue};
pub use measurement::{MeasurementSet, RawSubmission, StoredRecord, validate};
pub use profile::{DeviationPoint, TaperGeometry, deviation};
pub use repository::{Page, RecordRepository};
pub use reshape::{ComparisonReshaper, ComparisonSeries, PivotTable, SeriesPoint};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
