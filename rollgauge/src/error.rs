//! Error types for the rollgauge measurement engine.

use thiserror::Error;

/// The main error type for all rollgauge operations.
///
/// This enum covers the error conditions that can occur across the engine,
/// from configuration validation to record storage and retrieval.
#[derive(Error, Debug)]
pub enum RollgaugeError {
    /// Error in the deployment configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error at the record store boundary.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error during repository operations (append, paginate, lookup).
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors produced when validating a deployment configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No axial positions are configured.
    #[error("at least one axial position must be configured")]
    NoPositions,

    /// Axial positions must be strictly increasing.
    #[error("axial positions must be strictly increasing: {position} mm repeats or regresses")]
    PositionsNotOrdered {
        /// The offending position.
        position: u32,
    },

    /// The tolerance band is empty or inverted.
    #[error("invalid tolerance band: min {min_dia} mm must be positive and below max {max_dia} mm")]
    InvalidToleranceBand {
        /// Lower tolerance bound in mm.
        min_dia: f64,
        /// Upper tolerance bound in mm.
        max_dia: f64,
    },

    /// A categorical attribute has no allowed values.
    #[error("attribute '{attribute}' has no allowed values")]
    EmptyAttributeValues {
        /// The attribute name.
        attribute: String,
    },

    /// Page size must be non-zero.
    #[error("invalid page size: {size} (must be > 0)")]
    InvalidPageSize {
        /// The invalid page size.
        size: usize,
    },

    /// The taper geometry parameters are inconsistent.
    #[error("invalid taper geometry: {reason}")]
    InvalidGeometry {
        /// Description of what makes the geometry invalid.
        reason: String,
    },
}

/// Errors that can occur at the record store boundary.
///
/// Store failures are surfaced to the caller as-is; the engine never retries
/// and never persists a partial row.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Description from the store boundary, surfaced verbatim.
        reason: String,
    },

    /// I/O failure on a file-backed store.
    #[error("store I/O failed for '{path}': {source}")]
    Io {
        /// The file path involved.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store document is corrupted or has an unsupported format.
    #[error("corrupted store document '{path}': {reason}")]
    Corrupted {
        /// The file path involved.
        path: String,
        /// Description of what was invalid.
        reason: String,
    },

    /// Failed to serialize or deserialize the store document.
    #[error("failed to serialize store document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A row does not match the configured column layout.
    #[error("row width mismatch: expected {expected} columns, found {found}")]
    RowWidthMismatch {
        /// Number of columns the header defines.
        expected: usize,
        /// Number of columns the row carries.
        found: usize,
    },

    /// The requested row index does not exist.
    #[error("row index {index} out of bounds: store holds {rows} rows")]
    RowIndexOutOfBounds {
        /// The requested 0-based row index.
        index: usize,
        /// Number of rows in the store.
        rows: usize,
    },

    /// The store does not support row deletion.
    #[error("this store does not support row deletion")]
    DeleteUnsupported,
}

/// Errors that can occur during repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A record with the same capture date and roll id already exists and
    /// the dedup policy is set to reject duplicates.
    #[error("record for roll '{roll_id}' on {capture_date} already exists")]
    DuplicateRecord {
        /// The normalized roll identifier.
        roll_id: String,
        /// The canonical capture date label.
        capture_date: String,
    },
}

/// A single problem found while validating a submitted measurement set.
///
/// Issues are collected exhaustively and returned as an ordered batch, never
/// short-circuited, so a caller can display every violation in one pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// A required field was left empty or unselected.
    #[error("required field '{field}' is missing or unselected")]
    MissingRequiredField {
        /// The field or attribute name.
        field: String,
    },

    /// A reading parsed to a number outside the tolerance band.
    #[error("reading at {position} mm is {value} mm, outside tolerance {min} mm..{max} mm")]
    OutOfRangeReading {
        /// The axial position of the offending reading.
        position: u32,
        /// The parsed diameter value in mm.
        value: f64,
        /// Lower tolerance bound in mm.
        min: f64,
        /// Upper tolerance bound in mm.
        max: f64,
    },
}

/// Type alias for `Result<T, RollgaugeError>`.
pub type Result<T> = std::result::Result<T, RollgaugeError>;
