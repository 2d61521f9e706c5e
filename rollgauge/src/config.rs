//! Deployment configuration for the rollgauge measurement engine.
//!
//! Every observed mill deployment measures a different roll family: different
//! axial positions, different tolerance bands, different categorical
//! attributes, and different taper geometry. All of those values are
//! therefore supplied externally through [`ProfileConfig`] and validated at
//! construction time; nothing in the engine hardcodes a roll family.
//!
//! # Example
//!
//! ```rust
//! use rollgauge::config::{AttributeSpec, ProfileConfig, ToleranceBand};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProfileConfig::new(
//!     vec![100, 350, 600, 850, 1100, 1350, 1600],
//!     ToleranceBand::new(1200.0, 1400.0),
//! )?
//! .with_attribute(AttributeSpec::required("stand", ["F1", "F2", "F3"]))
//! .with_attribute(AttributeSpec::optional("mounting", ["top", "bottom"]));
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::profile::TaperGeometry;

/// Default number of table rows per page, used by every observed deployment.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default sentinel value for a categorical attribute left unselected.
pub const DEFAULT_UNSELECTED_SENTINEL: &str = "unselected";

/// Complete configuration for one roll-family deployment.
///
/// A `ProfileConfig` defines the fixed axial position set (canonical column
/// ordering for storage and reshape), the closed tolerance interval every
/// present reading must fall into, the categorical attributes a submission
/// may carry, and the policies that vary across deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Axial measurement positions in mm, strictly increasing.
    ///
    /// This set is fixed per deployment and is used as the canonical column
    /// ordering for both storage and reshape.
    pub positions: Vec<u32>,

    /// Closed tolerance interval every present reading must lie within.
    pub tolerance: ToleranceBand,

    /// Categorical attributes a submission may carry, in column order.
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,

    /// Sentinel value marking a categorical attribute as unselected.
    #[serde(default = "default_sentinel")]
    pub unselected_sentinel: String,

    /// Policy applied when a record with the same `(capture_date, roll_id)`
    /// key is appended again.
    #[serde(default)]
    pub dedup_policy: DedupPolicy,

    /// Whether a reading that parses to exactly zero is treated as absent.
    ///
    /// The source systems used zero as a "not measured" sentinel, which
    /// conflates a genuine zero reading with absence. The conflation is kept
    /// as the default but can be switched off per deployment.
    #[serde(default = "default_true")]
    pub zero_is_absent: bool,

    /// Whether duplicate store header names are renamed to unique display
    /// names. Columns are always addressed by position internally; this flag
    /// only affects the display header.
    #[serde(default)]
    pub rename_duplicate_headers: bool,

    /// Number of rows per page in paginated views.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Axis scaling mode for downstream chart rendering.
    #[serde(default)]
    pub axis_scaling: AxisScaling,

    /// Taper geometry for the ideal profile, when the deployment defines one.
    #[serde(default)]
    pub geometry: Option<TaperGeometry>,
}

fn default_sentinel() -> String {
    DEFAULT_UNSELECTED_SENTINEL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl ProfileConfig {
    /// Creates a configuration with the given positions and tolerance band
    /// and default policies.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the positions or tolerance band are invalid.
    pub fn new(positions: Vec<u32>, tolerance: ToleranceBand) -> Result<Self> {
        let config = Self {
            positions,
            tolerance,
            attributes: Vec::new(),
            unselected_sentinel: default_sentinel(),
            dedup_policy: DedupPolicy::default(),
            zero_is_absent: true,
            rename_duplicate_headers: false,
            page_size: DEFAULT_PAGE_SIZE,
            axis_scaling: AxisScaling::default(),
            geometry: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Adds a categorical attribute, preserving column order.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Sets the dedup policy.
    #[must_use]
    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.dedup_policy = policy;
        self
    }

    /// Sets the taper geometry for the ideal profile.
    #[must_use]
    pub fn with_geometry(mut self, geometry: TaperGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails:
    /// - No positions, or positions not strictly increasing
    /// - Empty or inverted tolerance band
    /// - An attribute with no allowed values
    /// - Zero page size
    /// - Inconsistent taper geometry
    pub fn validate(&self) -> Result<()> {
        if self.positions.is_empty() {
            return Err(ConfigError::NoPositions.into());
        }

        for window in self.positions.windows(2) {
            if window[1] <= window[0] {
                return Err(ConfigError::PositionsNotOrdered {
                    position: window[1],
                }
                .into());
            }
        }

        self.tolerance.validate()?;

        for attribute in &self.attributes {
            if attribute.values.is_empty() {
                return Err(ConfigError::EmptyAttributeValues {
                    attribute: attribute.name.clone(),
                }
                .into());
            }
        }

        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize {
                size: self.page_size,
            }
            .into());
        }

        if let Some(geometry) = &self.geometry {
            geometry.validate()?;
        }

        Ok(())
    }

    /// Returns the names of attributes that must be selected at submission.
    pub fn required_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
    }
}

/// The closed `[min_dia, max_dia]` interval a reading must fall within.
///
/// Values observed across deployments range from 1200-1400 mm for backup
/// rolls down to 850-950 mm for barrel rolls, so the band is always supplied
/// by the deployment, never assumed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBand {
    /// Lower bound in mm, inclusive.
    pub min_dia: f64,
    /// Upper bound in mm, inclusive.
    pub max_dia: f64,
}

impl ToleranceBand {
    /// Creates a tolerance band. Bounds are validated by
    /// [`ProfileConfig::validate`].
    pub fn new(min_dia: f64, max_dia: f64) -> Self {
        Self { min_dia, max_dia }
    }

    /// Checks whether a value lies within the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min_dia && value <= self.max_dia
    }

    fn validate(&self) -> Result<()> {
        if !(self.min_dia > 0.0 && self.min_dia < self.max_dia) {
            return Err(ConfigError::InvalidToleranceBand {
                min_dia: self.min_dia,
                max_dia: self.max_dia,
            }
            .into());
        }
        Ok(())
    }
}

/// One categorical attribute a submission may carry.
///
/// Whether an attribute is required varies across deployments: one mill
/// requires the stand identifier, another leaves every tag optional. The
/// requirement is therefore part of the deployment configuration, not an
/// engine assumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// The attribute name, used as the store column header.
    pub name: String,
    /// The allowed enumerated values.
    pub values: Vec<String>,
    /// Whether a submission must select a value for this attribute.
    #[serde(default)]
    pub required: bool,
}

impl AttributeSpec {
    /// Creates a required attribute.
    pub fn required<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            required: true,
        }
    }

    /// Creates an optional attribute.
    pub fn optional<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            required: false,
        }
    }

    /// Checks whether a value is one of the allowed enumerated values.
    pub fn allows(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Policy applied when appending a record whose `(capture_date, roll_id)`
/// key already exists in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Reject the append and keep the existing record.
    #[default]
    Reject,
    /// Delete the existing record, then append the new one.
    Overwrite,
    /// Append regardless; the store may hold several records per key.
    Allow,
}

/// Axis scaling mode for any downstream chart consuming a comparison series.
///
/// Either mode is a legitimate choice depending on whether an operator wants
/// to see fine profile structure or position within the tolerance band, so
/// the mode is user-selectable rather than silently one or the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScaling {
    /// Fit tightly to the observed min/max diameter with symmetric padding.
    FitObserved {
        /// Symmetric padding in mm added on both sides.
        padding: f64,
    },
    /// Fix to the configured tolerance band with a margin.
    ToleranceBand {
        /// Margin in mm added on both sides of the band.
        margin: f64,
    },
}

impl Default for AxisScaling {
    fn default() -> Self {
        Self::FitObserved { padding: 0.5 }
    }
}
