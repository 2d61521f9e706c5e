//! Ideal profile generation for roll diameter comparison.
//!
//! A freshly ground roll has a theoretical diameter curve determined by its
//! taper geometry. This module computes that curve so measured profiles can
//! be compared against it. Two taper shapes exist in the field:
//!
//! - **Linear taper** - the diameter falls linearly from a start value to an
//!   end value across the full barrel span.
//! - **Symmetric crown taper** - the diameter holds a flat mid value over the
//!   central zone and tapers linearly down to `mid - taper_height / 2` inside
//!   a fixed-width zone at each barrel end.
//!
//! Both strategies are pure functions of their geometry parameters: no state,
//! no hidden configuration, deterministic for identical inputs. Internal math
//! runs at full floating-point precision; only curve values handed to display
//! layers are rounded to 2 decimal places.
//!
//! # Example
//!
//! ```rust
//! use rollgauge::profile::TaperGeometry;
//!
//! let geometry = TaperGeometry::Crown {
//!     mid_dia: 894.7,
//!     barrel_length: 1700.0,
//!     taper_height: 1.5,
//!     taper_zone: 500.0,
//! };
//!
//! // Flat mid zone at barrel center, full taper at the ends.
//! assert_eq!(rollgauge::profile::round2(geometry.ideal_diameter(850.0)), 894.70);
//! assert_eq!(rollgauge::profile::round2(geometry.ideal_diameter(0.0)), 893.95);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Taper geometry for one roll family, selecting the ideal-curve strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TaperGeometry {
    /// Diameter falls linearly from `start_dia` to `end_dia` over `span`.
    Linear {
        /// Diameter at position 0, in mm.
        start_dia: f64,
        /// Diameter at position `span`, in mm.
        end_dia: f64,
        /// Barrel span in mm.
        span: f64,
    },

    /// Flat `mid_dia` center with symmetric linear taper zones at both ends.
    Crown {
        /// Diameter across the flat central zone, in mm.
        mid_dia: f64,
        /// Full barrel length in mm.
        barrel_length: f64,
        /// Total diameter drop at the extreme ends, in mm. Each end sits
        /// `taper_height / 2` below `mid_dia`.
        taper_height: f64,
        /// Width of the taper zone at each end, in mm.
        taper_zone: f64,
    },
}

impl TaperGeometry {
    /// Computes the ideal diameter at an axial position, in mm.
    ///
    /// Positions are interpreted in barrel coordinates (0 at one end). For
    /// the crown strategy, positions outside `[0, barrel_length]` clamp to
    /// the nearest barrel end.
    pub fn ideal_diameter(&self, position: f64) -> f64 {
        match *self {
            Self::Linear {
                start_dia,
                end_dia,
                span,
            } => start_dia + (position / span) * (end_dia - start_dia),
            Self::Crown {
                mid_dia,
                barrel_length,
                taper_height,
                taper_zone,
            } => {
                let p = position.clamp(0.0, barrel_length);
                let half = taper_height / 2.0;

                if p < taper_zone {
                    // Rising edge: mid - half at the end, mid at the boundary.
                    mid_dia - half + (p / taper_zone) * half
                } else if p > barrel_length - taper_zone {
                    let from_boundary = p - (barrel_length - taper_zone);
                    mid_dia - (from_boundary / taper_zone) * half
                } else {
                    mid_dia
                }
            }
        }
    }

    /// Computes the ideal curve over the configured positions, rounded to
    /// 2 decimal places for display consistency.
    pub fn ideal_curve(&self, positions: &[u32]) -> Vec<f64> {
        positions
            .iter()
            .map(|&p| round2(self.ideal_diameter(f64::from(p))))
            .collect()
    }

    /// Validates the geometry parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidGeometry`] if any parameter is
    /// non-positive where it must be positive, or if the two crown taper
    /// zones overlap.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Linear {
                start_dia,
                end_dia,
                span,
            } => {
                if span <= 0.0 {
                    return Err(invalid_geometry(format!("span must be positive, got {span}")));
                }
                if start_dia <= 0.0 || end_dia <= 0.0 {
                    return Err(invalid_geometry(format!(
                        "diameters must be positive, got start {start_dia} / end {end_dia}"
                    )));
                }
            }
            Self::Crown {
                mid_dia,
                barrel_length,
                taper_height,
                taper_zone,
            } => {
                if mid_dia <= 0.0 {
                    return Err(invalid_geometry(format!(
                        "mid diameter must be positive, got {mid_dia}"
                    )));
                }
                if barrel_length <= 0.0 || taper_zone <= 0.0 {
                    return Err(invalid_geometry(format!(
                        "barrel length {barrel_length} and taper zone {taper_zone} must be positive"
                    )));
                }
                if taper_height < 0.0 {
                    return Err(invalid_geometry(format!(
                        "taper height must be non-negative, got {taper_height}"
                    )));
                }
                if 2.0 * taper_zone > barrel_length {
                    return Err(invalid_geometry(format!(
                        "taper zones ({taper_zone} mm each) overlap on a {barrel_length} mm barrel"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invalid_geometry(reason: String) -> crate::error::RollgaugeError {
    ConfigError::InvalidGeometry { reason }.into()
}

/// One measured position paired with its ideal value and signed deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationPoint {
    /// Axial position in mm.
    pub position: u32,
    /// The measured diameter in mm, as stored.
    pub measured: f64,
    /// The ideal diameter in mm, rounded to 2 decimals.
    pub ideal: f64,
    /// `measured - ideal`, rounded to 2 decimals.
    pub deviation: f64,
}

/// Pairs each measured reading with its ideal value.
///
/// Positions without a reading are skipped; the deviation series covers only
/// what was actually measured. Order follows the configured position set.
pub fn deviation(
    readings: &BTreeMap<u32, f64>,
    positions: &[u32],
    geometry: &TaperGeometry,
) -> Vec<DeviationPoint> {
    positions
        .iter()
        .filter_map(|&position| {
            readings.get(&position).map(|&measured| {
                let ideal = round2(geometry.ideal_diameter(f64::from(position)));
                DeviationPoint {
                    position,
                    measured,
                    ideal,
                    deviation: round2(measured - ideal),
                }
            })
        })
        .collect()
}

/// Rounds a value to 2 decimal places for display consistency.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
