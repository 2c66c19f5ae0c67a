//! Unit handling for the quantities climate indices operate on.
//!
//! This is deliberately small: the engine only ever converts threshold values
//! into a variable's unit, so it supports the handful of unit families found
//! in daily climate data (temperature, precipitation rate and amount,
//! dimensionless fractions). A conversion between incompatible dimensions is
//! a fatal configuration error, never silently ignored.

use crate::errors::{ClimError, ClimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical dimension of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Temperature,
    PrecipitationRate,
    Length,
    Dimensionless,
}

/// A parsed unit: an affine map onto the canonical unit of its dimension.
///
/// Canonical units: K (temperature), mm/day (precipitation rate),
/// mm (length), 1 (dimensionless). `canonical = value * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    symbol: &'static str,
    dimension: Dimension,
    scale: f64,
    offset: f64,
}

impl Unit {
    /// Parse a unit string. Whitespace-insensitive for compound symbols.
    pub fn parse(unit: &str) -> ClimResult<Self> {
        let normalized: String = unit.split_whitespace().collect::<Vec<_>>().join(" ");
        let known = |symbol, dimension, scale, offset| Unit {
            symbol,
            dimension,
            scale,
            offset,
        };
        match normalized.as_str() {
            "K" | "kelvin" => Ok(known("K", Dimension::Temperature, 1.0, 0.0)),
            "degC" | "°C" | "celsius" | "degrees_Celsius" => {
                Ok(known("degC", Dimension::Temperature, 1.0, 273.15))
            }
            "degF" | "°F" | "fahrenheit" => Ok(known(
                "degF",
                Dimension::Temperature,
                5.0 / 9.0,
                255.372_222_222_222_23,
            )),
            "mm/day" | "mm day-1" | "mm d-1" => {
                Ok(known("mm/day", Dimension::PrecipitationRate, 1.0, 0.0))
            }
            // Mass flux of water: 1 kg m-2 s-1 == 86400 mm/day.
            "kg m-2 s-1" | "kg/m2/s" | "kg/m^2/s" => Ok(known(
                "kg m-2 s-1",
                Dimension::PrecipitationRate,
                86_400.0,
                0.0,
            )),
            "mm" => Ok(known("mm", Dimension::Length, 1.0, 0.0)),
            "cm" => Ok(known("cm", Dimension::Length, 10.0, 0.0)),
            "m" => Ok(known("m", Dimension::Length, 1000.0, 0.0)),
            "1" | "" => Ok(known("1", Dimension::Dimensionless, 1.0, 0.0)),
            "%" | "percent" => Ok(known("%", Dimension::Dimensionless, 0.01, 0.0)),
            _ => Err(ClimError::UnknownUnit {
                unit: unit.to_string(),
            }),
        }
    }

    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Convert a value expressed in `self` into `to`.
    pub fn convert(&self, value: f64, to: &Unit) -> ClimResult<f64> {
        if !self.is_compatible(to) {
            return Err(ClimError::IncompatibleUnits {
                from: self.symbol.to_string(),
                to: to.symbol.to_string(),
            });
        }
        let canonical = value * self.scale + self.offset;
        Ok((canonical - to.offset) / to.scale)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Convert a value between two unit strings.
pub fn convert(value: f64, from: &str, to: &str) -> ClimResult<f64> {
    let from = Unit::parse(from)?;
    let to = Unit::parse(to)?;
    from.convert(value, &to)
}
