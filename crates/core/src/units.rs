//! Real-world length units
//!
//! Calibrations and conditions carry free-form unit strings ("ft", "LF", "sq ft").
//! This module recognises the common ones so that a measurement drawn under a
//! condition in one unit and a calibration in another is converted rather than
//! silently mislabelled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Units offered when calibrating a sheet.
pub const CALIBRATION_UNITS: [LengthUnit; 6] = [
    LengthUnit::Meters,
    LengthUnit::Feet,
    LengthUnit::Centimeters,
    LengthUnit::Millimeters,
    LengthUnit::Inches,
    LengthUnit::Yards,
];

/// A linear unit of length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthUnit {
    Meters,
    Feet,
    Centimeters,
    Millimeters,
    Inches,
    Yards,
}

impl LengthUnit {
    /// Canonical short symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Meters => "m",
            LengthUnit::Feet => "ft",
            LengthUnit::Centimeters => "cm",
            LengthUnit::Millimeters => "mm",
            LengthUnit::Inches => "in",
            LengthUnit::Yards => "yd",
        }
    }

    /// Length of one unit in metres.
    pub fn meters(self) -> f64 {
        match self {
            LengthUnit::Meters => 1.0,
            LengthUnit::Feet => 0.3048,
            LengthUnit::Centimeters => 0.01,
            LengthUnit::Millimeters => 0.001,
            LengthUnit::Inches => 0.0254,
            LengthUnit::Yards => 0.9144,
        }
    }

    /// Multiplier converting a length in `self` into `target`.
    pub fn factor_to(self, target: LengthUnit) -> f64 {
        if self == target {
            1.0
        } else {
            self.meters() / target.meters()
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised length unit: {0}")]
pub struct UnknownUnit(pub String);

impl FromStr for LengthUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let unit = match normalized.as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" | "lm" => LengthUnit::Meters,
            "ft" | "foot" | "feet" | "'" | "lf" => LengthUnit::Feet,
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => {
                LengthUnit::Centimeters
            }
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => {
                LengthUnit::Millimeters
            }
            "in" | "inch" | "inches" | "\"" => LengthUnit::Inches,
            "yd" | "yard" | "yards" => LengthUnit::Yards,
            _ => return Err(UnknownUnit(s.to_string())),
        };
        Ok(unit)
    }
}

/// What a condition's unit string measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Length(LengthUnit),
    Area(LengthUnit),
}

/// Classifies a unit string as a length or an area unit.
///
/// Area forms accepted: "SF" / "SY" / "SM", "sq ft", "ft²", "ft2", "m^2".
pub fn classify(unit: &str) -> Option<UnitKind> {
    let trimmed = unit.trim();
    if let Ok(length) = trimmed.parse::<LengthUnit>() {
        return Some(UnitKind::Length(length));
    }

    let lower = trimmed.to_ascii_lowercase();
    let shorthand = match lower.as_str() {
        "sf" => Some(LengthUnit::Feet),
        "sy" => Some(LengthUnit::Yards),
        "sm" => Some(LengthUnit::Meters),
        _ => None,
    };
    if let Some(base) = shorthand {
        return Some(UnitKind::Area(base));
    }

    let base = lower
        .strip_prefix("sq ")
        .or_else(|| lower.strip_prefix("sq."))
        .or_else(|| lower.strip_prefix("square "))
        .or_else(|| lower.strip_suffix('²'))
        .or_else(|| lower.strip_suffix("^2"))
        .or_else(|| lower.strip_suffix('2'))?;

    base.trim().parse::<LengthUnit>().ok().map(UnitKind::Area)
}

/// Converts a length between two unit strings, if both are recognised lengths.
pub fn convert_length(value: f64, from: &str, to: &str) -> Option<f64> {
    let from = from.parse::<LengthUnit>().ok()?;
    match classify(to)? {
        UnitKind::Length(to) => Some(value * from.factor_to(to)),
        UnitKind::Area(_) => None,
    }
}

/// Converts an area whose side unit is `from` into the area unit `to`.
///
/// `to` may name either an area unit ("SF") or the base length unit ("ft").
pub fn convert_area(value: f64, from: &str, to: &str) -> Option<f64> {
    let from = from.parse::<LengthUnit>().ok()?;
    let to = match classify(to)? {
        UnitKind::Length(unit) | UnitKind::Area(unit) => unit,
    };
    let factor = from.factor_to(to);
    Some(value * factor * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("Feet".parse::<LengthUnit>().unwrap(), LengthUnit::Feet);
        assert_eq!(" LF ".parse::<LengthUnit>().unwrap(), LengthUnit::Feet);
        assert_eq!("\"".parse::<LengthUnit>().unwrap(), LengthUnit::Inches);
        assert!("furlong".parse::<LengthUnit>().is_err());
    }

    #[test]
    fn classifies_area_forms() {
        assert_eq!(classify("SF"), Some(UnitKind::Area(LengthUnit::Feet)));
        assert_eq!(classify("sq ft"), Some(UnitKind::Area(LengthUnit::Feet)));
        assert_eq!(classify("m²"), Some(UnitKind::Area(LengthUnit::Meters)));
        assert_eq!(classify("m^2"), Some(UnitKind::Area(LengthUnit::Meters)));
        assert_eq!(classify("ft"), Some(UnitKind::Length(LengthUnit::Feet)));
        assert_eq!(classify("EA"), None);
    }

    #[test]
    fn converts_lengths() {
        let inches = convert_length(2.0, "ft", "in").unwrap();
        assert!((inches - 24.0).abs() < 1e-9);
        assert_eq!(convert_length(1.0, "ft", "EA"), None);
        assert_eq!(convert_length(1.0, "ft", "SF"), None);
    }

    #[test]
    fn converts_areas_with_squared_factor() {
        let sf = convert_area(1.0, "yd", "SF").unwrap();
        assert!((sf - 9.0).abs() < 1e-9);
        let same = convert_area(3.5, "ft", "ft").unwrap();
        assert_eq!(same, 3.5);
    }

    #[test]
    fn calibration_units_round_trip_through_symbol() {
        for unit in CALIBRATION_UNITS {
            assert_eq!(unit.symbol().parse::<LengthUnit>().unwrap(), unit);
        }
    }
}
