//! Takeoff conditions
//!
//! A condition is the user's classification for what is being measured ("Interior
//! wall", "Carpet", "Outlets"). It fixes the measurement type and the unit the
//! result is reported in. Conditions are owned by the surrounding application.

use crate::measurement::MeasurementType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionId(pub String);

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConditionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// RGBA color used to draw a condition's measurements, written as `#RRGGBB[AA]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a: channel(6)? }),
            _ => None,
        }
    }

    /// `#RRGGBB`, with an alpha pair only when not opaque.
    pub fn to_hex(&self) -> String {
        let rgb = format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b);
        if self.a == u8::MAX {
            rgb
        } else {
            format!("{rgb}{:02X}", self.a)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #RRGGBB or #RRGGBBAA")]
pub struct InvalidColor(pub String);

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or(InvalidColor(value))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(255, 0, 0)
    }
}

/// A condition as selected in the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub name: String,
    pub measurement_type: MeasurementType,
    /// Unit results are reported in ("LF", "SF", "EA", "m", ...)
    pub unit: String,
    #[serde(default)]
    pub color: Color,
    /// Area conditions also report the polygon perimeter
    #[serde(default)]
    pub include_perimeter: bool,
}

impl Condition {
    pub fn new(
        id: impl Into<ConditionId>,
        name: impl Into<String>,
        measurement_type: MeasurementType,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            measurement_type,
            unit: unit.into(),
            color: Color::default(),
            include_perimeter: false,
        }
    }

    pub fn with_perimeter(mut self, include_perimeter: bool) -> Self {
        self.include_perimeter = include_perimeter;
        self
    }
}

/// Source of the currently selected condition.
pub trait ConditionProvider {
    fn selected_condition(&self) -> Option<Condition>;
}

impl ConditionProvider for Option<Condition> {
    fn selected_condition(&self) -> Option<Condition> {
        self.clone()
    }
}
