//! Engine configuration
//!
//! Centralizes every tunable threshold used by the transform, calibration and
//! viewport code. Configuration can be created programmatically, deserialized
//! from JSON, or loaded from environment variables.

use serde::{Deserialize, Serialize};

/// Tunable limits for the takeoff engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Viewport scale is clamped to at least this value before being used as a divisor
    pub min_divisor_scale: f64,
    /// Smallest zoom reachable through the viewport controller
    pub min_zoom: f64,
    /// Largest zoom reachable through the viewport controller
    pub max_zoom: f64,
    /// Margin around the page when fitting it into the container (pixels)
    pub fit_margin_px: f64,
    /// Calibration segments shorter than this on screen are rejected (pixels)
    pub calibration_min_pixels: f64,
    /// Lower bound for an accepted calibration scale (units per normalized unit)
    pub min_calibration_scale: f64,
    /// Upper bound for an accepted calibration scale (units per normalized unit)
    pub max_calibration_scale: f64,
    /// Zoom factor applied per wheel notch
    pub wheel_zoom_step: f64,
    /// Stay armed with the same condition after a measurement completes
    pub rearm_after_completion: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_divisor_scale: 0.01,
            min_zoom: 0.1,
            max_zoom: 5.0,
            fit_margin_px: 20.0,
            calibration_min_pixels: 5.0,
            min_calibration_scale: 1e-3,
            max_calibration_scale: 1e3,
            wheel_zoom_step: 1.1,
            rearm_after_completion: false,
        }
    }
}

impl EngineConfig {
    /// Sets the zoom range.
    pub fn with_zoom_range(mut self, min: f64, max: f64) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    /// Sets the fit-to-container margin in pixels.
    pub fn with_fit_margin(mut self, margin_px: f64) -> Self {
        self.fit_margin_px = margin_px;
        self
    }

    /// Sets the minimum on-screen length of a calibration segment.
    pub fn with_calibration_min_pixels(mut self, pixels: f64) -> Self {
        self.calibration_min_pixels = pixels;
        self
    }

    /// Sets the accepted calibration scale range.
    pub fn with_calibration_scale_range(mut self, min: f64, max: f64) -> Self {
        self.min_calibration_scale = min;
        self.max_calibration_scale = max;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TAKEOFF_MIN_DIVISOR_SCALE`
    /// - `TAKEOFF_MIN_ZOOM`, `TAKEOFF_MAX_ZOOM`
    /// - `TAKEOFF_FIT_MARGIN_PX`
    /// - `TAKEOFF_CALIBRATION_MIN_PIXELS`
    /// - `TAKEOFF_MIN_CALIBRATION_SCALE`, `TAKEOFF_MAX_CALIBRATION_SCALE`
    /// - `TAKEOFF_WHEEL_ZOOM_STEP`
    /// - `TAKEOFF_REARM_AFTER_COMPLETION` (`true`/`false`)
    ///
    /// # Errors
    /// Returns an error if any variable cannot be parsed or the result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let fields: [(&str, &mut f64); 8] = [
            ("TAKEOFF_MIN_DIVISOR_SCALE", &mut config.min_divisor_scale),
            ("TAKEOFF_MIN_ZOOM", &mut config.min_zoom),
            ("TAKEOFF_MAX_ZOOM", &mut config.max_zoom),
            ("TAKEOFF_FIT_MARGIN_PX", &mut config.fit_margin_px),
            ("TAKEOFF_CALIBRATION_MIN_PIXELS", &mut config.calibration_min_pixels),
            ("TAKEOFF_MIN_CALIBRATION_SCALE", &mut config.min_calibration_scale),
            ("TAKEOFF_MAX_CALIBRATION_SCALE", &mut config.max_calibration_scale),
            ("TAKEOFF_WHEEL_ZOOM_STEP", &mut config.wheel_zoom_step),
        ];

        for (key, slot) in fields {
            if let Some(raw) = lookup(key) {
                *slot = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
            }
        }

        if let Some(raw) = lookup("TAKEOFF_REARM_AFTER_COMPLETION") {
            config.rearm_after_completion = match raw.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "TAKEOFF_REARM_AFTER_COMPLETION".to_string(),
                    ))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if a value is non-finite, non-positive, or a range is inverted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("min_divisor_scale", self.min_divisor_scale),
            ("min_zoom", self.min_zoom),
            ("max_zoom", self.max_zoom),
            ("calibration_min_pixels", self.calibration_min_pixels),
            ("min_calibration_scale", self.min_calibration_scale),
            ("max_calibration_scale", self.max_calibration_scale),
            ("wheel_zoom_step", self.wheel_zoom_step),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue(name.to_string()));
            }
        }

        if !self.fit_margin_px.is_finite() || self.fit_margin_px < 0.0 {
            return Err(ConfigError::InvalidValue("fit_margin_px".to_string()));
        }

        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::InvertedRange("zoom"));
        }

        if self.min_calibration_scale > self.max_calibration_scale {
            return Err(ConfigError::InvertedRange("calibration scale"));
        }

        Ok(())
    }
}

/// Errors that can occur when building a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("{0} range has min greater than max")]
    InvertedRange(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_zoom, 0.1);
        assert_eq!(config.max_zoom, 5.0);
        assert_eq!(config.min_calibration_scale, 1e-3);
        assert_eq!(config.max_calibration_scale, 1e3);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let pairs = [("TAKEOFF_MAX_ZOOM", "8"), ("TAKEOFF_FIT_MARGIN_PX", " 0 ")];
        let config = EngineConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.max_zoom, 8.0);
        assert_eq!(config.fit_margin_px, 0.0);
        assert_eq!(config.min_zoom, 0.1);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = EngineConfig::from_lookup(lookup(&[("TAKEOFF_MIN_ZOOM", "tiny")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidValue("TAKEOFF_MIN_ZOOM".to_string()));
    }

    #[test]
    fn validate_rejects_inverted_zoom() {
        let config = EngineConfig::default().with_zoom_range(4.0, 2.0);
        assert_eq!(config.validate(), Err(ConfigError::InvertedRange("zoom")));
    }

    #[test]
    fn validate_rejects_non_positive_threshold() {
        let config = EngineConfig::default().with_calibration_min_pixels(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_fills_missing_fields_from_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_zoom": 3.0}"#).unwrap();
        assert_eq!(config.max_zoom, 3.0);
        assert_eq!(config.min_divisor_scale, 0.01);
    }
}
