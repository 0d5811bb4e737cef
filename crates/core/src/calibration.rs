//! Two-point sheet calibration
//!
//! The user clicks both ends of a segment whose real-world length is known (a
//! dimension line, a scale bar) and enters that length. The resulting scale is in
//! real-world units per normalized page unit and applies to the whole sheet.
//! Re-calibrating overwrites; there is no averaging and no history.

use crate::config::EngineConfig;
use crate::geometry;
use crate::sheet::{ProjectId, SheetId, SheetKey};
use crate::space::{GeometryError, NormalizedPoint, PageGeometry, SpaceTransform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Calibration of a sheet: real-world units per normalized page unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub project_id: ProjectId,
    pub sheet_id: SheetId,
    pub scale: f64,
    pub unit: String,
    pub calibrated_at: DateTime<Utc>,
}

impl Calibration {
    pub fn key(&self) -> SheetKey {
        SheetKey { project_id: self.project_id.clone(), sheet_id: self.sheet_id.clone() }
    }

    /// Converts a normalized length to real-world units.
    pub fn to_real_length(&self, normalized: f64) -> f64 {
        normalized * self.scale
    }

    /// Converts a normalized area to real-world square units.
    pub fn to_real_area(&self, normalized: f64) -> f64 {
        normalized * self.scale * self.scale
    }
}

/// The known length entered by the user for the reference segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownDistance {
    pub distance: f64,
    pub unit: String,
}

impl KnownDistance {
    pub fn new(distance: f64, unit: impl Into<String>) -> Self {
        Self { distance, unit: unit.into() }
    }
}

/// Where the reference segment was drawn, needed to judge its on-screen length.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationContext {
    pub sheet: SheetKey,
    pub page: PageGeometry,
    /// Viewport zoom at the moment the segment was drawn
    pub viewport_scale: f64,
}

/// Calibration rejections. Recoverable: points are discarded and the user retries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration points are too close together ({pixels:.1}px, need {min_pixels}px)")]
    TooClose { pixels: f64, min_pixels: f64 },

    #[error("calibration scale {scale} is outside [{min}, {max}]; check the unit")]
    UnreasonableScale { scale: f64, min: f64, max: f64 },

    #[error("known distance must be a positive number, got {0}")]
    InvalidDistance(f64),

    #[error("two calibration points are required")]
    MissingPoints,

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Progress of a calibration attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationState {
    AwaitingFirstPoint,
    AwaitingSecondPoint { first: NormalizedPoint },
    /// Both points placed, waiting for the user to enter the known distance
    AwaitingDistance {
        first: NormalizedPoint,
        second: NormalizedPoint,
        /// Zoom when the second point was placed; the pixel threshold is judged at it
        viewport_scale: f64,
    },
    Resolved(Calibration),
}

/// What a calibration click did.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStep {
    FirstPointPlaced,
    SecondPointPlaced,
    Resolved(Calibration),
}

/// Accumulates the two reference points and derives the sheet scale.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    transform: SpaceTransform,
    min_pixels: f64,
    min_scale: f64,
    max_scale: f64,
    state: CalibrationState,
    preset: Option<KnownDistance>,
}

impl CalibrationEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            transform: SpaceTransform::new(config.min_divisor_scale),
            min_pixels: config.calibration_min_pixels,
            min_scale: config.min_calibration_scale,
            max_scale: config.max_calibration_scale,
            state: CalibrationState::AwaitingFirstPoint,
            preset: None,
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// Known distance entered ahead of the clicks, if any.
    pub fn preset(&self) -> Option<&KnownDistance> {
        self.preset.as_ref()
    }

    /// Starts a fresh attempt, discarding any points from a previous one.
    ///
    /// With a preset distance the second click resolves immediately; without one
    /// the engine waits in [`CalibrationState::AwaitingDistance`].
    pub fn start(&mut self, preset: Option<KnownDistance>) {
        self.state = CalibrationState::AwaitingFirstPoint;
        self.preset = preset;
    }

    /// Drops any placed points, keeping the preset.
    pub fn reset(&mut self) {
        self.state = CalibrationState::AwaitingFirstPoint;
    }

    /// Places the next reference point.
    ///
    /// A click after both points are placed (or after resolution) begins a new
    /// attempt with that click as the first point.
    pub fn add_point(
        &mut self,
        point: NormalizedPoint,
        context: &CalibrationContext,
    ) -> Result<CalibrationStep, CalibrationError> {
        let point = point.checked()?;

        match std::mem::replace(&mut self.state, CalibrationState::AwaitingFirstPoint) {
            CalibrationState::AwaitingSecondPoint { first } => {
                match self.preset.clone() {
                    Some(known) => {
                        let calibration = self.resolve_or_reset(first, point, &known, context)?;
                        Ok(CalibrationStep::Resolved(calibration))
                    }
                    None => {
                        self.state = CalibrationState::AwaitingDistance {
                            first,
                            second: point,
                            viewport_scale: context.viewport_scale,
                        };
                        Ok(CalibrationStep::SecondPointPlaced)
                    }
                }
            }
            CalibrationState::AwaitingFirstPoint
            | CalibrationState::AwaitingDistance { .. }
            | CalibrationState::Resolved(_) => {
                self.state = CalibrationState::AwaitingSecondPoint { first: point };
                Ok(CalibrationStep::FirstPointPlaced)
            }
        }
    }

    /// Resolves the placed points against a distance entered after the clicks.
    ///
    /// Zooming after the second click does not change the on-screen length the
    /// segment is judged by.
    pub fn submit_distance(
        &mut self,
        known: &KnownDistance,
        context: &CalibrationContext,
    ) -> Result<Calibration, CalibrationError> {
        let CalibrationState::AwaitingDistance { first, second, viewport_scale } = self.state
        else {
            return Err(CalibrationError::MissingPoints);
        };
        let drawn = CalibrationContext { viewport_scale, ..context.clone() };
        self.resolve_or_reset(first, second, known, &drawn)
    }

    fn resolve_or_reset(
        &mut self,
        first: NormalizedPoint,
        second: NormalizedPoint,
        known: &KnownDistance,
        context: &CalibrationContext,
    ) -> Result<Calibration, CalibrationError> {
        match self.resolve(first, second, known, context) {
            Ok(calibration) => {
                self.state = CalibrationState::Resolved(calibration.clone());
                Ok(calibration)
            }
            Err(err) => {
                self.state = CalibrationState::AwaitingFirstPoint;
                Err(err)
            }
        }
    }

    /// Derives a calibration from a reference segment. Does not touch engine state.
    pub fn resolve(
        &self,
        p1: NormalizedPoint,
        p2: NormalizedPoint,
        known: &KnownDistance,
        context: &CalibrationContext,
    ) -> Result<Calibration, CalibrationError> {
        if !known.distance.is_finite() || known.distance <= 0.0 {
            return Err(CalibrationError::InvalidDistance(known.distance));
        }

        let normalized = geometry::path_length(&[p1.checked()?, p2.checked()?]);
        let pixels = self.transform.screen_length(p1, p2, context.viewport_scale, &context.page)?;
        if pixels < self.min_pixels || normalized <= 0.0 {
            return Err(CalibrationError::TooClose { pixels, min_pixels: self.min_pixels });
        }

        let scale = known.distance / normalized;
        if !(self.min_scale..=self.max_scale).contains(&scale) {
            return Err(CalibrationError::UnreasonableScale {
                scale,
                min: self.min_scale,
                max: self.max_scale,
            });
        }

        Ok(Calibration {
            project_id: context.sheet.project_id.clone(),
            sheet_id: context.sheet.sheet_id.clone(),
            scale,
            unit: known.unit.clone(),
            calibrated_at: Utc::now(),
        })
    }
}
