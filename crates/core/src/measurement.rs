//! Measurement records and the drawing session state machine
//!
//! Measurements are stored as normalized page points. The on-screen shape is a
//! projection recomputed on every redraw; the stored value is computed once, when
//! the session completes, and never re-derived from viewport state.

use crate::calibration::{
    Calibration, CalibrationContext, CalibrationEngine, CalibrationError, CalibrationState,
    CalibrationStep, KnownDistance,
};
use crate::condition::{Condition, ConditionId};
use crate::config::EngineConfig;
use crate::geometry;
use crate::sheet::{ProjectId, SheetId, SheetKey};
use crate::space::{GeometryError, NormalizedPoint, PageGeometry};
use crate::units::{self, UnitKind};
use serde::{Deserialize, Serialize};

/// Unique identifier for measurements
pub type MeasurementId = uuid::Uuid;

/// Kind of takeoff measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementType {
    /// Length along a polyline
    Linear,
    /// Area of a closed polygon
    Area,
    /// A single counted item
    Count,
}

impl MeasurementType {
    /// Points needed before the measurement can be finished
    pub fn min_points(self) -> usize {
        match self {
            MeasurementType::Linear => 2,
            MeasurementType::Area => 3,
            MeasurementType::Count => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementType::Linear => "Linear",
            MeasurementType::Area => "Area",
            MeasurementType::Count => "Count",
        }
    }
}

/// A completed measurement as handed to the measurement store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: MeasurementId,
    pub project_id: ProjectId,
    pub sheet_id: SheetId,
    /// PDF page number (1-based)
    pub pdf_page: u32,
    pub measurement_type: MeasurementType,
    /// Click-ordered points; the only persisted geometry
    pub points_normalized: Vec<NormalizedPoint>,
    pub calculated_value: f64,
    pub unit: String,
    pub condition_id: ConditionId,
    /// Closed perimeter for area measurements whose condition asks for it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perimeter_value: Option<f64>,
    /// Computed with scale 1 because the sheet had no calibration
    #[serde(default)]
    pub uncalibrated: bool,
}

impl Measurement {
    pub fn key(&self) -> SheetKey {
        SheetKey { project_id: self.project_id.clone(), sheet_id: self.sheet_id.clone() }
    }

    /// Value with unit, e.g. `12.50 ft`, `96.00 ft²`, `1 EA`.
    pub fn formatted_label(&self) -> String {
        match self.measurement_type {
            MeasurementType::Count => format!("{} {}", self.calculated_value, self.unit),
            MeasurementType::Linear => format!("{:.2} {}", self.calculated_value, self.unit),
            MeasurementType::Area => match units::classify(&self.unit) {
                Some(UnitKind::Length(_)) => {
                    format!("{:.2} {}²", self.calculated_value, self.unit)
                }
                _ => format!("{:.2} {}", self.calculated_value, self.unit),
            },
        }
    }

    /// Where the label should be drawn: path midpoint for linear, vertex centroid otherwise.
    pub fn label_position(&self) -> Result<NormalizedPoint, GeometryError> {
        match self.measurement_type {
            MeasurementType::Linear => geometry::path_midpoint(&self.points_normalized),
            MeasurementType::Area | MeasurementType::Count => {
                geometry::centroid(&self.points_normalized)
            }
        }
    }
}

/// Value computed for a point sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedValue {
    pub value: f64,
    pub unit: String,
    pub perimeter: Option<f64>,
    pub uncalibrated: bool,
}

/// Computes a measurement value from normalized points.
///
/// Without a calibration the raw normalized magnitude (scale 1) is returned and
/// flagged. With one, the result is converted into the condition's unit when both
/// units are recognised.
pub fn compute_value(
    points: &[NormalizedPoint],
    condition: &Condition,
    calibration: Option<&Calibration>,
) -> Result<ComputedValue, GeometryError> {
    geometry::ensure_finite(points)?;

    let kind = condition.measurement_type;
    if kind == MeasurementType::Count {
        return Ok(ComputedValue {
            value: 1.0,
            unit: condition.unit.clone(),
            perimeter: None,
            uncalibrated: false,
        });
    }

    let Some(calibration) = calibration else {
        let (value, perimeter) = match kind {
            MeasurementType::Area => (
                geometry::polygon_area(points),
                condition.include_perimeter.then(|| geometry::polygon_perimeter(points)),
            ),
            _ => (geometry::path_length(points), None),
        };
        return finite(ComputedValue {
            value,
            unit: condition.unit.clone(),
            perimeter,
            uncalibrated: true,
        });
    };

    let computed = match kind {
        MeasurementType::Linear => {
            let raw = calibration.to_real_length(geometry::path_length(points));
            match units::convert_length(raw, &calibration.unit, &condition.unit) {
                Some(value) => ComputedValue {
                    value,
                    unit: condition.unit.clone(),
                    perimeter: None,
                    uncalibrated: false,
                },
                None => ComputedValue {
                    value: raw,
                    unit: calibration.unit.clone(),
                    perimeter: None,
                    uncalibrated: false,
                },
            }
        }
        _ => {
            let raw = calibration.to_real_area(geometry::polygon_area(points));
            let raw_perimeter = condition
                .include_perimeter
                .then(|| calibration.to_real_length(geometry::polygon_perimeter(points)));

            match units::convert_area(raw, &calibration.unit, &condition.unit) {
                Some(value) => {
                    let perimeter = raw_perimeter.map(|p| {
                        perimeter_in_condition_unit(p, &calibration.unit, &condition.unit)
                    });
                    ComputedValue {
                        value,
                        unit: condition.unit.clone(),
                        perimeter,
                        uncalibrated: false,
                    }
                }
                None => ComputedValue {
                    value: raw,
                    unit: calibration.unit.clone(),
                    perimeter: raw_perimeter,
                    uncalibrated: false,
                },
            }
        }
    };

    finite(computed)
}

fn perimeter_in_condition_unit(
    perimeter: f64,
    calibration_unit: &str,
    condition_unit: &str,
) -> f64 {
    let Some(UnitKind::Length(base) | UnitKind::Area(base)) = units::classify(condition_unit) else {
        return perimeter;
    };
    units::convert_length(perimeter, calibration_unit, base.symbol()).unwrap_or(perimeter)
}

fn finite(computed: ComputedValue) -> Result<ComputedValue, GeometryError> {
    let perimeter_ok = computed.perimeter.map_or(true, f64::is_finite);
    if computed.value.is_finite() && perimeter_ok {
        Ok(computed)
    } else {
        Err(GeometryError::NonFinite { what: "measurement value" })
    }
}

/// Interaction mode of a page's drawing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Measuring(MeasurementType),
    Calibrating,
}

/// Completion attempts that cannot succeed yet. The session stays open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStateError {
    #[error("{kind:?} measurement needs at least {needed} points, has {got}")]
    NotEnoughPoints { kind: MeasurementType, needed: usize, got: usize },

    #[error("no measurement session is active")]
    NotMeasuring,

    #[error("no calibration session is active")]
    NotCalibrating,
}

/// Errors from feeding a point or completing a session
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    State(#[from] SessionStateError),
}

/// Everything a session needs to know about the page it is drawing on
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub sheet: &'a SheetKey,
    pub pdf_page: u32,
    pub page: PageGeometry,
    pub viewport_scale: f64,
    pub calibration: Option<&'a Calibration>,
}

impl PageContext<'_> {
    fn calibration_context(&self) -> CalibrationContext {
        CalibrationContext {
            sheet: self.sheet.clone(),
            page: self.page,
            viewport_scale: self.viewport_scale,
        }
    }
}

/// What a click did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Not in a drawing mode
    Ignored,
    /// Point appended to the pending measurement
    PointAdded { count: usize },
    /// Session completed (count measurements complete on the click itself)
    Completed(Measurement),
    /// Calibration point placed; more input needed
    CalibrationPoint(CalibrationStep),
    /// Calibration resolved
    Calibrated(Calibration),
}

/// Drawing session for one open page.
#[derive(Debug, Clone)]
pub struct MeasurementEngine {
    mode: SessionMode,
    condition: Option<Condition>,
    pending: Vec<NormalizedPoint>,
    calibration: CalibrationEngine,
    rearm_after_completion: bool,
}

impl MeasurementEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            mode: SessionMode::Idle,
            condition: None,
            pending: Vec::new(),
            calibration: CalibrationEngine::new(config),
            rearm_after_completion: config.rearm_after_completion,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Points placed so far, in click order
    pub fn pending_points(&self) -> &[NormalizedPoint] {
        &self.pending
    }

    pub fn calibration_state(&self) -> &CalibrationState {
        self.calibration.state()
    }

    /// Arms a measuring session for the condition, discarding any session in progress.
    pub fn select_condition(&mut self, condition: Condition) {
        self.discard();
        log::debug!(
            "measuring {} with condition {}",
            condition.measurement_type.as_str(),
            condition.id
        );
        self.mode = SessionMode::Measuring(condition.measurement_type);
        self.condition = Some(condition);
    }

    /// Starts calibrating, discarding any session in progress.
    pub fn begin_calibration(&mut self, preset: Option<KnownDistance>) {
        self.discard();
        self.condition = None;
        self.calibration.start(preset);
        self.mode = SessionMode::Calibrating;
        log::debug!("calibration started");
    }

    /// Discards pending points and returns to idle without emitting anything.
    pub fn cancel(&mut self) {
        if self.mode != SessionMode::Idle {
            log::debug!("session cancelled with {} pending points", self.pending.len());
        }
        self.discard();
        self.condition = None;
        self.mode = SessionMode::Idle;
    }

    fn discard(&mut self) {
        self.pending.clear();
        self.calibration.reset();
    }

    /// Removes the most recent pending point.
    pub fn undo_last_point(&mut self) -> Option<NormalizedPoint> {
        match self.mode {
            SessionMode::Measuring(_) => self.pending.pop(),
            SessionMode::Calibrating => {
                let first = match self.calibration.state() {
                    CalibrationState::AwaitingSecondPoint { first } => Some(*first),
                    _ => None,
                };
                if first.is_some() {
                    self.calibration.reset();
                }
                first
            }
            SessionMode::Idle => None,
        }
    }

    /// Feeds a click. Count measurements complete immediately.
    pub fn add_point(
        &mut self,
        point: NormalizedPoint,
        ctx: &PageContext<'_>,
    ) -> Result<ClickOutcome, SessionError> {
        let point = point.checked()?;

        match self.mode {
            SessionMode::Idle => Ok(ClickOutcome::Ignored),
            SessionMode::Calibrating => {
                match self.calibration.add_point(point, &ctx.calibration_context())? {
                    CalibrationStep::Resolved(calibration) => {
                        self.finish_calibration(&calibration);
                        Ok(ClickOutcome::Calibrated(calibration))
                    }
                    step => Ok(ClickOutcome::CalibrationPoint(step)),
                }
            }
            SessionMode::Measuring(MeasurementType::Count) => {
                self.pending.clear();
                self.pending.push(point);
                self.complete(ctx).map(ClickOutcome::Completed)
            }
            SessionMode::Measuring(_) => {
                self.pending.push(point);
                log::debug!("pending point {} at {:?}", self.pending.len(), point);
                Ok(ClickOutcome::PointAdded { count: self.pending.len() })
            }
        }
    }

    /// Completes the pending linear or area measurement.
    ///
    /// With too few points this is a no-op returning [`SessionStateError::NotEnoughPoints`].
    pub fn finish(&mut self, ctx: &PageContext<'_>) -> Result<Measurement, SessionError> {
        let SessionMode::Measuring(kind) = self.mode else {
            return Err(SessionStateError::NotMeasuring.into());
        };

        let needed = kind.min_points();
        if self.pending.len() < needed {
            return Err(SessionStateError::NotEnoughPoints {
                kind,
                needed,
                got: self.pending.len(),
            }
            .into());
        }

        self.complete(ctx)
    }

    /// Resolves a calibration whose distance is entered after both clicks.
    pub fn submit_calibration_distance(
        &mut self,
        known: &KnownDistance,
        ctx: &PageContext<'_>,
    ) -> Result<Calibration, SessionError> {
        if self.mode != SessionMode::Calibrating {
            return Err(SessionStateError::NotCalibrating.into());
        }
        let calibration = self.calibration.submit_distance(known, &ctx.calibration_context())?;
        self.finish_calibration(&calibration);
        Ok(calibration)
    }

    /// Live value of the pending shape with the cursor as a trailing point.
    pub fn preview_value(
        &self,
        cursor: NormalizedPoint,
        calibration: Option<&Calibration>,
    ) -> Option<ComputedValue> {
        let SessionMode::Measuring(kind) = self.mode else {
            return None;
        };
        let condition = self.condition.as_ref()?;
        if kind == MeasurementType::Count || self.pending.is_empty() {
            return None;
        }

        let mut points = self.pending.clone();
        points.push(cursor);
        compute_value(&points, condition, calibration).ok()
    }

    fn complete(&mut self, ctx: &PageContext<'_>) -> Result<Measurement, SessionError> {
        let Some(condition) = self.condition.clone() else {
            return Err(SessionStateError::NotMeasuring.into());
        };

        // Geometry failures leave the session untouched so the user can keep drawing.
        let computed = compute_value(&self.pending, &condition, ctx.calibration)?;

        let measurement = Measurement {
            id: MeasurementId::new_v4(),
            project_id: ctx.sheet.project_id.clone(),
            sheet_id: ctx.sheet.sheet_id.clone(),
            pdf_page: ctx.pdf_page,
            measurement_type: condition.measurement_type,
            points_normalized: std::mem::take(&mut self.pending),
            calculated_value: computed.value,
            unit: computed.unit,
            condition_id: condition.id.clone(),
            perimeter_value: computed.perimeter,
            uncalibrated: computed.uncalibrated,
        };

        log::info!(
            "completed {} measurement {} = {}",
            condition.measurement_type.as_str(),
            measurement.id,
            measurement.formatted_label()
        );

        if self.rearm_after_completion {
            self.mode = SessionMode::Measuring(condition.measurement_type);
        } else {
            self.mode = SessionMode::Idle;
            self.condition = None;
        }

        Ok(measurement)
    }

    fn finish_calibration(&mut self, calibration: &Calibration) {
        log::info!(
            "sheet {} calibrated at {} {} per page unit",
            calibration.key(),
            calibration.scale,
            calibration.unit
        );
        self.mode = SessionMode::Idle;
    }
}
