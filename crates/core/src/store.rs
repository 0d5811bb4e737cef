//! Collaborator contracts and an in-memory store
//!
//! The engine never persists anything itself. Completed measurements and resolved
//! calibrations are handed to a [`MeasurementStore`] / [`CalibrationStore`], and page
//! geometry comes from a [`PageRenderer`].

use crate::calibration::Calibration;
use crate::measurement::{Measurement, MeasurementId};
use crate::sheet::{ProjectId, SheetId, SheetKey};
use crate::space::PageGeometry;
use std::collections::HashMap;

/// Errors surfaced by store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("measurement {0} not found")]
    NotFound(MeasurementId),

    #[error("measurement {0} already stored")]
    Duplicate(MeasurementId),

    #[error("calibration for {expected} submitted under {got}")]
    KeyMismatch { expected: SheetKey, got: SheetKey },

    #[error("store backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for completed measurements.
pub trait MeasurementStore {
    /// Stores a completed measurement and returns its id.
    fn add_measurement(&mut self, measurement: Measurement) -> StoreResult<MeasurementId>;

    /// Measurements of one sheet, in insertion order.
    fn list_measurements(
        &self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
    ) -> StoreResult<Vec<Measurement>>;

    fn delete_measurement(&mut self, id: MeasurementId) -> StoreResult<()>;
}

/// Persistence for the single active calibration of each sheet.
pub trait CalibrationStore {
    fn get_calibration(
        &self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
    ) -> StoreResult<Option<Calibration>>;

    /// Replaces any existing calibration for the sheet.
    fn set_calibration(
        &mut self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
        calibration: Calibration,
    ) -> StoreResult<()>;
}

/// Errors from a page renderer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("failed to render page {page}: {reason}")]
    Failed { page: u32, reason: String },
}

/// Produces a displayable page. The engine only consumes its geometry.
pub trait PageRenderer {
    /// Renders a 1-based page and returns its intrinsic size.
    fn render_page(&mut self, page_number: u32) -> Result<PageGeometry, RenderError>;
}

/// Renderer over a fixed list of page sizes, for documents whose geometry is already known.
#[derive(Debug, Clone, Default)]
pub struct FixedPageRenderer {
    pages: Vec<PageGeometry>,
}

impl FixedPageRenderer {
    pub fn new(pages: Vec<PageGeometry>) -> Self {
        Self { pages }
    }
}

impl PageRenderer for FixedPageRenderer {
    fn render_page(&mut self, page_number: u32) -> Result<PageGeometry, RenderError> {
        let count = self.pages.len() as u32;
        let out_of_range = RenderError::PageOutOfRange { page: page_number, count };
        page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or(out_of_range)
    }
}

/// Store kept entirely in memory, indexed by sheet.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    measurements: HashMap<MeasurementId, Measurement>,
    by_sheet: HashMap<SheetKey, Vec<MeasurementId>>,
    calibrations: HashMap<SheetKey, Calibration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn get(&self, id: MeasurementId) -> Option<&Measurement> {
        self.measurements.get(&id)
    }

    /// Every stored measurement, grouped by sheet.
    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.by_sheet
            .values()
            .flatten()
            .filter_map(|id| self.measurements.get(id))
    }
}

impl MeasurementStore for InMemoryStore {
    fn add_measurement(&mut self, measurement: Measurement) -> StoreResult<MeasurementId> {
        let id = measurement.id;
        if self.measurements.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }

        self.by_sheet.entry(measurement.key()).or_default().push(id);
        self.measurements.insert(id, measurement);
        Ok(id)
    }

    fn list_measurements(
        &self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
    ) -> StoreResult<Vec<Measurement>> {
        let key = SheetKey { project_id: project_id.clone(), sheet_id: sheet_id.clone() };
        Ok(self
            .by_sheet
            .get(&key)
            .map(|ids| ids.iter().filter_map(|id| self.measurements.get(id)).cloned().collect())
            .unwrap_or_default())
    }

    fn delete_measurement(&mut self, id: MeasurementId) -> StoreResult<()> {
        let measurement = self.measurements.remove(&id).ok_or(StoreError::NotFound(id))?;

        let key = measurement.key();
        if let Some(ids) = self.by_sheet.get_mut(&key) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.by_sheet.remove(&key);
            }
        }
        Ok(())
    }
}

impl CalibrationStore for InMemoryStore {
    fn get_calibration(
        &self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
    ) -> StoreResult<Option<Calibration>> {
        let key = SheetKey { project_id: project_id.clone(), sheet_id: sheet_id.clone() };
        Ok(self.calibrations.get(&key).cloned())
    }

    fn set_calibration(
        &mut self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
        calibration: Calibration,
    ) -> StoreResult<()> {
        let key = SheetKey { project_id: project_id.clone(), sheet_id: sheet_id.clone() };
        check_calibration_key(&key, &calibration)?;
        self.calibrations.insert(key, calibration);
        Ok(())
    }
}

/// Rejects a calibration whose own key differs from the one it is stored under.
pub fn check_calibration_key(key: &SheetKey, calibration: &Calibration) -> StoreResult<()> {
    let got = calibration.key();
    if &got != key {
        return Err(StoreError::KeyMismatch { expected: key.clone(), got });
    }
    Ok(())
}
