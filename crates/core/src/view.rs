//! Input routing for one open page
//!
//! [`TakeoffView`] is the single owner of the viewport and the drawing session of
//! the page on screen. Raw input events arrive in device space and are turned into
//! normalized points, engine calls and store writes. Nothing here is shared: the
//! surrounding UI calls into the view explicitly.

use crate::calibration::{Calibration, CalibrationStep, KnownDistance};
use crate::condition::{Condition, ConditionProvider};
use crate::config::EngineConfig;
use crate::measurement::{
    ClickOutcome, ComputedValue, Measurement, MeasurementEngine, MeasurementId, PageContext,
    SessionError, SessionMode,
};
use crate::sheet::SheetKey;
use crate::space::{
    DevicePoint, GeometryError, NormalizedPoint, PageGeometry, SpaceTransform, ViewportPoint,
};
use crate::store::{CalibrationStore, MeasurementStore, PageRenderer, RenderError, StoreError};
use crate::viewport::{Container, ViewportController};
use serde::{Deserialize, Serialize};

/// Keys the view reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Escape,
    Enter,
    Backspace,
    R,
    F,
}

/// Raw input in device space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown { position: DevicePoint },
    PointerMove { position: DevicePoint },
    PointerUp { position: DevicePoint },
    DoubleClick { position: DevicePoint },
    /// Negative `delta_y` zooms in
    Wheel { position: DevicePoint, delta_y: f64 },
    Key {
        key: Key,
        #[serde(default)]
        shift: bool,
    },
}

/// What handling an event changed
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEffect {
    /// Nothing to do (no page, geometry not loaded yet, wrong mode)
    Ignored,
    PointAdded { count: usize },
    PointRemoved,
    CalibrationPoint(CalibrationStep),
    MeasurementAdded(Measurement),
    Calibrated(Calibration),
    PanStarted,
    ViewportChanged,
    Cancelled,
    /// Cursor moved over the page; the preview may have changed
    Hover,
}

/// Errors from the view
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("no page is open")]
    NoPage,
}

/// A stored measurement mapped to viewport space for drawing
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedMeasurement {
    pub id: MeasurementId,
    pub points: Vec<ViewportPoint>,
    pub label_anchor: ViewportPoint,
    pub label: String,
}

#[derive(Debug, Clone)]
struct OpenPage {
    sheet: SheetKey,
    pdf_page: u32,
    /// Unknown until the renderer reports back
    geometry: Option<PageGeometry>,
}

/// The open page: viewport, drawing session and the stores they feed.
pub struct TakeoffView<S> {
    transform: SpaceTransform,
    viewport: ViewportController,
    engine: MeasurementEngine,
    store: S,
    page: Option<OpenPage>,
    calibration: Option<Calibration>,
    drag_from: Option<DevicePoint>,
    hover: Option<NormalizedPoint>,
    wheel_step: f64,
}

impl<S> TakeoffView<S>
where
    S: MeasurementStore + CalibrationStore,
{
    pub fn new(config: &EngineConfig, container: Container, store: S) -> Self {
        Self {
            transform: SpaceTransform::new(config.min_divisor_scale),
            viewport: ViewportController::new(config, container),
            engine: MeasurementEngine::new(config),
            store,
            page: None,
            calibration: None,
            drag_from: None,
            hover: None,
            wheel_step: config.wheel_zoom_step,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    /// Direct viewport access for toolbar actions that bypass input events.
    pub fn viewport_mut(&mut self) -> &mut ViewportController {
        &mut self.viewport
    }

    pub fn engine(&self) -> &MeasurementEngine {
        &self.engine
    }

    /// Calibration of the open sheet, if any.
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn sheet(&self) -> Option<&SheetKey> {
        self.page.as_ref().map(|open| &open.sheet)
    }

    pub fn page_geometry(&self) -> Option<PageGeometry> {
        self.page.as_ref().and_then(|open| open.geometry)
    }

    /// Opens a page. Any session on the previous page is cancelled first.
    ///
    /// Pointer input is ignored until [`Self::page_rendered`] supplies the geometry.
    pub fn open_page(&mut self, sheet: SheetKey, pdf_page: u32) -> Result<(), ViewError> {
        self.flush();
        self.viewport.detach_page();
        self.calibration = self.store.get_calibration(&sheet.project_id, &sheet.sheet_id)?;
        log::debug!(
            "opened {sheet} page {pdf_page} ({})",
            if self.calibration.is_some() { "calibrated" } else { "uncalibrated" }
        );
        self.page = Some(OpenPage { sheet, pdf_page, geometry: None });
        Ok(())
    }

    /// Accepts geometry from the renderer. Results for a page that is no longer open
    /// are dropped and `false` is returned.
    pub fn page_rendered(
        &mut self,
        pdf_page: u32,
        geometry: PageGeometry,
    ) -> Result<bool, ViewError> {
        let Some(open) = self.page.as_mut() else {
            log::trace!("dropping render of page {pdf_page}: no page open");
            return Ok(false);
        };
        if open.pdf_page != pdf_page {
            log::trace!("dropping stale render of page {pdf_page}, page {} is open", open.pdf_page);
            return Ok(false);
        }

        let geometry = geometry
            .validated()
            .inspect_err(|e| log::warn!("page {pdf_page} rejected: {e}"))?;
        open.geometry = Some(geometry);
        self.viewport.attach_page(geometry);
        Ok(true)
    }

    /// Opens a page and renders it synchronously.
    pub fn open_page_with<R: PageRenderer>(
        &mut self,
        renderer: &mut R,
        sheet: SheetKey,
        pdf_page: u32,
    ) -> Result<(), ViewError> {
        self.open_page(sheet, pdf_page)?;
        let geometry = renderer.render_page(pdf_page)?;
        self.page_rendered(pdf_page, geometry)?;
        Ok(())
    }

    pub fn close_page(&mut self) {
        self.flush();
        self.viewport.detach_page();
        self.page = None;
        self.calibration = None;
    }

    /// Moves or resizes the canvas; refits when a page is shown.
    pub fn resize(&mut self, container: Container) {
        self.viewport.set_container(container);
        self.viewport.fit();
    }

    fn flush(&mut self) {
        self.engine.cancel();
        self.drag_from = None;
        self.hover = None;
    }

    pub fn select_condition(&mut self, condition: Condition) {
        self.engine.select_condition(condition);
    }

    /// Arms measuring with whatever the provider has selected. Returns `false` if nothing is.
    pub fn select_from<P: ConditionProvider + ?Sized>(&mut self, provider: &P) -> bool {
        match provider.selected_condition() {
            Some(condition) => {
                self.engine.select_condition(condition);
                true
            }
            None => false,
        }
    }

    pub fn begin_calibration(&mut self, preset: Option<KnownDistance>) {
        self.engine.begin_calibration(preset);
    }

    /// Resolves a calibration after both points have been clicked.
    pub fn submit_calibration_distance(
        &mut self,
        known: &KnownDistance,
    ) -> Result<Calibration, ViewError> {
        let before = self.engine.clone();
        let result = self
            .with_context(|engine, ctx| engine.submit_calibration_distance(known, ctx))
            .ok_or(ViewError::NoPage)?;
        let calibration = result.map_err(report)?;
        if let Err(e) = self.store_calibration(calibration.clone()) {
            self.restore(before, &e);
            return Err(e);
        }
        Ok(calibration)
    }

    pub fn cancel(&mut self) {
        self.engine.cancel();
    }

    pub fn delete_measurement(&mut self, id: MeasurementId) -> Result<(), ViewError> {
        self.store.delete_measurement(id)?;
        Ok(())
    }

    /// All measurements of the open sheet.
    pub fn measurements(&self) -> Result<Vec<Measurement>, ViewError> {
        let open = self.page.as_ref().ok_or(ViewError::NoPage)?;
        Ok(self.store.list_measurements(&open.sheet.project_id, &open.sheet.sheet_id)?)
    }

    /// Measurements of the open page projected with the current viewport.
    ///
    /// Called after every viewport change; stored values are never recomputed here.
    pub fn project_measurements(&self) -> Result<Vec<ProjectedMeasurement>, ViewError> {
        let Some(open) = self.page.as_ref() else {
            return Ok(Vec::new());
        };
        let Some(geometry) = open.geometry else {
            return Ok(Vec::new());
        };
        let state = self.viewport.state();

        self.store
            .list_measurements(&open.sheet.project_id, &open.sheet.sheet_id)?
            .into_iter()
            .filter(|m| m.pdf_page == open.pdf_page)
            .map(|m| {
                let points = self.transform.project_all(&m.points_normalized, state, &geometry)?;
                let label_anchor =
                    self.transform.normalized_to_viewport(m.label_position()?, state, &geometry)?;
                Ok(ProjectedMeasurement {
                    id: m.id,
                    points,
                    label_anchor,
                    label: m.formatted_label(),
                })
            })
            .collect()
    }

    /// Live value of the shape being drawn, using the last hovered position.
    pub fn preview(&self) -> Option<ComputedValue> {
        self.engine.preview_value(self.hover?, self.calibration.as_ref())
    }

    pub fn handle_event(&mut self, event: InputEvent) -> Result<ViewEffect, ViewError> {
        match event {
            InputEvent::PointerDown { position } => self.pointer_down(position),
            InputEvent::PointerMove { position } => self.pointer_move(position),
            InputEvent::PointerUp { .. } => {
                self.drag_from = None;
                Ok(ViewEffect::Ignored)
            }
            InputEvent::DoubleClick { .. } => self.finish(),
            InputEvent::Wheel { position, delta_y } => {
                if self.page_geometry().is_none() || delta_y == 0.0 {
                    return Ok(ViewEffect::Ignored);
                }
                let factor = if delta_y < 0.0 { self.wheel_step } else { 1.0 / self.wheel_step };
                self.viewport.zoom_at(position, factor);
                Ok(ViewEffect::ViewportChanged)
            }
            InputEvent::Key { key, shift } => self.key(key, shift),
        }
    }

    fn key(&mut self, key: Key, shift: bool) -> Result<ViewEffect, ViewError> {
        match key {
            Key::Escape => {
                self.engine.cancel();
                Ok(ViewEffect::Cancelled)
            }
            Key::Enter => self.finish(),
            Key::Backspace => Ok(match self.engine.undo_last_point() {
                Some(_) => ViewEffect::PointRemoved,
                None => ViewEffect::Ignored,
            }),
            Key::R | Key::F if self.page_geometry().is_none() => Ok(ViewEffect::Ignored),
            Key::R => {
                self.viewport.rotate(if shift { -1 } else { 1 });
                Ok(ViewEffect::ViewportChanged)
            }
            Key::F => {
                self.viewport.fit();
                Ok(ViewEffect::ViewportChanged)
            }
        }
    }

    fn pointer_down(&mut self, position: DevicePoint) -> Result<ViewEffect, ViewError> {
        let Some(point) = self.locate(position)? else {
            return Ok(ViewEffect::Ignored);
        };

        if self.engine.mode() == SessionMode::Idle {
            self.drag_from = Some(position);
            return Ok(ViewEffect::PanStarted);
        }

        let before = self.engine.clone();
        let outcome = self
            .with_context(|engine, ctx| engine.add_point(point, ctx))
            .ok_or(ViewError::NoPage)?
            .map_err(report)?;
        self.commit(before, outcome)
    }

    fn pointer_move(&mut self, position: DevicePoint) -> Result<ViewEffect, ViewError> {
        if let Some(from) = self.drag_from {
            self.viewport.pan_by(position.x - from.x, position.y - from.y);
            self.drag_from = Some(position);
            return Ok(ViewEffect::ViewportChanged);
        }

        // Hover outside a valid projection just clears the preview.
        self.hover = self.locate(position).ok().flatten();
        Ok(if self.hover.is_some() { ViewEffect::Hover } else { ViewEffect::Ignored })
    }

    fn finish(&mut self) -> Result<ViewEffect, ViewError> {
        let before = self.engine.clone();
        let Some(result) = self.with_context(|engine, ctx| engine.finish(ctx)) else {
            return Ok(ViewEffect::Ignored);
        };

        match result {
            Ok(measurement) => self.commit(before, ClickOutcome::Completed(measurement)),
            Err(SessionError::State(e)) => {
                log::debug!("finish ignored: {e}");
                Ok(ViewEffect::Ignored)
            }
            Err(e) => Err(report(e)),
        }
    }

    /// Stores what the engine produced. If the store refuses it, the session goes back
    /// to `before` so the user's points survive and finishing again retries the write.
    fn commit(
        &mut self,
        before: MeasurementEngine,
        outcome: ClickOutcome,
    ) -> Result<ViewEffect, ViewError> {
        let result = self.apply(outcome);
        if let Err(e) = &result {
            self.restore(before, e);
        }
        result
    }

    fn restore(&mut self, before: MeasurementEngine, err: &ViewError) {
        log::warn!("result not stored, session restored: {err}");
        self.engine = before;
    }

    fn apply(&mut self, outcome: ClickOutcome) -> Result<ViewEffect, ViewError> {
        Ok(match outcome {
            ClickOutcome::Ignored => ViewEffect::Ignored,
            ClickOutcome::PointAdded { count } => ViewEffect::PointAdded { count },
            ClickOutcome::CalibrationPoint(step) => ViewEffect::CalibrationPoint(step),
            ClickOutcome::Completed(measurement) => {
                self.store.add_measurement(measurement.clone())?;
                ViewEffect::MeasurementAdded(measurement)
            }
            ClickOutcome::Calibrated(calibration) => {
                self.store_calibration(calibration.clone())?;
                ViewEffect::Calibrated(calibration)
            }
        })
    }

    fn store_calibration(&mut self, calibration: Calibration) -> Result<(), ViewError> {
        self.store
            .set_calibration(&calibration.project_id, &calibration.sheet_id, calibration.clone())?;
        self.calibration = Some(calibration);
        Ok(())
    }

    /// Device point to normalized, or `None` while the page geometry is unknown.
    fn locate(&self, position: DevicePoint) -> Result<Option<NormalizedPoint>, ViewError> {
        let Some(geometry) = self.page_geometry() else {
            log::trace!("pointer at {position:?} before page geometry is known");
            return Ok(None);
        };

        let origin = self.viewport.container().origin;
        self.transform
            .device_to_normalized(position, self.viewport.state(), origin, &geometry)
            .map(Some)
            .map_err(|e| {
                log::warn!("pointer at {position:?} rejected: {e}");
                e.into()
            })
    }

    /// Runs `f` against the engine with the open page's context, if geometry is known.
    fn with_context<T>(
        &mut self,
        f: impl FnOnce(&mut MeasurementEngine, &PageContext<'_>) -> T,
    ) -> Option<T> {
        let open = self.page.as_ref()?;
        let page = open.geometry?;
        let ctx = PageContext {
            sheet: &open.sheet,
            pdf_page: open.pdf_page,
            page,
            viewport_scale: self.viewport.state().scale,
            calibration: self.calibration.as_ref(),
        };
        Some(f(&mut self.engine, &ctx))
    }
}

fn report(err: SessionError) -> ViewError {
    match &err {
        SessionError::Geometry(e) => log::warn!("operation aborted: {e}"),
        SessionError::Calibration(e) => log::info!("calibration rejected: {e}"),
        SessionError::State(e) => log::debug!("{e}"),
    }
    ViewError::Session(err)
}
