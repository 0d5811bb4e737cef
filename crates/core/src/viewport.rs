//! Zoom, pan and rotation of the open page
//!
//! The controller owns the [`ViewportState`] of one open page and nothing else.
//! No measurement data passes through it: after every change, completed
//! measurements are re-projected from their normalized points for redraw.

use crate::config::EngineConfig;
use crate::space::{DevicePoint, PageGeometry, Rotation, ViewportState};

/// Size of the canvas the page is drawn into, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Where the canvas sits on the input surface, and how big it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Container {
    pub origin: DevicePoint,
    pub size: ContainerSize,
}

impl Container {
    pub fn new(origin: DevicePoint, size: ContainerSize) -> Self {
        Self { origin, size }
    }
}

/// Owns pan, zoom and rotation for one open page.
#[derive(Debug, Clone)]
pub struct ViewportController {
    state: ViewportState,
    container: Container,
    page: Option<PageGeometry>,
    min_zoom: f64,
    max_zoom: f64,
    fit_margin: f64,
}

impl ViewportController {
    pub fn new(config: &EngineConfig, container: Container) -> Self {
        Self {
            state: ViewportState::default(),
            container,
            page: None,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            fit_margin: config.fit_margin_px,
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn page(&self) -> Option<&PageGeometry> {
        self.page.as_ref()
    }

    fn clamp_zoom(&self, scale: f64) -> f64 {
        scale.clamp(self.min_zoom, self.max_zoom)
    }

    /// Installs the page geometry and fits it, as on page open.
    pub fn attach_page(&mut self, page: PageGeometry) {
        self.page = Some(page);
        self.state.rotation = Rotation::Deg0;
        self.fit_to_container(self.container.size, page);
    }

    /// Forgets the page; used when it is closed or replaced.
    pub fn detach_page(&mut self) {
        self.page = None;
        self.state = ViewportState::default();
    }

    /// Moves or resizes the container without touching pan or zoom.
    pub fn set_container(&mut self, container: Container) {
        self.container = container;
    }

    /// Zooms by `factor`, keeping the page point under `device` fixed on screen.
    pub fn zoom_at(&mut self, device: DevicePoint, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 || !device.is_finite() {
            log::warn!("ignoring zoom by {factor} at {device:?}");
            return;
        }

        let old_scale = self.state.scale;
        let new_scale = self.clamp_zoom(old_scale * factor);
        if new_scale == old_scale {
            return;
        }

        let local_x = device.x - self.container.origin.x;
        let local_y = device.y - self.container.origin.y;

        // Rotated-page coordinate under the cursor; rotation is unchanged, so keeping it
        // at the same viewport position keeps the normalized point fixed too.
        let page_x = (local_x - self.state.pan_x) / old_scale;
        let page_y = (local_y - self.state.pan_y) / old_scale;

        self.state.scale = new_scale;
        self.state.pan_x = local_x - page_x * new_scale;
        self.state.pan_y = local_y - page_y * new_scale;
        log::debug!("zoom {old_scale:.3} -> {new_scale:.3}");
    }

    /// Translates the page by a device-space delta.
    pub fn pan_by(&mut self, delta_x: f64, delta_y: f64) {
        if !delta_x.is_finite() || !delta_y.is_finite() {
            log::warn!("ignoring non-finite pan ({delta_x}, {delta_y})");
            return;
        }
        self.state.pan_x += delta_x;
        self.state.pan_y += delta_y;
    }

    /// Rotates by quarter turns (`1` = 90° clockwise, `-1` = counter-clockwise) and
    /// re-centers the page in the container at the current zoom.
    pub fn rotate(&mut self, quarter_turns: i32) {
        self.state.rotation = self.state.rotation.turned(quarter_turns);
        if let Some(page) = self.page {
            self.center(page);
        }
        log::debug!("rotation now {}°", self.state.rotation.degrees());
    }

    /// Fits the whole page into the container with a margin, centered.
    pub fn fit_to_container(&mut self, size: ContainerSize, page: PageGeometry) {
        self.container.size = size;
        self.state.scale = fit_scale(size, page, self.state.rotation, self.fit_margin)
            .map_or(1.0, |scale| self.clamp_zoom(scale));
        self.center(page);
    }

    /// Re-fits using the current container and page.
    pub fn fit(&mut self) {
        if let Some(page) = self.page {
            self.fit_to_container(self.container.size, page);
        }
    }

    fn center(&mut self, page: PageGeometry) {
        let (width, height) = page.rotated_size(self.state.rotation);
        self.state.pan_x = (self.container.size.width - width * self.state.scale) / 2.0;
        self.state.pan_y = (self.container.size.height - height * self.state.scale) / 2.0;
    }
}

/// Largest scale at which the rotated page fits inside the container minus margins.
fn fit_scale(
    size: ContainerSize,
    page: PageGeometry,
    rotation: Rotation,
    margin: f64,
) -> Option<f64> {
    let (width, height) = page.rotated_size(rotation);
    if size.width <= 0.0 || size.height <= 0.0 || width <= 0.0 || height <= 0.0 {
        return None;
    }

    let usable_width = (size.width - margin * 2.0).max(1.0);
    let usable_height = (size.height - margin * 2.0).max(1.0);
    Some((usable_width / width).min(usable_height / height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{NormalizedPoint, SpaceTransform};

    fn controller() -> ViewportController {
        let container =
            Container::new(DevicePoint::new(100.0, 50.0), ContainerSize::new(1000.0, 800.0));
        let mut controller = ViewportController::new(&EngineConfig::default(), container);
        controller.attach_page(PageGeometry::new(800.0, 600.0));
        controller
    }

    fn normalized_at(controller: &ViewportController, device: DevicePoint) -> NormalizedPoint {
        SpaceTransform::default()
            .device_to_normalized(
                device,
                controller.state(),
                controller.container().origin,
                controller.page().unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn fit_uses_smallest_ratio_and_centers() {
        let c = controller();
        // (1000 - 40) / 800 = 1.2, (800 - 40) / 600 = 1.2666..
        assert!((c.state().scale - 1.2).abs() < 1e-12);
        assert!((c.state().pan_x - 20.0).abs() < 1e-9);
        assert!((c.state().pan_y - 40.0).abs() < 1e-9);
    }

    #[test]
    fn fit_is_clamped_to_zoom_limits() {
        let mut c = controller();
        c.fit_to_container(ContainerSize::new(100_000.0, 100_000.0), PageGeometry::new(10.0, 10.0));
        assert_eq!(c.state().scale, 5.0);
        c.fit_to_container(ContainerSize::new(50.0, 50.0), PageGeometry::new(10_000.0, 10_000.0));
        assert_eq!(c.state().scale, 0.1);
    }

    #[test]
    fn zoom_keeps_point_under_cursor() {
        let mut c = controller();
        let cursor = DevicePoint::new(432.0, 377.0);
        let before = normalized_at(&c, cursor);

        c.zoom_at(cursor, 1.7);
        let after = normalized_at(&c, cursor);

        assert!((before.x - after.x).abs() < 1e-9 && (before.y - after.y).abs() < 1e-9);
        assert!((c.state().scale - 1.2 * 1.7).abs() < 1e-12);
    }

    #[test]
    fn zoom_keeps_point_under_cursor_when_rotated() {
        let mut c = controller();
        c.rotate(1);
        let cursor = DevicePoint::new(700.0, 200.0);
        let before = normalized_at(&c, cursor);
        c.zoom_at(cursor, 0.5);
        let after = normalized_at(&c, cursor);
        assert!((before.x - after.x).abs() < 1e-9 && (before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut c = controller();
        c.zoom_at(DevicePoint::new(0.0, 0.0), 100.0);
        assert_eq!(c.state().scale, 5.0);
        c.zoom_at(DevicePoint::new(0.0, 0.0), 1e-6);
        assert_eq!(c.state().scale, 0.1);
    }

    #[test]
    fn invalid_zoom_factor_is_ignored() {
        let mut c = controller();
        let before = *c.state();
        c.zoom_at(DevicePoint::new(10.0, 10.0), 0.0);
        c.zoom_at(DevicePoint::new(10.0, 10.0), f64::NAN);
        assert_eq!(*c.state(), before);
    }

    #[test]
    fn pan_is_a_plain_translation() {
        let mut c = controller();
        let before = *c.state();
        c.pan_by(-15.0, 42.0);
        assert_eq!(c.state().pan_x, before.pan_x - 15.0);
        assert_eq!(c.state().pan_y, before.pan_y + 42.0);
        assert_eq!(c.state().scale, before.scale);
    }

    #[test]
    fn rotate_recenters_with_swapped_dimensions() {
        let mut c = controller();
        c.rotate(1);
        assert_eq!(c.state().rotation, Rotation::Deg90);
        // Rotated page is 600 x 800 at scale 1.2 = 720 x 960.
        assert!((c.state().pan_x - (1000.0 - 720.0) / 2.0).abs() < 1e-9);
        assert!((c.state().pan_y - (800.0 - 960.0) / 2.0).abs() < 1e-9);

        c.rotate(-1);
        assert_eq!(c.state().rotation, Rotation::Deg0);
    }

    #[test]
    fn rotate_accepts_any_turn_count() {
        let mut c = controller();
        c.rotate(i32::MAX);
        assert_eq!(c.state().rotation, Rotation::Deg270);
        c.rotate(i32::MIN);
        assert_eq!(c.state().rotation, Rotation::Deg270);
        assert!((c.state().pan_x - (1000.0 - 720.0) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn fit_after_rotation_accounts_for_swap() {
        let mut c = controller();
        c.rotate(1);
        c.fit();
        // min((1000-40)/600, (800-40)/800) = 0.95
        assert!((c.state().scale - 0.95).abs() < 1e-12);
    }

    #[test]
    fn detach_resets_state() {
        let mut c = controller();
        c.zoom_at(DevicePoint::new(0.0, 0.0), 2.0);
        c.detach_page();
        assert!(c.page().is_none());
        assert_eq!(*c.state(), ViewportState::default());
    }
}
