//! Coordinate spaces and the transform between them
//!
//! Three spaces are in play:
//! - **Device**: raw pointer coordinates as delivered by the input surface.
//! - **Viewport**: canvas pixels after zoom, pan and rotation. Device minus container origin.
//! - **Normalized**: page-relative `[0, 1] x [0, 1]`, origin at the top-left corner of the
//!   unrotated page, independent of any viewport state.
//!
//! Points carry their space as a type parameter, so a [`DevicePoint`] can never be
//! handed to code expecting a [`NormalizedPoint`]. The functions in this module are the
//! only place where a point changes space.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Marker trait for coordinate spaces.
pub trait Space: Copy + Clone + fmt::Debug + PartialEq + Default {
    const NAME: &'static str;
}

/// Raw input-device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Device;

/// Zoomed, panned and rotated canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport;

/// Page-relative coordinates in `[0, 1] x [0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Normalized;

impl Space for Device {
    const NAME: &'static str = "device";
}

impl Space for Viewport {
    const NAME: &'static str = "viewport";
}

impl Space for Normalized {
    const NAME: &'static str = "normalized";
}

/// A 2D point tagged with the space it lives in.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<S: Space> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

pub type DevicePoint = Point<Device>;
pub type ViewportPoint = Point<Viewport>;
pub type NormalizedPoint = Point<Normalized>;

impl<S: Space> Point<S> {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, space: PhantomData }
    }

    /// Euclidean distance to another point in the same space.
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns the point unchanged, or an error naming the space if a coordinate is NaN/infinite.
    pub fn checked(self) -> Result<Self, GeometryError> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(GeometryError::NonFinite { what: S::NAME })
        }
    }
}

impl<S: Space> fmt::Debug for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", S::NAME, self.x, self.y)
    }
}

/// Intrinsic PDF page size at scale 1, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_points: f64,
    pub height_points: f64,
}

impl PageGeometry {
    pub fn new(width_points: f64, height_points: f64) -> Self {
        Self { width_points, height_points }
    }

    /// Returns the geometry if both dimensions are finite and strictly positive.
    pub fn validated(self) -> Result<Self, GeometryError> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if ok(self.width_points) && ok(self.height_points) {
            Ok(self)
        } else {
            Err(GeometryError::ZeroPageDimension {
                width: self.width_points,
                height: self.height_points,
            })
        }
    }

    /// Page size as laid out on screen after rotation (width and height swap at 90/270).
    pub fn rotated_size(&self, rotation: Rotation) -> (f64, f64) {
        if rotation.swaps_axes() {
            (self.height_points, self.width_points)
        } else {
            (self.width_points, self.height_points)
        }
    }
}

/// Page rotation in quarter turns, clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Parses any multiple of 90, wrapping into `[0, 360)`.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            _ => Some(Rotation::Deg270),
        }
    }

    /// Rotates by a signed number of quarter turns.
    pub fn turned(self, quarter_turns: i32) -> Self {
        match (self.degrees() / 90 + quarter_turns.rem_euclid(4) as u16) % 4 {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Exact `(cos, sin)` of the rotation angle.
    fn cos_sin(self) -> (f64, f64) {
        match self {
            Rotation::Deg0 => (1.0, 0.0),
            Rotation::Deg90 => (0.0, 1.0),
            Rotation::Deg180 => (-1.0, 0.0),
            Rotation::Deg270 => (0.0, -1.0),
        }
    }
}

/// Zoom, pan and rotation of one open page.
///
/// Viewport coordinates are `rotated_page_point * scale + pan`, where the rotated page
/// occupies `[0, w'] x [0, h']` in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub rotation: Rotation,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self { scale: 1.0, pan_x: 0.0, pan_y: 0.0, rotation: Rotation::Deg0 }
    }
}

/// Geometry failures. Fatal to the current operation; never stored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("non-finite {what} coordinate")]
    NonFinite { what: &'static str },

    #[error("page dimensions must be positive, got {width}x{height}")]
    ZeroPageDimension { width: f64, height: f64 },

    #[error("viewport scale must be positive, got {0}")]
    NonPositiveScale(f64),

    #[error("need at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },
}

/// Converts between device, viewport and normalized page space.
///
/// Holds only the divisor clamp; viewport state and page geometry are passed per call
/// so stale copies can never be used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceTransform {
    min_scale: f64,
}

impl Default for SpaceTransform {
    fn default() -> Self {
        Self { min_scale: 0.01 }
    }
}

impl SpaceTransform {
    pub fn new(min_scale: f64) -> Self {
        Self { min_scale }
    }

    /// Scale actually used for projection: validated, then clamped to the minimum.
    pub fn effective_scale(&self, viewport: &ViewportState) -> Result<f64, GeometryError> {
        let scale = viewport.scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(GeometryError::NonPositiveScale(scale));
        }
        Ok(scale.max(self.min_scale))
    }

    /// Device point to normalized page point.
    ///
    /// Undoes, in order: container offset, pan, zoom, rotation (about the page center),
    /// page dimensions.
    pub fn device_to_normalized(
        &self,
        device: DevicePoint,
        viewport: &ViewportState,
        container_origin: DevicePoint,
        page: &PageGeometry,
    ) -> Result<NormalizedPoint, GeometryError> {
        let device = device.checked()?;
        let origin = container_origin.checked()?;
        let local = ViewportPoint::new(device.x - origin.x, device.y - origin.y);
        self.viewport_to_normalized(local, viewport, page)
    }

    /// Viewport point to normalized page point.
    pub fn viewport_to_normalized(
        &self,
        point: ViewportPoint,
        viewport: &ViewportState,
        page: &PageGeometry,
    ) -> Result<NormalizedPoint, GeometryError> {
        let point = point.checked()?;
        let page = page.validated()?;
        let scale = self.effective_scale(viewport)?;
        check_pan(viewport)?;

        let (rotated_w, rotated_h) = page.rotated_size(viewport.rotation);
        let rx = (point.x - viewport.pan_x) / scale - rotated_w / 2.0;
        let ry = (point.y - viewport.pan_y) / scale - rotated_h / 2.0;

        // Inverse rotation: R(-θ) = R(θ)ᵀ
        let (cos, sin) = viewport.rotation.cos_sin();
        let px = rx * cos + ry * sin + page.width_points / 2.0;
        let py = -rx * sin + ry * cos + page.height_points / 2.0;

        NormalizedPoint::new(px / page.width_points, py / page.height_points).checked()
    }

    /// Normalized page point to viewport point.
    pub fn normalized_to_viewport(
        &self,
        point: NormalizedPoint,
        viewport: &ViewportState,
        page: &PageGeometry,
    ) -> Result<ViewportPoint, GeometryError> {
        let point = point.checked()?;
        let page = page.validated()?;
        let scale = self.effective_scale(viewport)?;
        check_pan(viewport)?;

        let dx = point.x * page.width_points - page.width_points / 2.0;
        let dy = point.y * page.height_points - page.height_points / 2.0;

        let (cos, sin) = viewport.rotation.cos_sin();
        let (rotated_w, rotated_h) = page.rotated_size(viewport.rotation);
        let rx = dx * cos - dy * sin + rotated_w / 2.0;
        let ry = dx * sin + dy * cos + rotated_h / 2.0;

        ViewportPoint::new(rx * scale + viewport.pan_x, ry * scale + viewport.pan_y).checked()
    }

    /// Normalized page point to device point, adding the container offset.
    pub fn normalized_to_device(
        &self,
        point: NormalizedPoint,
        viewport: &ViewportState,
        container_origin: DevicePoint,
        page: &PageGeometry,
    ) -> Result<DevicePoint, GeometryError> {
        let origin = container_origin.checked()?;
        let local = self.normalized_to_viewport(point, viewport, page)?;
        Ok(DevicePoint::new(local.x + origin.x, local.y + origin.y))
    }

    /// Projects a whole point sequence, preserving order.
    pub fn project_all(
        &self,
        points: &[NormalizedPoint],
        viewport: &ViewportState,
        page: &PageGeometry,
    ) -> Result<Vec<ViewportPoint>, GeometryError> {
        points.iter().map(|p| self.normalized_to_viewport(*p, viewport, page)).collect()
    }

    /// On-screen length in pixels of a normalized segment at the given viewport scale.
    ///
    /// Rotation preserves length, so only page size and zoom matter.
    pub fn screen_length(
        &self,
        a: NormalizedPoint,
        b: NormalizedPoint,
        viewport_scale: f64,
        page: &PageGeometry,
    ) -> Result<f64, GeometryError> {
        let page = page.validated()?;
        let a = a.checked()?;
        let b = b.checked()?;
        let zoom = ViewportState { scale: viewport_scale, ..Default::default() };
        let scale = self.effective_scale(&zoom)?;
        let dx = (b.x - a.x) * page.width_points;
        let dy = (b.y - a.y) * page.height_points;
        Ok(dx.hypot(dy) * scale)
    }
}

fn check_pan(viewport: &ViewportState) -> Result<(), GeometryError> {
    if viewport.pan_x.is_finite() && viewport.pan_y.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::NonFinite { what: "pan" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPS: f64 = 1e-9;

    fn letter() -> PageGeometry {
        PageGeometry::new(612.0, 792.0)
    }

    fn assert_close<S: Space>(a: Point<S>, b: Point<S>) {
        assert!((a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS, "{a:?} != {b:?}");
    }

    #[test]
    fn identity_viewport_maps_corners_to_page_points() {
        let t = SpaceTransform::default();
        let v = ViewportState::default();
        let p = t.normalized_to_viewport(NormalizedPoint::new(1.0, 1.0), &v, &letter()).unwrap();
        assert_close(p, ViewportPoint::new(612.0, 792.0));
    }

    #[test]
    fn rotation_90_swaps_axes() {
        let t = SpaceTransform::default();
        let v = ViewportState { rotation: Rotation::Deg90, ..Default::default() };
        let page = PageGeometry::new(800.0, 600.0);

        // Top-left of the page ends up at the top-right of the rotated 600x800 canvas.
        let p = t.normalized_to_viewport(NormalizedPoint::new(0.0, 0.0), &v, &page).unwrap();
        assert_close(p, ViewportPoint::new(600.0, 0.0));

        let p = t.normalized_to_viewport(NormalizedPoint::new(1.0, 0.0), &v, &page).unwrap();
        assert_close(p, ViewportPoint::new(600.0, 800.0));
    }

    #[test]
    fn rotation_180_flips_both_axes() {
        let t = SpaceTransform::default();
        let v = ViewportState { rotation: Rotation::Deg180, ..Default::default() };
        let page = PageGeometry::new(800.0, 600.0);
        let p = t.normalized_to_viewport(NormalizedPoint::new(0.25, 0.0), &v, &page).unwrap();
        assert_close(p, ViewportPoint::new(600.0, 600.0));
    }

    #[test]
    fn device_round_trip_with_container_origin() {
        let t = SpaceTransform::default();
        let v = ViewportState { scale: 2.5, pan_x: -40.0, pan_y: 13.0, rotation: Rotation::Deg270 };
        let origin = DevicePoint::new(200.0, 64.0);
        let n = NormalizedPoint::new(0.3, 0.7);

        let d = t.normalized_to_device(n, &v, origin, &letter()).unwrap();
        let back = t.device_to_normalized(d, &v, origin, &letter()).unwrap();
        assert_close(back, n);
    }

    #[test]
    fn random_round_trips_hold() {
        let t = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(7);
        let rotations = [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270];

        for _ in 0..1000 {
            let page = PageGeometry::new(rng.gen_range(50.0..5000.0), rng.gen_range(50.0..5000.0));
            let v = ViewportState {
                scale: rng.gen_range(0.1..5.0),
                pan_x: rng.gen_range(-2000.0..2000.0),
                pan_y: rng.gen_range(-2000.0..2000.0),
                rotation: rotations[rng.gen_range(0..4)],
            };
            let n = NormalizedPoint::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));

            let vp = t.normalized_to_viewport(n, &v, &page).unwrap();
            let device = DevicePoint::new(vp.x, vp.y);
            let origin = DevicePoint::new(0.0, 0.0);
            let back = t.device_to_normalized(device, &v, origin, &page).unwrap();
            assert_close(back, n);
        }
    }

    #[test]
    fn tiny_scale_is_clamped_consistently() {
        let t = SpaceTransform::default();
        let v = ViewportState { scale: 1e-6, ..Default::default() };
        let n = NormalizedPoint::new(0.5, 0.5);

        let vp = t.normalized_to_viewport(n, &v, &letter()).unwrap();
        assert_close(vp, ViewportPoint::new(306.0 * 0.01, 396.0 * 0.01));
        assert_close(t.viewport_to_normalized(vp, &v, &letter()).unwrap(), n);
    }

    #[test]
    fn non_positive_scale_is_an_error() {
        let t = SpaceTransform::default();
        let v = ViewportState { scale: 0.0, ..Default::default() };
        let center = NormalizedPoint::new(0.5, 0.5);
        let err = t.normalized_to_viewport(center, &v, &letter()).unwrap_err();
        assert_eq!(err, GeometryError::NonPositiveScale(0.0));
    }

    #[test]
    fn nan_input_is_rejected_not_clamped() {
        let t = SpaceTransform::default();
        let err = t
            .device_to_normalized(
                DevicePoint::new(f64::NAN, 1.0),
                &ViewportState::default(),
                DevicePoint::new(0.0, 0.0),
                &letter(),
            )
            .unwrap_err();
        assert_eq!(err, GeometryError::NonFinite { what: "device" });
    }

    #[test]
    fn zero_page_dimension_is_rejected() {
        let t = SpaceTransform::default();
        let err = t
            .normalized_to_viewport(
                NormalizedPoint::new(0.5, 0.5),
                &ViewportState::default(),
                &PageGeometry::new(0.0, 792.0),
            )
            .unwrap_err();
        assert!(matches!(err, GeometryError::ZeroPageDimension { .. }));
    }

    #[test]
    fn screen_length_ignores_rotation_and_scales_with_zoom() {
        let t = SpaceTransform::default();
        let page = PageGeometry::new(800.0, 600.0);
        let a = NormalizedPoint::new(0.1, 0.5);
        let b = NormalizedPoint::new(0.3, 0.5);
        assert!((t.screen_length(a, b, 1.0, &page).unwrap() - 160.0).abs() < EPS);
        assert!((t.screen_length(a, b, 2.0, &page).unwrap() - 320.0).abs() < EPS);
    }

    #[test]
    fn rotation_turns_wrap() {
        assert_eq!(Rotation::Deg0.turned(-1), Rotation::Deg270);
        assert_eq!(Rotation::Deg270.turned(1), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn extreme_turn_counts_reduce_without_overflow() {
        // i32::MAX is 3 mod 4, i32::MIN is 0 mod 4
        assert_eq!(Rotation::Deg0.turned(i32::MAX), Rotation::Deg270);
        assert_eq!(Rotation::Deg90.turned(i32::MAX), Rotation::Deg0);
        assert_eq!(Rotation::Deg90.turned(i32::MIN), Rotation::Deg90);
        assert_eq!(Rotation::Deg180.turned(i32::MIN + 1), Rotation::Deg270);
    }
}
