//! Takeoff Core Library
//!
//! Coordinate transforms, geometry, calibration and measurement sessions for
//! measuring on rendered PDF pages.

pub mod calibration;
pub mod condition;
pub mod config;
pub mod csv_export;
pub mod geometry;
pub mod measurement;
pub mod sheet;
pub mod space;
pub mod store;
pub mod summary;
pub mod units;
pub mod view;
pub mod viewport;

pub use calibration::{
    Calibration, CalibrationContext, CalibrationEngine, CalibrationError, CalibrationState,
    CalibrationStep, KnownDistance,
};
pub use condition::{Color, Condition, ConditionId, ConditionProvider, InvalidColor};
pub use config::{ConfigError, EngineConfig};
pub use csv_export::{
    export_measurements_csv, export_totals_csv, CsvExportConfig, CsvExportError, CsvExportResult,
};
pub use measurement::{
    compute_value, ClickOutcome, ComputedValue, Measurement, MeasurementEngine, MeasurementId,
    MeasurementType, PageContext, SessionError, SessionMode, SessionStateError,
};
pub use sheet::{ProjectId, SheetId, SheetKey};
pub use space::{
    Device, DevicePoint, GeometryError, Normalized, NormalizedPoint, PageGeometry, Point,
    Rotation, Space, SpaceTransform, Viewport, ViewportPoint, ViewportState,
};
pub use store::{
    CalibrationStore, FixedPageRenderer, InMemoryStore, MeasurementStore, PageRenderer,
    RenderError, StoreError, StoreResult,
};
pub use summary::{summarize, ConditionTotal};
pub use units::{LengthUnit, UnitKind, UnknownUnit};
pub use view::{InputEvent, Key, ProjectedMeasurement, TakeoffView, ViewEffect, ViewError};
pub use viewport::{Container, ContainerSize, ViewportController};
