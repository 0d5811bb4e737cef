use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use takeoff_core::{
    store::check_calibration_key, Calibration, CalibrationStore, Measurement, MeasurementId,
    MeasurementStore, ProjectId, SheetId, SheetKey, StoreError, StoreResult,
};

const SHEET_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("invalid {kind} id {id:?}: must be a single path component")]
    InvalidId { kind: &'static str, id: String },
    #[error("{} has unsupported schema version {found}", .path.display())]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<StorageError> for StoreError {
    fn from(error: StorageError) -> Self {
        StoreError::Backend(Box::new(error))
    }
}

/// Everything stored for one sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    #[serde(default)]
    pub calibration: Option<Calibration>,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SheetEnvelope {
    version: u32,
    #[serde(flatten)]
    record: SheetRecord,
}

/// Measurement and calibration store backed by one JSON file per sheet,
/// at `<root>/<project>/<sheet>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Takeoff", "Takeoff")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().join("sheets") })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_sheet(&self, key: &SheetKey) -> Result<SheetRecord, StorageError> {
        let path = self.sheet_path(key)?;
        if !path.exists() {
            return Ok(SheetRecord::default());
        }
        read_envelope(&path)
    }

    pub fn save_sheet(&self, key: &SheetKey, record: &SheetRecord) -> Result<(), StorageError> {
        let path = self.sheet_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = SheetEnvelope { version: SHEET_SCHEMA_VERSION, record: record.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(&path, bytes)?;
        log::debug!("saved {} measurements to {}", record.measurements.len(), path.display());
        Ok(())
    }

    /// Every sheet with a file under the root, sorted.
    ///
    /// Entries whose names could not have been written by this store (`.git`,
    /// `.DS_Store.json`, non UTF-8 names) are skipped.
    pub fn sheets(&self) -> Result<Vec<SheetKey>, StorageError> {
        let mut keys = Vec::new();
        if !self.root.exists() {
            return Ok(keys);
        }

        for project in fs::read_dir(&self.root)? {
            let project = project?;
            if !project.file_type()?.is_dir() {
                continue;
            }
            let name = project.file_name();
            let Some(project_id) = name.to_str().filter(|id| is_valid_id(id)) else {
                log::debug!("skipping {}", project.path().display());
                continue;
            };

            for sheet in fs::read_dir(project.path())? {
                let path = sheet?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                match path.file_stem().and_then(|stem| stem.to_str()) {
                    Some(stem) if is_valid_id(stem) => {
                        keys.push(SheetKey::new(project_id, stem));
                    }
                    _ => log::debug!("skipping {}", path.display()),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn sheet_path(&self, key: &SheetKey) -> Result<PathBuf, StorageError> {
        let project = path_component("project", &key.project_id.0)?;
        let sheet = path_component("sheet", &key.sheet_id.0)?;
        Ok(self.root.join(project).join(format!("{sheet}.json")))
    }
}

fn read_envelope(path: &Path) -> Result<SheetRecord, StorageError> {
    let bytes = fs::read(path)?;
    let envelope: SheetEnvelope = serde_json::from_slice(&bytes)?;
    if envelope.version > SHEET_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: envelope.version,
        });
    }
    Ok(envelope.record)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\', '\0'])
}

fn path_component<'a>(kind: &'static str, id: &'a str) -> Result<&'a str, StorageError> {
    if !is_valid_id(id) {
        return Err(StorageError::InvalidId { kind, id: id.to_string() });
    }
    Ok(id)
}

impl MeasurementStore for FileStore {
    fn add_measurement(&mut self, measurement: Measurement) -> StoreResult<MeasurementId> {
        let key = measurement.key();
        let mut record = self.load_sheet(&key)?;
        let id = measurement.id;
        if record.measurements.iter().any(|m| m.id == id) {
            return Err(StoreError::Duplicate(id));
        }

        record.measurements.push(measurement);
        self.save_sheet(&key, &record)?;
        Ok(id)
    }

    fn list_measurements(
        &self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
    ) -> StoreResult<Vec<Measurement>> {
        let key = SheetKey { project_id: project_id.clone(), sheet_id: sheet_id.clone() };
        Ok(self.load_sheet(&key)?.measurements)
    }

    fn delete_measurement(&mut self, id: MeasurementId) -> StoreResult<()> {
        for key in self.sheets()? {
            let mut record = self.load_sheet(&key)?;
            let before = record.measurements.len();
            record.measurements.retain(|m| m.id != id);
            if record.measurements.len() != before {
                self.save_sheet(&key, &record)?;
                return Ok(());
            }
        }
        Err(StoreError::NotFound(id))
    }
}

impl CalibrationStore for FileStore {
    fn get_calibration(
        &self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
    ) -> StoreResult<Option<Calibration>> {
        let key = SheetKey { project_id: project_id.clone(), sheet_id: sheet_id.clone() };
        Ok(self.load_sheet(&key)?.calibration)
    }

    fn set_calibration(
        &mut self,
        project_id: &ProjectId,
        sheet_id: &SheetId,
        calibration: Calibration,
    ) -> StoreResult<()> {
        let key = SheetKey { project_id: project_id.clone(), sheet_id: sheet_id.clone() };
        check_calibration_key(&key, &calibration)?;

        let mut record = self.load_sheet(&key)?;
        record.calibration = Some(calibration);
        self.save_sheet(&key, &record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use takeoff_core::{MeasurementType, NormalizedPoint};

    fn measurement(project: &str, sheet: &str, value: f64) -> Measurement {
        Measurement {
            id: MeasurementId::new_v4(),
            project_id: project.into(),
            sheet_id: sheet.into(),
            pdf_page: 1,
            measurement_type: MeasurementType::Linear,
            points_normalized: vec![NormalizedPoint::new(0.1, 0.1), NormalizedPoint::new(0.1, 0.3)],
            calculated_value: value,
            unit: "ft".to_string(),
            condition_id: "walls".into(),
            perimeter_value: None,
            uncalibrated: false,
        }
    }

    fn calibration(project: &str, sheet: &str, scale: f64) -> Calibration {
        Calibration {
            project_id: project.into(),
            sheet_id: sheet.into(),
            scale,
            unit: "ft".to_string(),
            calibrated_at: Utc::now(),
        }
    }

    #[test]
    fn measurements_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());

        let first = measurement("tower", "A-101", 10.0);
        let second = measurement("tower", "A-101", 2.5);
        store.add_measurement(first.clone()).expect("add should succeed");
        store.add_measurement(second.clone()).expect("add should succeed");

        let reopened = FileStore::with_root(temp.path());
        let loaded = reopened
            .list_measurements(&"tower".into(), &"A-101".into())
            .expect("list should succeed");
        assert_eq!(loaded, vec![first, second]);
        assert!(temp.path().join("tower").join("A-101.json").exists());
    }

    #[test]
    fn missing_sheet_is_empty() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());

        let (p, s) = (ProjectId::from("p"), SheetId::from("s"));
        assert!(store.list_measurements(&p, &s).expect("list should succeed").is_empty());
        assert!(store.get_calibration(&p, &s).expect("get should succeed").is_none());
        assert!(store.sheets().expect("sheets should succeed").is_empty());
    }

    #[test]
    fn envelope_carries_version() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());
        store
            .set_calibration(&"p".into(), &"s".into(), calibration("p", "s", 50.0))
            .expect("set should succeed");

        let raw =
            fs::read_to_string(temp.path().join("p").join("s.json")).expect("file should exist");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(json["version"], 1);
        assert_eq!(json["calibration"]["scale"], 50.0);
        assert_eq!(json["measurements"], serde_json::json!([]));
    }

    #[test]
    fn calibration_overwrites_and_keeps_measurements() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());
        let (p, s) = (ProjectId::from("p"), SheetId::from("s"));

        store.add_measurement(measurement("p", "s", 1.0)).expect("add should succeed");
        store.set_calibration(&p, &s, calibration("p", "s", 10.0)).expect("set should succeed");
        store.set_calibration(&p, &s, calibration("p", "s", 20.0)).expect("set should succeed");

        assert_eq!(store.get_calibration(&p, &s).expect("get").map(|c| c.scale), Some(20.0));
        assert_eq!(store.list_measurements(&p, &s).expect("list").len(), 1);
    }

    #[test]
    fn delete_finds_measurement_in_any_sheet() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());

        store.add_measurement(measurement("p", "s1", 1.0)).expect("add");
        let target = store.add_measurement(measurement("p", "s2", 2.0)).expect("add");

        store.delete_measurement(target).expect("delete should succeed");
        assert!(store.list_measurements(&"p".into(), &"s2".into()).expect("list").is_empty());
        assert_eq!(store.list_measurements(&"p".into(), &"s1".into()).expect("list").len(), 1);
        assert!(matches!(store.delete_measurement(target), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());
        let m = measurement("p", "s", 1.0);

        store.add_measurement(m.clone()).expect("add");
        assert!(matches!(store.add_measurement(m), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());

        let err = store.add_measurement(measurement("../escape", "s", 1.0)).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(matches!(
            store.load_sheet(&SheetKey::new("p", "a/b")),
            Err(StorageError::InvalidId { kind: "sheet", .. })
        ));
    }

    #[test]
    fn newer_schema_is_refused() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());
        fs::create_dir_all(temp.path().join("p")).expect("mkdir");
        let body = r#"{"version": 2, "measurements": []}"#;
        fs::write(temp.path().join("p").join("s.json"), body).expect("write");

        assert!(matches!(
            store.load_sheet(&SheetKey::new("p", "s")),
            Err(StorageError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn sheets_are_listed() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());
        store.add_measurement(measurement("b", "s2", 1.0)).expect("add");
        store.add_measurement(measurement("a", "s1", 1.0)).expect("add");

        assert_eq!(
            store.sheets().expect("sheets"),
            vec![SheetKey::new("a", "s1"), SheetKey::new("b", "s2")]
        );
    }

    #[test]
    fn stray_dot_entries_do_not_break_delete() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());
        let id = store.add_measurement(measurement("p", "s", 1.0)).expect("add");

        fs::create_dir_all(temp.path().join(".git")).expect("mkdir");
        fs::write(temp.path().join(".git").join("HEAD.json"), "{}").expect("write");
        fs::write(temp.path().join("p").join(".DS_Store.json"), "junk").expect("write");

        assert_eq!(store.sheets().expect("sheets"), vec![SheetKey::new("p", "s")]);
        store.delete_measurement(id).expect("delete should skip stray entries");
        assert!(store.list_measurements(&"p".into(), &"s".into()).expect("list").is_empty());
    }
}
