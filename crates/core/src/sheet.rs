//! Identifiers for the project/sheet a takeoff belongs to
//!
//! Projects and sheets are owned by the surrounding application; the engine only
//! carries their ids through to the records it emits.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<&str> for SheetId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A (project, sheet) pair. Calibration and measurement storage are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SheetKey {
    pub project_id: ProjectId,
    pub sheet_id: SheetId,
}

impl SheetKey {
    pub fn new(project_id: impl Into<ProjectId>, sheet_id: impl Into<SheetId>) -> Self {
        Self { project_id: project_id.into(), sheet_id: sheet_id.into() }
    }
}

impl fmt::Display for SheetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.sheet_id)
    }
}
