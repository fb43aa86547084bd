//! Project list: the ordered `{id, name}` records a run scrapes.
//!
//! The list is produced by a separate extraction step and is read-only
//! here. `name` is the row key in the sheet, so it should be unique.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Dashboard project id (stable external identifier).
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display name; matched against column A of the sheet.
    pub name: String,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}

/// Ids show up as `"647"`, `"#647"` or `647` depending on who wrote the file.
fn deserialize_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(d)? {
        RawId::Text(s) => s.trim().trim_start_matches('#').to_string(),
        RawId::Number(n) => n.to_string(),
    })
}

#[derive(Debug)]
pub enum ProjectError {
    Io { path: String, message: String },
    Parse { path: String, message: String },
    /// A record with an empty id or name (0-based position).
    Incomplete { index: usize },
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read project list {path}: {message}"),
            Self::Parse { path, message } => {
                write!(f, "invalid project list JSON in {path}: {message}")
            }
            Self::Incomplete { index } => {
                write!(f, "project list entry {} has an empty id or name", index + 1)
            }
        }
    }
}

impl std::error::Error for ProjectError {}

/// Load the project list from a JSON file.
pub fn load_projects(path: &Path) -> Result<Vec<Project>, ProjectError> {
    let label = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| ProjectError::Io {
        path: label.clone(),
        message: e.to_string(),
    })?;
    parse_projects(&contents).map_err(|e| match e {
        ProjectError::Parse { message, .. } => ProjectError::Parse { path: label, message },
        other => other,
    })
}

/// Parse a project list from JSON text. Order is preserved.
pub fn parse_projects(json: &str) -> Result<Vec<Project>, ProjectError> {
    let mut projects: Vec<Project> = serde_json::from_str(json).map_err(|e| ProjectError::Parse {
        path: "<inline>".to_string(),
        message: e.to_string(),
    })?;

    for (index, p) in projects.iter_mut().enumerate() {
        p.name = p.name.trim().to_string();
        if p.id.is_empty() || p.name.is_empty() {
            return Err(ProjectError::Incomplete { index });
        }
    }
    Ok(projects)
}

/// Names that occur more than once. These collide in the sheet merge.
pub fn duplicate_names(projects: &[Project]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut dupes = Vec::new();
    for p in projects {
        if !seen.insert(p.name.as_str()) && !dupes.contains(&p.name.as_str()) {
            dupes.push(p.name.as_str());
        }
    }
    dupes
}
