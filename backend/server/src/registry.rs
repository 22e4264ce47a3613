//! Project registry and mirrored claim state.
//!
//! Projects are authored out-of-band (owner tooling) and dropped into a
//! directory as JSON files. The registry loads them once at startup,
//! validates each receiving address, derives the stable project ID, and
//! serves lookups from memory. Project metadata is immutable from then on.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{info, warn};

use beacon_protocol::{auth, ClaimInfo, Project};

use crate::errors::{Result, ServerError};

#[derive(Debug)]
pub struct ProjectRegistry {
    projects: HashMap<String, Project>,
}

impl ProjectRegistry {
    /// Load every `*.json` project file in `dir`. Files that fail to parse
    /// or carry an invalid receiving address are skipped with a warning; a
    /// missing or unreadable directory is fatal.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            ServerError::ProjectFile(format!("cannot read {}: {e}", dir.display()))
        })?;

        let mut projects = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ServerError::ProjectFile(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_file(&path) {
                Ok(project) => projects.push(project),
                Err(e) => warn!("skipping project file {}: {e}", path.display()),
            }
        }

        Ok(Self::from_projects(projects))
    }

    /// Build a registry from already-validated projects. IDs are derived
    /// here so callers cannot register a project under a foreign ID.
    pub fn from_projects(projects: Vec<Project>) -> Self {
        let mut map = HashMap::new();
        for mut project in projects {
            project.id = Project::derive_id(&project.address, &project.title);
            info!(project = %project.id, title = %project.title, "project loaded");
            map.insert(project.id.clone(), project);
        }
        ProjectRegistry { projects: map }
    }

    /// Resolve a project by the ID segment of the request path.
    pub fn resolve(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn count(&self) -> usize {
        self.projects.len()
    }
}

fn load_file(path: &Path) -> Result<Project> {
    let bytes = std::fs::read(path).map_err(|e| ServerError::ProjectFile(e.to_string()))?;
    let project: Project = serde_json::from_slice(&bytes)
        .map_err(|e| ServerError::ProjectFile(format!("invalid JSON: {e}")))?;
    // Reject bad addresses at load so authentication can't hit them later.
    auth::verifying_key(&project)
        .map_err(|_| ServerError::ProjectFile("invalid receiving address".to_string()))?;
    Ok(project)
}

// ─────────────────────────────────────────────────────────
// Claim state mirror
// ─────────────────────────────────────────────────────────

/// Read-mostly view of which projects have been claimed and by what
/// transaction. Written by the claim watcher (and journal replay), read by
/// status assembly. The core consults it but does not own claim detection.
#[derive(Default)]
pub struct ClaimStates {
    inner: RwLock<HashMap<String, ClaimInfo>>,
}

impl ClaimStates {
    pub fn get(&self, project_id: &str) -> Option<ClaimInfo> {
        self.inner.read().get(project_id).cloned()
    }

    pub fn set(&self, project_id: &str, info: ClaimInfo) {
        self.inner.write().insert(project_id.to_string(), info);
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
