//! Project profiles and their lookup seam.
//!
//! A project is the target service a number is rented for. Project CRUD
//! lives outside this crate; the engine only needs read access to the
//! polling parameters.

use std::collections::HashMap;
use std::time::Duration;

use numlease_core::ProjectId;

/// Polling parameters of one project.
#[derive(Debug, Clone)]
pub struct ProjectProfile {
    /// The project this profile describes.
    pub id: ProjectId,

    /// Display name.
    pub name: String,

    /// How long a reserved number waits for its code before timing out.
    pub code_timeout: Duration,

    /// Delay between polling attempts; `None` uses the engine default.
    pub poll_interval: Option<Duration>,
}

/// Read access to project profiles.
pub trait ProjectCatalog: Send + Sync {
    /// Look up a project's profile.
    fn project(&self, id: &ProjectId) -> Option<ProjectProfile>;
}

/// A fixed in-memory catalog, for tests and single-tenant deployments.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    projects: HashMap<ProjectId, ProjectProfile>,
}

impl StaticCatalog {
    /// Build a catalog from a list of profiles.
    #[must_use]
    pub fn new(profiles: impl IntoIterator<Item = ProjectProfile>) -> Self {
        Self {
            projects: profiles.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

impl ProjectCatalog for StaticCatalog {
    fn project(&self, id: &ProjectId) -> Option<ProjectProfile> {
        self.projects.get(id).cloned()
    }
}
