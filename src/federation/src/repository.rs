use crate::connection::RepositoryConnectionFactory;
use crate::projection::Projection;
use crate::projector::{projector_for, ProjectedNode, Projector};
use common::{Location, RepoError};
use std::sync::Arc;
use std::time::Duration;

/// A workspace in the federated repository, backed by one or more projections.
pub struct FederatedWorkspace {
    name: String,
    projections: Vec<Arc<Projection>>,
    projector: Box<dyn Projector>,
}

impl FederatedWorkspace {
    /// Creates a workspace and picks the projector that best fits its projections.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the workspace.
    /// * `projections` - Projections in priority order; must not be empty.
    pub fn new(name: &str, projections: Vec<Projection>) -> Result<Self, RepoError> {
        if projections.is_empty() {
            return Err(RepoError::ConfigError(format!(
                "Workspace '{}' has no projections",
                name
            )));
        }
        let projections: Vec<Arc<Projection>> = projections.into_iter().map(Arc::new).collect();
        let projector = projector_for(&projections);
        debug!("workspace '{}' uses the {} projector", name, projector.name());
        Ok(FederatedWorkspace {
            name: name.to_string(),
            projections,
            projector,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn projections(&self) -> &[Arc<Projection>] {
        &self.projections
    }

    pub fn projector_name(&self) -> &'static str {
        self.projector.name()
    }

    /// Projects a location in this workspace onto its sources.
    pub fn project(&self, location: &Location, requires_update: bool) -> Option<ProjectedNode> {
        self.projector.project(location, requires_update)
    }
}

/// A repository that federates content from several sources into a set of workspaces.
pub struct FederatedRepository {
    name: String,
    workspaces: Vec<FederatedWorkspace>,
    factory: Arc<dyn RepositoryConnectionFactory>,
    retry_limit: u32,
    time_to_expire: Option<Duration>,
}

impl FederatedRepository {
    /// Creates a repository.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the repository, used in errors.
    /// * `workspaces` - Workspaces; the first one is the default.
    /// * `factory` - Opens connections to the sources.
    pub fn new(
        name: &str,
        workspaces: Vec<FederatedWorkspace>,
        factory: Arc<dyn RepositoryConnectionFactory>,
    ) -> Result<Self, RepoError> {
        if workspaces.is_empty() {
            return Err(RepoError::ConfigError(format!(
                "Repository '{}' has no workspaces",
                name
            )));
        }
        Ok(FederatedRepository {
            name: name.to_string(),
            workspaces,
            factory,
            retry_limit: 0,
            time_to_expire: None,
        })
    }

    /// Sets how many times a failed source request is retried.
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Sets how long results from this repository may be cached.
    pub fn with_time_to_expire(mut self, time_to_expire: Option<Duration>) -> Self {
        self.time_to_expire = time_to_expire;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn time_to_expire(&self) -> Option<Duration> {
        self.time_to_expire
    }

    pub fn connection_factory(&self) -> &Arc<dyn RepositoryConnectionFactory> {
        &self.factory
    }

    pub fn workspace_names(&self) -> Vec<&str> {
        self.workspaces.iter().map(|w| w.name()).collect()
    }

    pub fn default_workspace(&self) -> &FederatedWorkspace {
        &self.workspaces[0]
    }

    /// Looks up a workspace by name, or the default workspace when no name is given.
    pub fn workspace(&self, name: Option<&str>) -> Result<&FederatedWorkspace, RepoError> {
        match name {
            None => Ok(self.default_workspace()),
            Some(name) => self
                .workspaces
                .iter()
                .find(|w| w.name() == name)
                .ok_or_else(|| RepoError::InvalidWorkspace {
                    workspace: name.to_string(),
                    source: self.name.clone(),
                }),
        }
    }
}
