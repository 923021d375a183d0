use crate::connection::RepositoryConnectionFactory;
use crate::projection::Projection;
use crate::repository::{FederatedRepository, FederatedWorkspace};
use common::RepoError;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// Configuration of a federated repository, read from JSON.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FederationConfig {
    pub name: String,
    #[serde(default)]
    pub default_workspace: Option<String>,
    #[serde(default)]
    pub retry_limit: i32,
    #[serde(default)]
    pub time_to_expire_ms: Option<u64>,
    pub workspaces: Vec<WorkspaceConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    pub name: String,
    pub projections: Vec<ProjectionConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    pub source: String,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    /// Rules in the form `repository path => source path $ exception $ ...`.
    pub rules: Vec<String>,
}

impl FederationConfig {
    pub fn from_json(json: &str) -> Result<Self, RepoError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &str) -> Result<Self, RepoError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Retry limit with negative values treated as zero.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit.max(0) as u32
    }

    /// Builds the repository described by this configuration.
    ///
    /// The default workspace is placed first. Without a named default, the first workspace is used.
    ///
    /// # Arguments
    ///
    /// * `factory` - Opens connections to the configured sources.
    pub fn into_repository(self, factory: Arc<dyn RepositoryConnectionFactory>) -> Result<FederatedRepository, RepoError> {
        let retry_limit = self.retry_limit();
        let time_to_expire = self.time_to_expire_ms.map(Duration::from_millis);
        let mut workspaces = Vec::with_capacity(self.workspaces.len());
        for workspace in self.workspaces {
            let mut projections = Vec::with_capacity(workspace.projections.len());
            for projection in &workspace.projections {
                let rules = projection
                    .rules
                    .iter()
                    .map(|r| Projection::parse_rule(r))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| RepoError::ConfigError(format!("workspace '{}': {}", workspace.name, e)))?;
                projections.push(Projection::new(
                    &projection.source,
                    projection.workspace.as_deref(),
                    projection.read_only,
                    rules,
                ));
            }
            workspaces.push(FederatedWorkspace::new(&workspace.name, projections)?);
        }
        if let Some(default) = &self.default_workspace {
            let idx = workspaces
                .iter()
                .position(|w| w.name() == default)
                .ok_or_else(|| RepoError::ConfigError(format!("Default workspace '{}' is not configured", default)))?;
            let workspace = workspaces.remove(idx);
            workspaces.insert(0, workspace);
        }
        info!("configured federated repository '{}' with {} workspace(s)", self.name, workspaces.len());
        Ok(FederatedRepository::new(&self.name, workspaces, factory)?
            .with_retry_limit(retry_limit)
            .with_time_to_expire(time_to_expire))
    }
}
