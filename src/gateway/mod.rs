//! Gateway catalog and experiment API
//!
//! Resolves human-readable names to gateway ids and creates, launches,
//! inspects and terminates experiment records.

mod rest;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::runtime::ExperimentState;
use crate::task::InputValue;

pub use rest::RestGateway;

/// Catalog entry kinds that submissions reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogKind {
    Project,
    Application,
    ComputeResource,
    StorageResource,
    GroupProfile,
}

impl CatalogKind {
    /// Path segment used by the catalog API
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Project => "project",
            CatalogKind::Application => "application",
            CatalogKind::ComputeResource => "compute-resource",
            CatalogKind::StorageResource => "storage-resource",
            CatalogKind::GroupProfile => "group-profile",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved experiment submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRequest {
    pub experiment_name: String,
    pub project_id: String,
    pub application_id: String,
    pub compute_resource_id: String,
    pub storage_resource_id: String,
    pub group_profile_id: String,
    /// Resource category of the compute resource
    pub category: String,
    pub queue: String,
    pub node_count: u32,
    pub cpu_count: u32,
    /// Minutes
    pub wall_time: u32,
    pub inputs: BTreeMap<String, InputValue>,
}

/// Identity and placement of a launched experiment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedExperiment {
    pub experiment_id: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub storage_host: Option<String>,
}

/// Catalog and experiment operations of the gateway
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Look up the id of a named catalog entry
    async fn resolve(&self, kind: CatalogKind, name: &str) -> Result<Option<String>>;

    /// Create the experiment record and launch it
    async fn launch_experiment(&self, request: &ExperimentRequest) -> Result<LaunchedExperiment>;

    /// Current state of an experiment
    async fn experiment_state(&self, experiment_id: &str) -> Result<ExperimentState>;

    /// Ask the gateway to cancel an experiment
    async fn terminate_experiment(&self, experiment_id: &str) -> Result<()>;
}
