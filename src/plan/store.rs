//! Plan persistence
//!
//! Stores are bookkeeping only; the gateway's experiment records stay
//! authoritative for task state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::http::{Credentials, Ignored, JsonClient};

use super::Plan;

/// Keyed storage for plan documents
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Store a plan under a newly minted id and return the id
    async fn create(&self, plan: &Plan) -> Result<String>;

    /// Replace the document stored under `id`
    async fn update(&self, id: &str, plan: &Plan) -> Result<()>;

    async fn load(&self, id: &str) -> Result<Plan>;

    /// Every plan visible to the current user
    async fn query(&self) -> Result<Vec<Plan>>;
}

/// Plan document carrying the given id
fn document(plan: &Plan, id: &str) -> Result<Value> {
    let mut doc = serde_json::to_value(plan)?;
    doc["id"] = Value::String(id.to_string());
    Ok(doc)
}

// ─────────────────────────────────────────────────────────────────
// In memory
// ─────────────────────────────────────────────────────────────────

/// Store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    plans: RwLock<BTreeMap<String, Value>>,
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn create(&self, plan: &Plan) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.plans.write().insert(id.clone(), document(plan, &id)?);
        Ok(id)
    }

    async fn update(&self, id: &str, plan: &Plan) -> Result<()> {
        self.plans.write().insert(id.to_string(), document(plan, id)?);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        let doc = self
            .plans
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::PlanNotFound { id: id.to_string() })?;
        Ok(serde_json::from_value(doc)?)
    }

    async fn query(&self) -> Result<Vec<Plan>> {
        self.plans
            .read()
            .values()
            .map(|doc| serde_json::from_value(doc.clone()).map_err(Error::from))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────
// Directory of JSON files
// ─────────────────────────────────────────────────────────────────

/// One `<id>.json` file per plan
#[derive(Debug, Clone)]
pub struct FilePlanStore {
    dir: PathBuf,
}

impl FilePlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(Error::PlanNotFound { id: id.to_string() });
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn write(&self, id: &str, plan: &Plan) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| Error::IoWrite {
            path: self.dir.clone(),
            source: e,
        })?;
        let path = self.path_for(id)?;
        let body = serde_json::to_string_pretty(&document(plan, id)?)?;
        fs::write(&path, body)
            .await
            .map_err(|e| Error::IoWrite { path, source: e })
    }
}

#[async_trait]
impl PlanStore for FilePlanStore {
    async fn create(&self, plan: &Plan) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.write(&id, plan).await?;
        info!(id = %id, dir = %self.dir.display(), "Plan stored");
        Ok(id)
    }

    async fn update(&self, id: &str, plan: &Plan) -> Result<()> {
        self.write(id, plan).await?;
        debug!(id = %id, "Plan updated");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(Error::PlanNotFound { id: id.to_string() });
        }
        Plan::read_from(&path)
    }

    async fn query(&self) -> Result<Vec<Plan>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| Error::IoRead {
            path: self.dir.clone(),
            source: e,
        })?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut plans = Vec::with_capacity(paths.len());
        for path in paths {
            match Plan::read_from(&path) {
                Ok(plan) => plans.push(plan),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable plan"),
            }
        }
        Ok(plans)
    }
}

// ─────────────────────────────────────────────────────────────────
// Gateway plan API
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Plans kept by the gateway under the caller's account
#[derive(Debug, Clone)]
pub struct RestPlanStore {
    http: JsonClient,
}

impl RestPlanStore {
    pub fn new(base_url: impl Into<String>, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, credentials, timeout)?,
        })
    }
}

#[async_trait]
impl PlanStore for RestPlanStore {
    async fn create(&self, plan: &Plan) -> Result<String> {
        let created: Created = self.http.post("/api/v1/plan", plan).await?;
        info!(id = %created.id, "Plan stored on gateway");
        Ok(created.id)
    }

    async fn update(&self, id: &str, plan: &Plan) -> Result<()> {
        let _: Ignored = self
            .http
            .put(&format!("/api/v1/plan/{}", id), &document(plan, id)?)
            .await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Plan> {
        self.http
            .get_optional(&format!("/api/v1/plan/{}", id))
            .await?
            .ok_or_else(|| Error::PlanNotFound { id: id.to_string() })
    }

    async fn query(&self) -> Result<Vec<Plan>> {
        self.http.get("/api/v1/plan/user").await
    }
}
