//! REST implementation of [`Gateway`]

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::{Credentials, Ignored, JsonClient};
use crate::runtime::ExperimentState;

use super::{CatalogKind, ExperimentRequest, Gateway, LaunchedExperiment};

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExperimentModel {
    #[serde(default)]
    experiment_status: Vec<StatusEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StateField {
    Label(String),
    Code(i32),
}

#[derive(Debug, Deserialize)]
struct StatusEntry {
    state: StateField,
}

/// Gateway REST API client
#[derive(Debug, Clone)]
pub struct RestGateway {
    http: JsonClient,
}

impl RestGateway {
    pub fn new(base_url: impl Into<String>, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, credentials, timeout)?,
        })
    }
}

fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[async_trait]
impl Gateway for RestGateway {
    async fn resolve(&self, kind: CatalogKind, name: &str) -> Result<Option<String>> {
        let path = format!("/api/v1/catalog/{}/{}", kind, encode_segment(name));
        let entry: Option<CatalogEntry> = self.http.get_optional(&path).await?;
        debug!(kind = %kind, name = %name, found = entry.is_some(), "Catalog lookup");
        Ok(entry.map(|e| e.id))
    }

    async fn launch_experiment(&self, request: &ExperimentRequest) -> Result<LaunchedExperiment> {
        let launched: LaunchedExperiment = self.http.post("/api/v1/exp/launch", request).await?;
        info!(
            experiment = %launched.experiment_id,
            name = %request.experiment_name,
            "Experiment launched"
        );
        Ok(launched)
    }

    async fn experiment_state(&self, experiment_id: &str) -> Result<ExperimentState> {
        let model: ExperimentModel = self
            .http
            .get(&format!("/api/v1/exp/{}", encode_segment(experiment_id)))
            .await?;

        match model.experiment_status.last() {
            None => Ok(ExperimentState::Created),
            Some(StatusEntry { state: StateField::Label(label) }) => label.parse(),
            Some(StatusEntry { state: StateField::Code(code) }) => ExperimentState::from_code(*code),
        }
    }

    async fn terminate_experiment(&self, experiment_id: &str) -> Result<()> {
        let _: Ignored = self
            .http
            .get(&format!("/api/v1/exp/terminate/{}", encode_segment(experiment_id)))
            .await?;
        info!(experiment = %experiment_id, "Termination requested");
        Ok(())
    }
}
