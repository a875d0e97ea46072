//! Remote substrate adapter
//!
//! Submits the task to a cluster scheduler over HTTP. The scheduler is
//! expected to launch the builder image with the given environment; a 2xx
//! response means "accepted", nothing more.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::BerthError;
use crate::runner::{BuildTask, TaskRunner};

pub struct HttpRunner {
    client: Client,
    endpoint: String,
    cluster: String,
    task_definition: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    cluster: &'a str,
    task_definition: &'a str,
    count: u32,
    environment: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: String,
    value: String,
}

impl HttpRunner {
    pub fn new(endpoint: &str, cluster: String, task_definition: String) -> Result<Self, BerthError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            cluster,
            task_definition,
        })
    }
}

#[async_trait]
impl TaskRunner for HttpRunner {
    async fn submit(&self, task: &BuildTask) -> Result<(), BerthError> {
        let url = format!("{}/tasks", self.endpoint);
        debug!("POST {}", url);

        let body = SubmitRequest {
            cluster: &self.cluster,
            task_definition: &self.task_definition,
            count: 1,
            environment: task
                .environment()
                .into_iter()
                .map(|(name, value)| EnvVar { name, value })
                .collect(),
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!("Substrate rejected task for {}: {} - {}", task.deployment_id, status, detail);
            return Err(BerthError::UpstreamError(format!(
                "substrate rejected task: {}",
                status
            )));
        }

        Ok(())
    }
}
