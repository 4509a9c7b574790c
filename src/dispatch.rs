//! Runs a warming job in an execution context associated with the target region.

use crate::config::Config;
use crate::models::RunResult;
use crate::warmer::{WarmJob, WarmingExecutor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Route a worker exposes for executing jobs on behalf of a dispatcher.
pub const WORKER_PATH: &str = "/internal/warm";

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Worker for placement hint '{hint}' is unreachable")]
    Unreachable {
        hint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Worker for placement hint '{hint}' returned HTTP {status}: {body}")]
    WorkerStatus { hint: String, status: u16, body: String },

    #[error("Invalid response from worker '{hint}'")]
    InvalidResponse {
        hint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Local warming task failed")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("Dispatcher setup failed: {0}")]
    Client(String),
}

/// Something that can execute a warming job near a given geography.
#[async_trait]
pub trait RegionDispatcher: Send + Sync {
    async fn run_in_region(&self, hint: &str, job: WarmJob) -> Result<RunResult, DispatchError>;
}

/// Executes jobs in this process on a dedicated task.
#[derive(Clone)]
pub struct LocalDispatcher {
    executor: Arc<WarmingExecutor>,
}

impl LocalDispatcher {
    pub fn new(executor: Arc<WarmingExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl RegionDispatcher for LocalDispatcher {
    #[tracing::instrument(skip(self, job), fields(region = %job.region.label, urls = job.urls.len()))]
    async fn run_in_region(&self, hint: &str, job: WarmJob) -> Result<RunResult, DispatchError> {
        let executor = Arc::clone(&self.executor);
        // A panic inside the run surfaces as a JoinError instead of tearing down the caller.
        let result = tokio::spawn(async move { executor.warm(&job).await }).await?;
        Ok(result)
    }
}

/// Forwards jobs to workers deployed near each placement hint.
/// Hints without a registered worker run locally.
pub struct RemoteDispatcher {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
    fallback: LocalDispatcher,
}

impl RemoteDispatcher {
    pub fn new(
        endpoints: HashMap<String, String>,
        user_agent: &str,
        fallback: LocalDispatcher,
    ) -> Result<Self, DispatchError> {
        // No overall timeout: a large page legitimately runs for a long time.
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(Config::CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoints,
            fallback,
        })
    }

    pub fn endpoint_for(&self, hint: &str) -> Option<String> {
        self.endpoints
            .get(hint)
            .map(|base| format!("{}{}", base, WORKER_PATH))
    }
}

#[async_trait]
impl RegionDispatcher for RemoteDispatcher {
    #[tracing::instrument(skip(self, job), fields(region = %job.region.label, urls = job.urls.len()))]
    async fn run_in_region(&self, hint: &str, job: WarmJob) -> Result<RunResult, DispatchError> {
        let Some(endpoint) = self.endpoint_for(hint) else {
            tracing::debug!(hint = %hint, "No worker registered for hint, running locally");
            return self.fallback.run_in_region(hint, job).await;
        };

        tracing::info!(hint = %hint, endpoint = %endpoint, "Dispatching job to regional worker");
        let response = self
            .client
            .post(&endpoint)
            .json(&job)
            .send()
            .await
            .map_err(|source| DispatchError::Unreachable {
                hint: hint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::WorkerStatus {
                hint: hint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<RunResult>()
            .await
            .map_err(|source| DispatchError::InvalidResponse {
                hint: hint.to_string(),
                source,
            })
    }
}
