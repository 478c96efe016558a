//! HTTP client for the remote orchestration service.
//!
//! Covers mission start, the per-instance SSE event channel and the
//! orchestration ledger (query, share, replay).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response};
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::OrchestratorConfig;
use crate::mission::{EventStream, MissionBackend, MissionPlan, Strategy};

/// Workflow name the orchestration service expects for missions.
pub const MISSION_WORKFLOW: &str = "CUA_Mission_Orchestration";

const UNKNOWN_ERROR: &str = "An unknown error occurred";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{0}")]
    Http(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("event stream: {0}")]
    Stream(String),

    #[error("invalid response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            OrchestratorError::Parse(e.to_string())
        } else {
            OrchestratorError::Http(e.to_string())
        }
    }
}

/// A completed mission as recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub id: String,
    pub objective: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub summary: serde_json::Map<String, serde_json::Value>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(rename = "instanceId")]
    instance_id: String,
}

#[derive(Debug, Deserialize)]
struct ShareResponse {
    ok: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayResponse {
    #[serde(default)]
    ok: bool,
    objective: String,
    agents: Vec<String>,
    #[serde(default)]
    llm_strategy: Strategy,
}

#[derive(Clone)]
pub struct OrchestratorClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl OrchestratorClient {
    /// `timeout` bounds unary calls only; the event channel stays open until closed.
    pub fn new(config: &OrchestratorConfig, timeout: Duration) -> Result<Self, OrchestratorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("triad-control/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ledger records, newest first.
    pub async fn list_ledger(
        &self,
        query: Option<&str>,
    ) -> Result<Vec<LedgerRecord>, OrchestratorError> {
        let mut url = self.url("/ledger/spas");
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            url.push_str("?q=");
            url.push_str(&urlencoding::encode(q));
        }

        let response = self.http.get(&url).timeout(self.timeout).send().await?;
        let response = check(response, "Failed to fetch ledger SPAs").await?;
        let mut records: Vec<LedgerRecord> = response.json().await?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tracing::debug!(count = records.len(), query = ?query, "Fetched ledger");
        Ok(records)
    }

    pub async fn share(&self, id: &str) -> Result<bool, OrchestratorError> {
        let url = self.url(&format!("/ledger/spas/{}/share", urlencoding::encode(id)));
        let response = self
            .authorize(self.http.post(&url))
            .timeout(self.timeout)
            .send()
            .await?;
        let response = check(response, "Failed to share context").await?;
        let body: ShareResponse = response.json().await?;
        Ok(body.ok)
    }

    /// Fetch the plan needed to run a recorded mission again.
    pub async fn replay(&self, id: &str) -> Result<MissionPlan, OrchestratorError> {
        let url = self.url(&format!("/ledger/spas/{}/replay", urlencoding::encode(id)));
        let response = self
            .authorize(self.http.post(&url))
            .timeout(self.timeout)
            .send()
            .await?;
        let response = check(response, "Failed to get replay data").await?;
        let body: ReplayResponse = response.json().await?;
        if !body.ok {
            tracing::warn!(id, "Replay response not marked ok");
        }
        Ok(MissionPlan {
            objective: body.objective,
            agents: body.agents,
            strategy: body.llm_strategy,
        })
    }
}

/// Turn a non-success response into an [`OrchestratorError::Api`].
///
/// The message is the body's `error` field, or `"{fallback} with status N"`.
async fn check(response: Response, fallback: &str) -> Result<Response, OrchestratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => value
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} with status {}", fallback, status.as_u16())),
        Err(_) => UNKNOWN_ERROR.to_string(),
    };
    Err(OrchestratorError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl MissionBackend for OrchestratorClient {
    async fn start_workflow(&self, plan: &MissionPlan) -> Result<String, OrchestratorError> {
        let body = json!({
            "name": MISSION_WORKFLOW,
            "params": {
                "objective": plan.objective,
                "agents": plan.agents,
                "llmStrategy": plan.strategy,
            }
        });
        let response = self
            .authorize(self.http.post(self.url("/workflows/start")))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let response = check(response, "Failed to start workflow").await?;
        let started: StartResponse = response.json().await?;
        Ok(started.instance_id)
    }

    fn open_stream(&self, instance_id: &str) -> EventStream {
        let url = self.url(&format!(
            "/control/mission/{}/stream",
            urlencoding::encode(instance_id)
        ));
        let request = self.authorize(self.http.get(&url));

        let mut source = match EventSource::new(request) {
            Ok(source) => source,
            Err(e) => {
                let error = OrchestratorError::Stream(e.to_string());
                return futures::stream::once(async move { Err(error) }).boxed();
            }
        };
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        async_stream::stream! {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => tracing::debug!(url = %url, "Mission event stream connected"),
                    Ok(Event::Message(message)) if message.event == "message" => {
                        yield Ok(message.data);
                    }
                    Ok(Event::Message(message)) => {
                        tracing::debug!(event = %message.event, "Skipping named mission stream event");
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        source.close();
                        yield Err(OrchestratorError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        }
        .boxed()
    }
}
