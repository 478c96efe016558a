use serde::Deserialize;

use super::tasks::TaskUpdate;
use crate::llm::ProviderId;

/// A decoded mission event, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionEvent {
    TaskUpdate { task: TaskUpdate },
    Log { llm: ProviderId, message: String },
    OrchestrationComplete,
    /// Well-formed, but of a type this monitor does not handle
    #[serde(other)]
    Unknown,
}

impl MissionEvent {
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
