//! Streamed mission monitor.
//!
//! A mission is submitted to the remote orchestration service, which answers
//! with an instance id. The monitor then holds exactly one live event stream
//! for that instance and folds its events into two projections: a task board
//! merged by task id and three per-provider log channels.

mod events;
mod logs;
mod monitor;
mod tasks;

pub use events::MissionEvent;
pub use logs::LogChannels;
pub use monitor::{MissionMonitor, MissionSnapshot, MissionStatus};
pub use tasks::{Merge, MissionTask, TaskBoard, TaskStatus, TaskUpdate};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::OrchestratorError;

/// How the remote orchestrator distributes work across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    #[default]
    #[serde(rename = "TRIPLE_DYNAMIC")]
    TripleDynamic,
    #[serde(rename = "GEMINI_PRIMARY")]
    GeminiPrimary,
    #[serde(rename = "OPENAI_PRIMARY")]
    OpenAiPrimary,
    #[serde(rename = "ABACUS_PRIMARY")]
    AbacusPrimary,
}

/// What to run: the objective, the participating agents and the strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionPlan {
    pub objective: String,
    pub agents: Vec<String>,
    #[serde(rename = "llmStrategy", default)]
    pub strategy: Strategy,
}

impl MissionPlan {
    /// Check the submission guard. Returns the plan with a trimmed objective.
    pub fn validated(self) -> Result<Self, MissionError> {
        let objective = self.objective.trim();
        if objective.is_empty() {
            return Err(MissionError::EmptyObjective);
        }
        if self.agents.is_empty() {
            return Err(MissionError::NoAgents);
        }
        Ok(Self {
            objective: objective.to_string(),
            ..self
        })
    }
}

#[derive(Debug, Error)]
pub enum MissionError {
    #[error("objective is empty")]
    EmptyObjective,

    #[error("at least one agent must be selected")]
    NoAgents,

    #[error("failed to start mission: {0}")]
    Start(#[source] OrchestratorError),

    #[error("mission was replaced before it started")]
    Superseded,
}

/// Raw `data` payloads of the mission event channel.
pub type EventStream = BoxStream<'static, Result<String, OrchestratorError>>;

/// The remote side of a mission.
#[async_trait]
pub trait MissionBackend: Send + Sync {
    /// Start a workflow and return its instance id.
    async fn start_workflow(&self, plan: &MissionPlan) -> Result<String, OrchestratorError>;

    /// Open the event channel for an instance. The stream ends when the
    /// channel closes.
    fn open_stream(&self, instance_id: &str) -> EventStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(objective: &str, agents: &[&str]) -> MissionPlan {
        MissionPlan {
            objective: objective.to_string(),
            agents: agents.iter().map(|a| a.to_string()).collect(),
            strategy: Strategy::default(),
        }
    }

    #[test]
    fn strategy_is_sent_verbatim() {
        assert_eq!(
            serde_json::to_value(Strategy::OpenAiPrimary).unwrap(),
            "OPENAI_PRIMARY"
        );
        let parsed: Strategy = serde_json::from_str("\"ABACUS_PRIMARY\"").unwrap();
        assert_eq!(parsed, Strategy::AbacusPrimary);
    }

    #[test]
    fn plan_uses_wire_field_names() {
        let value = serde_json::to_value(plan("ship", &["LYRA"])).unwrap();
        assert_eq!(value["llmStrategy"], "TRIPLE_DYNAMIC");
        assert_eq!(value["agents"][0], "LYRA");
    }

    #[test]
    fn guard_requires_objective_and_agents() {
        assert!(matches!(
            plan("   ", &["LYRA"]).validated(),
            Err(MissionError::EmptyObjective)
        ));
        assert!(matches!(
            plan("ship", &[]).validated(),
            Err(MissionError::NoAgents)
        ));
        assert_eq!(plan("  ship  ", &["LYRA"]).validated().unwrap().objective, "ship");
    }
}
