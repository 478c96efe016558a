//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::conversation::Vote;
use crate::markup::Block;
use crate::mission::MissionPlan;
use crate::persona::Persona;

/// Service status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Base URL of the orchestration service missions are started on
    pub orchestrator: String,
    pub default_persona: String,
}

/// Roster entry without the bio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSummary {
    pub name: String,
    pub role: String,
    pub focus_areas: Vec<String>,
}

impl From<&Persona> for PersonaSummary {
    fn from(persona: &Persona) -> Self {
        Self {
            name: persona.name.clone(),
            role: persona.role.clone(),
            focus_areas: persona.focus_areas.clone(),
        }
    }
}

/// Full persona with the bio parsed and rendered.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaDetail {
    pub name: String,
    pub role: String,
    pub focus_areas: Vec<String>,

    /// Parsed bio blocks
    pub blocks: Vec<Block>,

    /// HTML projection of `blocks`
    pub bio_html: String,
}

/// Request to switch the conversation persona.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchPersonaRequest {
    pub name: String,
}

/// Request to send a chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Returned once the turn is appended. Replies arrive in later snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkResponse {
    pub index: usize,
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub vote: Vote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub index: usize,

    /// Resulting vote; `None` when the vote was cleared
    pub vote: Option<Vote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyResponse {
    pub text: String,
}

/// Which providers have a credential after an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsStatus {
    pub gemini: bool,
    pub openai: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionStartedResponse {
    pub instance_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerQuery {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareResponse {
    pub ok: bool,
}

/// The plan now loaded as the mission draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResponse {
    pub draft: MissionPlan,
}
