//! Task board: the merged view of `task_update` events.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::llm::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionTask {
    pub id: String,
    pub description: String,
    pub agent: String,
    pub llm: Option<ProviderId>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

/// A partial task as carried by one event. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskUpdate {
    #[serde(deserialize_with = "task_id")]
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub llm: Option<ProviderId>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub log: Option<String>,
}

/// Task ids are strings on the wire, but numeric ids are accepted too.
fn task_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("invalid task id: {}", other))),
    }
}

impl From<TaskUpdate> for MissionTask {
    fn from(update: TaskUpdate) -> Self {
        Self {
            id: update.id,
            description: update.description.unwrap_or_default(),
            agent: update.agent.unwrap_or_default(),
            llm: update.llm,
            status: update.status.unwrap_or_default(),
            log: update.log,
        }
    }
}

impl MissionTask {
    fn apply(&mut self, update: TaskUpdate) {
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(agent) = update.agent {
            self.agent = agent;
        }
        if update.llm.is_some() {
            self.llm = update.llm;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if update.log.is_some() {
            self.log = update.log;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Inserted,
    Updated,
}

/// Tasks keyed by id, iterated in lexicographic id order.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: BTreeMap<String, MissionTask>,
}

impl TaskBoard {
    pub fn merge(&mut self, update: TaskUpdate) -> Merge {
        match self.tasks.get_mut(&update.id) {
            Some(task) => {
                task.apply(update);
                Merge::Updated
            }
            None => {
                self.tasks.insert(update.id.clone(), update.into());
                Merge::Inserted
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&MissionTask> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> Vec<MissionTask> {
        self.tasks.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
