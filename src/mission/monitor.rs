use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::MissionEvent;
use super::logs::LogChannels;
use super::tasks::{MissionTask, TaskBoard};
use super::{EventStream, MissionBackend, MissionError, MissionPlan};
use crate::notify::{NoticeSource, Notifier};

const TRANSPORT_FAILED_NOTICE: &str = "Connection to event stream failed. The orchestration may have completed, or there was a network error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Idle,
    Starting,
    Streaming,
    Completed,
    Failed,
}

/// The live event channel of one mission.
struct StreamSession {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StreamSession {
    fn close(self) -> JoinHandle<()> {
        tracing::debug!(generation = self.generation, "Closing event stream");
        self.cancel.cancel();
        self.handle
    }
}

struct MonitorState {
    status: MissionStatus,
    generation: u64,
    instance_id: Option<String>,
    plan: Option<MissionPlan>,
    draft: Option<MissionPlan>,
    tasks: TaskBoard,
    logs: LogChannels,
    session: Option<StreamSession>,
}

impl MonitorState {
    /// Close the current channel and clear every projection.
    fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.generation += 1;
        self.instance_id = None;
        self.tasks.clear();
        self.logs.clear();
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionSnapshot {
    pub status: MissionStatus,
    pub instance_id: Option<String>,
    pub plan: Option<MissionPlan>,
    pub draft: Option<MissionPlan>,
    pub tasks: Vec<MissionTask>,
    pub logs: LogChannels,
}

enum Flow {
    Continue,
    Stop,
}

/// Drives one mission at a time and owns its event channel.
#[derive(Clone)]
pub struct MissionMonitor {
    backend: Arc<dyn MissionBackend>,
    notifier: Notifier,
    state: Arc<Mutex<MonitorState>>,
    status_tx: Arc<watch::Sender<MissionStatus>>,
}

impl MissionMonitor {
    pub fn new(backend: Arc<dyn MissionBackend>, notifier: Notifier) -> Self {
        let (status_tx, _) = watch::channel(MissionStatus::Idle);
        Self {
            backend,
            notifier,
            state: Arc::new(Mutex::new(MonitorState {
                status: MissionStatus::Idle,
                generation: 0,
                instance_id: None,
                plan: None,
                draft: None,
                tasks: TaskBoard::default(),
                logs: LogChannels::default(),
                session: None,
            })),
            status_tx: Arc::new(status_tx),
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<MissionStatus> {
        self.status_tx.subscribe()
    }

    fn set_status(&self, state: &mut MonitorState, status: MissionStatus) {
        if state.status != status {
            tracing::info!(from = ?state.status, to = ?status, generation = state.generation, "Mission status");
        }
        state.status = status;
        self.status_tx.send_replace(status);
    }

    pub async fn snapshot(&self) -> MissionSnapshot {
        let state = self.state.lock().await;
        MissionSnapshot {
            status: state.status,
            instance_id: state.instance_id.clone(),
            plan: state.plan.clone(),
            draft: state.draft.clone(),
            tasks: state.tasks.tasks(),
            logs: state.logs.clone(),
        }
    }

    /// Start a mission and open its event channel.
    ///
    /// Any previous channel is closed and the task board and logs are reset
    /// before the start call is made. Returns the new instance id, or
    /// [`MissionError::Superseded`] if another submit or a replay took over
    /// while the start call was in flight.
    pub async fn submit(&self, plan: MissionPlan) -> Result<String, MissionError> {
        let plan = plan.validated()?;

        let generation = {
            let mut state = self.state.lock().await;
            state.reset();
            state.plan = Some(plan.clone());
            state.draft = None;
            self.set_status(&mut state, MissionStatus::Starting);
            state.generation
        };
        tracing::info!(
            generation,
            objective = %plan.objective,
            agents = plan.agents.len(),
            strategy = ?plan.strategy,
            "Submitting mission"
        );

        let result = self.backend.start_workflow(&plan).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                generation,
                started = ?result.as_ref().ok(),
                "Mission superseded while starting"
            );
            return Err(MissionError::Superseded);
        }

        let instance_id = match result {
            Ok(id) => id,
            Err(e) => {
                self.set_status(&mut state, MissionStatus::Failed);
                self.notifier.notify(NoticeSource::Mission, format!("API Error: {}", e));
                return Err(MissionError::Start(e));
            }
        };

        let stream = self.backend.open_stream(&instance_id);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.clone().run_session(generation, stream, cancel.clone()));
        state.session = Some(StreamSession {
            generation,
            cancel,
            handle,
        });
        state.instance_id = Some(instance_id.clone());
        self.set_status(&mut state, MissionStatus::Streaming);
        tracing::info!(generation, instance_id = %instance_id, "Mission event stream opened");

        Ok(instance_id)
    }

    /// Load a replay plan as the draft for the next submission.
    pub async fn load_replay(&self, plan: MissionPlan) {
        let mut state = self.state.lock().await;
        state.reset();
        state.draft = Some(plan);
        self.set_status(&mut state, MissionStatus::Idle);
    }

    /// Close the event channel, if any, and wait for its reader to stop.
    pub async fn shutdown(&self) {
        let handle = self.state.lock().await.session.take().map(StreamSession::close);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Event stream reader did not stop cleanly");
            }
        }
    }

    async fn run_session(
        self,
        generation: u64,
        mut stream: EventStream,
        cancel: CancellationToken,
    ) {
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                item = stream.next() => item,
            };

            let flow = match item {
                Some(Ok(data)) => self.handle_payload(generation, &data).await,
                Some(Err(e)) => {
                    tracing::warn!(generation, error = %e, "Mission event stream error");
                    self.fail_stream(generation).await;
                    Flow::Stop
                }
                None => {
                    tracing::warn!(generation, "Mission event stream ended before completion");
                    self.fail_stream(generation).await;
                    Flow::Stop
                }
            };
            if let Flow::Stop = flow {
                return;
            }
        }
    }

    async fn handle_payload(&self, generation: u64, data: &str) -> Flow {
        let event = match MissionEvent::parse(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(generation, error = %e, payload = %data, "Dropping malformed mission event");
                return Flow::Continue;
            }
        };

        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Flow::Stop;
        }

        match event {
            MissionEvent::TaskUpdate { task } => {
                let id = task.id.clone();
                let merge = state.tasks.merge(task);
                tracing::debug!(generation, task_id = %id, ?merge, "Task update");
            }
            MissionEvent::Log { llm, message } => {
                state.logs.push(llm, message);
            }
            MissionEvent::OrchestrationComplete => {
                if let Some(session) = state.session.take() {
                    session.close();
                }
                self.set_status(&mut state, MissionStatus::Completed);
                return Flow::Stop;
            }
            MissionEvent::Unknown => {
                tracing::debug!(generation, "Ignoring mission event of unknown type");
            }
        }
        Flow::Continue
    }

    async fn fail_stream(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation || state.status != MissionStatus::Streaming {
            return;
        }
        if let Some(session) = state.session.take() {
            session.close();
        }
        self.set_status(&mut state, MissionStatus::Failed);
        self.notifier.notify(NoticeSource::Mission, TRANSPORT_FAILED_NOTICE);
    }
}
