use crate::report::WorkflowReport;
use crate::types::{Finding, PhaseResult, QueuedTask};
use quorum_core::{EventBus, NamedEvent};
use serde::{Deserialize, Serialize};

/// Bus carrying [`OrchestratorEvent`]s.
pub type OrchestratorBus = EventBus<OrchestratorEvent>;

/// Everything the queue and the workflow runner announce.
///
/// Serialized with an `event` tag holding the wire name, so an external
/// bridge can forward events as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum OrchestratorEvent {
    #[serde(rename = "task:added")]
    TaskAdded(QueuedTask),
    #[serde(rename = "task:assigned")]
    TaskAssigned(QueuedTask),
    #[serde(rename = "task:completed")]
    TaskCompleted(QueuedTask),
    #[serde(rename = "queue:empty")]
    QueueEmpty,
    #[serde(rename = "workflow:start")]
    WorkflowStart {
        workflow_id: String,
        name: String,
        phases: Vec<String>,
    },
    #[serde(rename = "phase:start")]
    PhaseStart {
        workflow_id: String,
        phase: String,
        iteration: u32,
    },
    #[serde(rename = "finding")]
    Finding {
        workflow_id: String,
        phase: String,
        finding: Finding,
    },
    #[serde(rename = "phase:complete")]
    PhaseComplete {
        workflow_id: String,
        result: PhaseResult,
    },
    #[serde(rename = "workflow:complete")]
    WorkflowComplete(Box<WorkflowReport>),
    #[serde(rename = "workflow:error")]
    WorkflowError {
        workflow_id: String,
        phase: Option<String>,
        error: String,
    },
}

impl NamedEvent for OrchestratorEvent {
    fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::TaskAdded(_) => "task:added",
            OrchestratorEvent::TaskAssigned(_) => "task:assigned",
            OrchestratorEvent::TaskCompleted(_) => "task:completed",
            OrchestratorEvent::QueueEmpty => "queue:empty",
            OrchestratorEvent::WorkflowStart { .. } => "workflow:start",
            OrchestratorEvent::PhaseStart { .. } => "phase:start",
            OrchestratorEvent::Finding { .. } => "finding",
            OrchestratorEvent::PhaseComplete { .. } => "phase:complete",
            OrchestratorEvent::WorkflowComplete(_) => "workflow:complete",
            OrchestratorEvent::WorkflowError { .. } => "workflow:error",
        }
    }
}
