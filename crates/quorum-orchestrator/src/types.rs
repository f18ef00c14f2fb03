use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the phase whose failure triggers reconciliation.
pub const ADVERSARIAL_PHASE: &str = "adversarial";
/// Name of the phase re-run before each adversarial retry.
pub const SYNC_PHASE: &str = "sync";

/// Status of a task, owned by the caller. The queue never changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed { reason: String },
}

/// A unit of work for some kind of agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Kind of worker that should handle this task (e.g. `"coder"`).
    pub agent_type: String,
    pub input: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(agent_type: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_type: agent_type.into(),
            input,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// A [`Task`] plus its scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    pub task: Task,
    /// Higher dequeues first.
    pub priority: i32,
    pub added_at: DateTime<Utc>,
    /// Worker the task was assigned to after dequeue.
    pub assigned_to: Option<String>,
}

impl QueuedTask {
    pub fn id(&self) -> Uuid {
        self.task.id
    }
}

/// Severity of a [`Finding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A recorded discrepancy between what something claims and what was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// What the document or artifact asserts.
    pub claim: String,
    /// The observation that contradicts it.
    pub contradiction: String,
    pub severity: Severity,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Finding {
    pub fn new(claim: impl Into<String>, contradiction: impl Into<String>, severity: Severity) -> Self {
        Self {
            claim: claim.into(),
            contradiction: contradiction.into(),
            severity,
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }
}

/// Outcome of running one phase once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: String,
    pub success: bool,
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Opaque payload produced by the phase.
    #[serde(default)]
    pub artifacts: serde_json::Value,
    /// Wall time measured by the runner.
    #[serde(default)]
    pub duration_ms: u64,
}

impl PhaseResult {
    pub fn new(phase: impl Into<String>, success: bool) -> Self {
        Self {
            phase: phase.into(),
            success,
            findings: Vec::new(),
            artifacts: serde_json::Value::Null,
            duration_ms: 0,
        }
    }

    pub fn success(phase: impl Into<String>) -> Self {
        Self::new(phase, true)
    }

    pub fn failure(phase: impl Into<String>) -> Self {
        Self::new(phase, false)
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn with_artifacts(mut self, artifacts: serde_json::Value) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

/// Terminal outcome of the adversarial gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn from_success(success: bool) -> Self {
        if success {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}
