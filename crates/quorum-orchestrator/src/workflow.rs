use crate::events::{OrchestratorBus, OrchestratorEvent};
use crate::report::WorkflowReport;
use crate::types::{Finding, PhaseResult, Verdict, ADVERSARIAL_PHASE, SYNC_PHASE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quorum_core::QuorumResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Reconciliation budget when the config does not set one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

/// A named, ordered sequence of phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub id: String,
    pub name: String,
    pub phases: Vec<String>,
    /// Upper bound on sync + adversarial re-runs after the gate fails.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Free-form settings for phase executors.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowConfig {
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            phases: phases.into_iter().map(Into::into).collect(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Mutable state of one workflow run, shared with every phase executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub config: WorkflowConfig,
    pub current_phase: Option<String>,
    /// Reconciliation iterations performed so far.
    pub iteration: u32,
    /// Every phase result in execution order, reconciliation re-runs included.
    pub results: Vec<PhaseResult>,
    /// Documents and items discovered by executors. Opaque to the runner.
    pub inventory: serde_json::Map<String, serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub verdict: Option<Verdict>,
}

impl WorkflowContext {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            current_phase: None,
            iteration: 0,
            results: Vec::new(),
            inventory: serde_json::Map::new(),
            started_at: Utc::now(),
            verdict: None,
        }
    }

    /// Most recent result recorded for `phase`.
    pub fn latest_result(&self, phase: &str) -> Option<&PhaseResult> {
        self.results.iter().rev().find(|r| r.phase == phase)
    }

    /// All findings across all results, in execution order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.results.iter().flat_map(|r| r.findings.iter())
    }
}

/// One named step of a workflow.
///
/// Executors run strictly one at a time and may read and write the
/// context. Retrying or circuit-breaking calls to outside services is the
/// executor's own business; the runner treats any `Err` as fatal.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(&self, ctx: &mut WorkflowContext) -> QuorumResult<PhaseResult>;
}

/// Drives a [`WorkflowConfig`] through its registered phase executors.
pub struct WorkflowRunner {
    executors: HashMap<String, Arc<dyn PhaseExecutor>>,
    events: OrchestratorBus,
}

impl WorkflowRunner {
    pub fn new(events: OrchestratorBus) -> Self {
        Self {
            executors: HashMap::new(),
            events,
        }
    }

    /// Bind `executor` to the phase called `name`, replacing any previous one.
    /// Phases without an executor run as a no-op success.
    pub fn register_phase(&mut self, name: impl Into<String>, executor: Arc<dyn PhaseExecutor>) {
        self.executors.insert(name.into(), executor);
    }

    pub fn has_phase(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    pub fn events(&self) -> &OrchestratorBus {
        &self.events
    }

    /// Run every configured phase, reconcile if the adversarial gate fails,
    /// and report.
    ///
    /// Resolves to a report whatever the verdict. The first executor error
    /// aborts the run, is announced as `workflow:error`, and is returned
    /// unchanged.
    pub async fn run(&self, config: WorkflowConfig) -> QuorumResult<WorkflowReport> {
        let mut ctx = WorkflowContext::new(config);
        let workflow_id = ctx.config.id.clone();

        info!(
            workflow_id = %workflow_id,
            name = %ctx.config.name,
            phases = ctx.config.phases.len(),
            "Workflow: starting"
        );
        self.events.emit(OrchestratorEvent::WorkflowStart {
            workflow_id: workflow_id.clone(),
            name: ctx.config.name.clone(),
            phases: ctx.config.phases.clone(),
        });

        if let Err(e) = self.drive(&mut ctx).await {
            error!(
                workflow_id = %workflow_id,
                phase = ?ctx.current_phase,
                error = %e,
                "Workflow: aborted"
            );
            self.events.emit(OrchestratorEvent::WorkflowError {
                workflow_id,
                phase: ctx.current_phase.clone(),
                error: e.to_string(),
            });
            return Err(e);
        }

        let report = WorkflowReport::build(&ctx);
        info!(
            workflow_id = %workflow_id,
            verdict = %report.verdict,
            iterations = ctx.iteration,
            duration_ms = report.duration_ms,
            "Workflow: complete"
        );
        self.events
            .emit(OrchestratorEvent::WorkflowComplete(Box::new(report.clone())));
        Ok(report)
    }

    async fn drive(&self, ctx: &mut WorkflowContext) -> QuorumResult<()> {
        let phases = ctx.config.phases.clone();
        for phase in &phases {
            let success = self.run_phase(phase, ctx).await?;
            if phase == ADVERSARIAL_PHASE && !success && ctx.verdict != Some(Verdict::Pass) {
                self.reconcile(ctx).await?;
            }
        }

        if ctx.verdict.is_none() {
            let verdict = ctx
                .latest_result(ADVERSARIAL_PHASE)
                .map_or(Verdict::Fail, |r| Verdict::from_success(r.success));
            ctx.verdict = Some(verdict);
        }
        Ok(())
    }

    /// Re-run sync then adversarial until the gate passes or the budget
    /// is spent.
    async fn reconcile(&self, ctx: &mut WorkflowContext) -> QuorumResult<()> {
        ctx.verdict = Some(Verdict::Fail);
        while ctx.iteration < ctx.config.max_iterations && ctx.verdict == Some(Verdict::Fail) {
            ctx.iteration += 1;
            info!(
                workflow_id = %ctx.config.id,
                iteration = ctx.iteration,
                max_iterations = ctx.config.max_iterations,
                "Workflow: reconciliation iteration"
            );
            self.run_phase(SYNC_PHASE, ctx).await?;
            if self.run_phase(ADVERSARIAL_PHASE, ctx).await? {
                ctx.verdict = Some(Verdict::Pass);
            }
        }
        if ctx.verdict == Some(Verdict::Fail) {
            warn!(
                workflow_id = %ctx.config.id,
                iterations = ctx.iteration,
                "Workflow: adversarial gate still failing, budget exhausted"
            );
        }
        Ok(())
    }

    /// Execute one phase and record its result. Returns the phase's success.
    async fn run_phase(&self, name: &str, ctx: &mut WorkflowContext) -> QuorumResult<bool> {
        let workflow_id = ctx.config.id.clone();
        ctx.current_phase = Some(name.to_string());
        self.events.emit(OrchestratorEvent::PhaseStart {
            workflow_id: workflow_id.clone(),
            phase: name.to_string(),
            iteration: ctx.iteration,
        });

        let start = Instant::now();
        let mut result = match self.executors.get(name) {
            Some(executor) => executor.execute(ctx).await?,
            None => PhaseResult::success(name),
        };
        result.phase = name.to_string();
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            workflow_id = %workflow_id,
            phase = name,
            success = result.success,
            findings = result.findings.len(),
            duration_ms = result.duration_ms,
            "Workflow: phase complete"
        );
        for finding in &result.findings {
            self.events.emit(OrchestratorEvent::Finding {
                workflow_id: workflow_id.clone(),
                phase: name.to_string(),
                finding: finding.clone(),
            });
        }
        self.events.emit(OrchestratorEvent::PhaseComplete {
            workflow_id,
            result: result.clone(),
        });

        let success = result.success;
        ctx.results.push(result);
        Ok(success)
    }
}

impl Default for WorkflowRunner {
    fn default() -> Self {
        Self::new(OrchestratorBus::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use quorum_core::QuorumError;

    struct Fixed(bool);

    #[async_trait]
    impl PhaseExecutor for Fixed {
        async fn execute(&self, _ctx: &mut WorkflowContext) -> QuorumResult<PhaseResult> {
            Ok(PhaseResult::new("ignored", self.0))
        }
    }

    struct Inventory;

    #[async_trait]
    impl PhaseExecutor for Inventory {
        async fn execute(&self, ctx: &mut WorkflowContext) -> QuorumResult<PhaseResult> {
            ctx.inventory
                .insert("README.md".into(), serde_json::json!({"sections": 4}));
            Ok(PhaseResult::success("inventory"))
        }
    }

    struct Broken;

    #[async_trait]
    impl PhaseExecutor for Broken {
        async fn execute(&self, _ctx: &mut WorkflowContext) -> QuorumResult<PhaseResult> {
            Err(QuorumError::phase("analyze", "repository not found"))
        }
    }

    #[tokio::test]
    async fn test_unregistered_phases_are_noop_success() {
        let runner = WorkflowRunner::default();
        let report = runner
            .run(WorkflowConfig::new("wf", "noop", ["inventory", "analyze", "adversarial"]))
            .await
            .unwrap();

        assert_eq!(report.phases.len(), 3);
        assert!(report.phases.iter().all(|p| p.success && p.findings.is_empty()));
        assert_eq!(report.verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_no_adversarial_phase_defaults_to_fail() {
        let runner = WorkflowRunner::default();
        let report = runner
            .run(WorkflowConfig::new("wf", "plain", ["inventory", "sync"]))
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_result_phase_name_is_normalized() {
        let mut runner = WorkflowRunner::default();
        runner.register_phase("analyze", Arc::new(Fixed(true)));
        let report = runner
            .run(WorkflowConfig::new("wf", "names", ["analyze"]))
            .await
            .unwrap();
        assert_eq!(report.phases[0].phase, "analyze");
    }

    #[tokio::test]
    async fn test_executor_can_populate_inventory() {
        let mut runner = WorkflowRunner::default();
        runner.register_phase("inventory", Arc::new(Inventory));

        let mut ctx = WorkflowContext::new(WorkflowConfig::new("wf", "inv", ["inventory"]));
        runner.drive(&mut ctx).await.unwrap();
        assert_eq!(ctx.inventory["README.md"]["sections"], 4);
        assert_eq!(ctx.latest_result("inventory").unwrap().phase, "inventory");
    }

    #[tokio::test]
    async fn test_executor_error_aborts() {
        let mut runner = WorkflowRunner::default();
        runner.register_phase("analyze", Arc::new(Broken));
        runner.register_phase("adversarial", Arc::new(Fixed(true)));

        let err = runner
            .run(WorkflowConfig::new("wf", "broken", ["analyze", "adversarial"]))
            .await
            .unwrap_err();
        assert!(matches!(err, QuorumError::Phase { .. }));
    }

    #[tokio::test]
    async fn test_zero_budget_fails_without_looping() {
        let mut runner = WorkflowRunner::default();
        runner.register_phase("adversarial", Arc::new(Fixed(false)));
        let report = runner
            .run(WorkflowConfig::new("wf", "strict", ["sync", "adversarial"]).with_max_iterations(0))
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.phases.len(), 2);
        assert_eq!(report.summary.iterations, 0);
    }

    #[test]
    fn test_context_findings_iterator() {
        let mut ctx = WorkflowContext::new(WorkflowConfig::new("wf", "f", ["a"]));
        ctx.results.push(
            PhaseResult::failure("adversarial")
                .with_findings(vec![Finding::new("a", "b", Severity::High)]),
        );
        ctx.results.push(
            PhaseResult::failure("adversarial")
                .with_findings(vec![Finding::new("c", "d", Severity::Low)]),
        );
        assert_eq!(ctx.findings().count(), 2);
        assert_eq!(ctx.latest_result("adversarial").unwrap().findings[0].claim, "c");
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: WorkflowConfig = serde_json::from_str(
            r#"{"id": "docs", "name": "Doc sync", "phases": ["sync", "adversarial"]}"#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(config.metadata.is_empty());
    }
}
