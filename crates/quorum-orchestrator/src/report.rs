use crate::types::{PhaseResult, Severity, Verdict, SYNC_PHASE};
use crate::workflow::WorkflowContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

/// Finding counts by severity across every recorded phase result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl FindingSummary {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// Totals taken from `syncResults` entries in sync-phase artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub sections_added: u64,
    pub sections_removed: u64,
    pub diagrams_updated: u64,
}

impl SyncSummary {
    /// Sum every `syncResults` entry found in `sync` results. `None` when no
    /// sync artifact carries such a collection.
    pub fn from_results(results: &[PhaseResult]) -> Option<Self> {
        let mut summary = SyncSummary::default();
        let mut seen = false;
        for result in results.iter().filter(|r| r.phase == SYNC_PHASE) {
            let Some(entries) = result.artifacts.get("syncResults").and_then(|v| v.as_array())
            else {
                continue;
            };
            seen = true;
            for entry in entries {
                summary.sections_added += count_field(entry, "sectionsAdded");
                summary.sections_removed += count_field(entry, "sectionsRemoved");
                summary.diagrams_updated += count_field(entry, "diagramsUpdated");
            }
        }
        seen.then_some(summary)
    }
}

// Executors report either a number or the list of affected items.
fn count_field(entry: &serde_json::Value, key: &str) -> u64 {
    match entry.get(key) {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::Array(items)) => items.len() as u64,
        _ => 0,
    }
}

/// Aggregate section of a [`WorkflowReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub findings: FindingSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSummary>,
    /// Reconciliation iterations performed.
    pub iterations: u32,
}

/// Terminal summary of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub id: Uuid,
    pub workflow_id: String,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub verdict: Verdict,
    /// Every phase result in execution order.
    pub phases: Vec<PhaseResult>,
    pub summary: ReportSummary,
    pub confidence: String,
}

impl WorkflowReport {
    /// Build the report for a finished run. A context without a verdict is
    /// reported as `FAIL`.
    pub fn build(ctx: &WorkflowContext) -> Self {
        let mut findings = FindingSummary::default();
        for finding in ctx.findings() {
            findings.add(finding.severity);
        }
        let verdict = ctx.verdict.unwrap_or(Verdict::Fail);
        let completed_at = Utc::now();
        let duration_ms = (completed_at - ctx.started_at).num_milliseconds().max(0) as u64;

        Self {
            id: Uuid::new_v4(),
            workflow_id: ctx.config.id.clone(),
            workflow_name: ctx.config.name.clone(),
            started_at: ctx.started_at,
            completed_at,
            duration_ms,
            verdict,
            phases: ctx.results.clone(),
            summary: ReportSummary {
                findings,
                sync: SyncSummary::from_results(&ctx.results),
                iterations: ctx.iteration,
            },
            confidence: confidence_statement(verdict, findings.high),
        }
    }

    /// Render as a Markdown document for humans.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Workflow report: {}", self.workflow_name);
        let _ = writeln!(out);
        let _ = writeln!(out, "- **Workflow:** `{}`", self.workflow_id);
        let _ = writeln!(out, "- **Report:** `{}`", self.id);
        let _ = writeln!(out, "- **Verdict:** {}", self.verdict);
        let _ = writeln!(out, "- **Started:** {}", self.started_at.to_rfc3339());
        let _ = writeln!(out, "- **Duration:** {} ms", self.duration_ms);
        let _ = writeln!(out, "- **Iterations:** {}", self.summary.iterations);
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.confidence);
        let _ = writeln!(out);

        let f = &self.summary.findings;
        let _ = writeln!(out, "## Findings");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Severity | Count |");
        let _ = writeln!(out, "|----------|-------|");
        let _ = writeln!(out, "| high | {} |", f.high);
        let _ = writeln!(out, "| medium | {} |", f.medium);
        let _ = writeln!(out, "| low | {} |", f.low);

        if let Some(sync) = &self.summary.sync {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Sync");
            let _ = writeln!(out);
            let _ = writeln!(out, "- Sections added: {}", sync.sections_added);
            let _ = writeln!(out, "- Sections removed: {}", sync.sections_removed);
            let _ = writeln!(out, "- Diagrams updated: {}", sync.diagrams_updated);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Phases");
        let _ = writeln!(out);
        for (i, phase) in self.phases.iter().enumerate() {
            let mark = if phase.success { "ok" } else { "FAILED" };
            let _ = writeln!(
                out,
                "{}. `{}` {} ({} ms, {} findings)",
                i + 1,
                phase.phase,
                mark,
                phase.duration_ms,
                phase.findings.len()
            );
            for finding in &phase.findings {
                let _ = writeln!(
                    out,
                    "   - [{:?}] {}: {}",
                    finding.severity, finding.claim, finding.contradiction
                );
            }
        }
        out
    }
}

/// One-sentence assessment of how far the run got.
pub fn confidence_statement(verdict: Verdict, high_findings: usize) -> String {
    match (verdict, high_findings) {
        (Verdict::Pass, 0) => {
            "High confidence: documentation and code are fully synchronized.".to_string()
        }
        (Verdict::Pass, n) => format!(
            "Medium confidence: the adversarial gate passed, but {n} high-severity finding(s) were only partially resolved."
        ),
        (Verdict::Fail, n) => format!(
            "Low confidence: the pipeline is incomplete with {n} unresolved high-severity finding(s)."
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Finding;
    use crate::workflow::WorkflowConfig;
    use serde_json::json;

    fn ctx_with(results: Vec<PhaseResult>, verdict: Option<Verdict>) -> WorkflowContext {
        let mut ctx = WorkflowContext::new(WorkflowConfig::new("docs", "Doc sync", ["sync"]));
        ctx.results = results;
        ctx.verdict = verdict;
        ctx
    }

    #[test]
    fn test_confidence_statements() {
        assert!(confidence_statement(Verdict::Pass, 0).contains("fully synchronized"));
        assert!(confidence_statement(Verdict::Pass, 2).contains("partially resolved"));
        let fail = confidence_statement(Verdict::Fail, 3);
        assert!(fail.contains("incomplete"));
        assert!(fail.contains('3'));
    }

    #[test]
    fn test_sync_summary_counts_numbers_and_arrays() {
        let results = vec![
            PhaseResult::success("sync").with_artifacts(json!({
                "syncResults": [
                    {"sectionsAdded": 2, "sectionsRemoved": ["Old API"], "diagramsUpdated": 1},
                    {"sectionsAdded": ["Install", "Usage"]}
                ]
            })),
            PhaseResult::success("sync").with_artifacts(json!({
                "syncResults": [{"diagramsUpdated": 3}]
            })),
            // Ignored: not a sync phase.
            PhaseResult::success("analyze").with_artifacts(json!({
                "syncResults": [{"sectionsAdded": 100}]
            })),
        ];
        let summary = SyncSummary::from_results(&results).unwrap();
        assert_eq!(
            summary,
            SyncSummary {
                sections_added: 4,
                sections_removed: 1,
                diagrams_updated: 4,
            }
        );
    }

    #[test]
    fn test_sync_summary_absent_without_artifacts() {
        let results = vec![PhaseResult::success("sync")];
        assert!(SyncSummary::from_results(&results).is_none());
    }

    #[test]
    fn test_build_aggregates_findings() {
        let results = vec![
            PhaseResult::failure("adversarial").with_findings(vec![
                Finding::new("a", "b", Severity::High),
                Finding::new("c", "d", Severity::Medium),
            ]),
            PhaseResult::success("adversarial")
                .with_findings(vec![Finding::new("e", "f", Severity::Low)]),
        ];
        let report = WorkflowReport::build(&ctx_with(results, Some(Verdict::Pass)));

        assert_eq!(
            report.summary.findings,
            FindingSummary {
                high: 1,
                medium: 1,
                low: 1
            }
        );
        assert_eq!(report.summary.findings.total(), 3);
        assert_eq!(report.verdict, Verdict::Pass);
        assert!(report.confidence.contains("partially resolved"));
        assert!(report.summary.sync.is_none());
        assert!(report.completed_at >= report.started_at);
    }

    #[test]
    fn test_missing_verdict_reported_as_fail() {
        let report = WorkflowReport::build(&ctx_with(Vec::new(), None));
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[test]
    fn test_markdown_rendering() {
        let results = vec![
            PhaseResult::success("sync").with_artifacts(json!({
                "syncResults": [{"sectionsAdded": 1}]
            })),
            PhaseResult::failure("adversarial")
                .with_findings(vec![Finding::new("Uses REST", "Uses gRPC", Severity::High)]),
        ];
        let md = WorkflowReport::build(&ctx_with(results, Some(Verdict::Fail))).to_markdown();

        assert!(md.starts_with("# Workflow report: Doc sync"));
        assert!(md.contains("**Verdict:** FAIL"));
        assert!(md.contains("| high | 1 |"));
        assert!(md.contains("Sections added: 1"));
        assert!(md.contains("`adversarial` FAILED"));
        assert!(md.contains("Uses REST: Uses gRPC"));
    }

    #[test]
    fn test_report_serialization() {
        let report = WorkflowReport::build(&ctx_with(Vec::new(), Some(Verdict::Pass)));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict"], "PASS");
        assert_eq!(json["summary"]["findings"]["high"], 0);
        assert!(json["summary"].get("sync").is_none());
    }
}
