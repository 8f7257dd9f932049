//! Pipeline annotations and the final research outcome.

use crate::research::supervisor::SupervisionSummary;
use crate::research::synthesizer::Report;
use crate::research::task_graph::{Task, TaskId, TaskStatus};
use crate::types::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Category of a non-fatal failure recorded during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Planning,
    ToolExecution,
    Delegation,
    Synthesis,
    QualityGate,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IssueKind::Planning => "planning failure",
            IssueKind::ToolExecution => "tool execution failure",
            IssueKind::Delegation => "delegation failure",
            IssueKind::Synthesis => "synthesis failure",
            IssueKind::QualityGate => "quality gate failure",
        };
        f.write_str(label)
    }
}

/// A recorded, non-fatal failure. The pipeline keeps going after each one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIssue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl PipelineIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            task_id: None,
        }
    }

    pub fn for_task(kind: IssueKind, task_id: TaskId, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            task_id: Some(task_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    Supervise,
    Synthesize,
    QualityGate,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Phase::Plan => "plan",
            Phase::Supervise => "supervise",
            Phase::Synthesize => "synthesize",
            Phase::QualityGate => "quality_gate",
        };
        f.write_str(label)
    }
}

/// One executed phase in the run trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub detail: String,
}

impl PhaseRecord {
    /// Close a phase that began at `started` (wall clock) / `timer` (monotonic)
    pub fn finish(
        phase: Phase,
        started: DateTime<Utc>,
        timer: Instant,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            started_at: started,
            duration_ms: timer.elapsed().as_millis() as u64,
            detail: detail.into(),
        }
    }
}

/// Everything a research run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub query: String,
    pub plan: String,
    pub report: Report,
    pub tasks: Vec<Task>,
    pub supervision: Vec<SupervisionSummary>,
    pub issues: Vec<PipelineIssue>,
    pub phases: Vec<PhaseRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ResearchOutcome {
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &PipelineIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    pub fn total_duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize outcome: {}", e)))
    }

    /// Render the report followed by an appendix with the run trace
    pub fn to_markdown(&self) -> String {
        let report = &self.report;
        let mut out = format!(
            "# {}\n\n## Executive Summary\n\n{}\n\n{}\n\n",
            self.query,
            report.executive_summary.trim(),
            report.draft.trim()
        );

        let quality = if report.passes_quality {
            "passed"
        } else if report.max_revisions_exceeded {
            "accepted after revision budget was exhausted"
        } else {
            "not passed"
        };
        out.push_str("---\n\n## Appendix: Research Trace\n\n");
        out.push_str(&format!(
            "- Quality: {} ({} revision{})\n- Duration: {} ms\n",
            quality,
            report.revision_count,
            if report.revision_count == 1 { "" } else { "s" },
            self.total_duration_ms()
        ));

        if !self.plan.trim().is_empty() {
            out.push_str(&format!("\n### Plan\n\n{}\n", self.plan.trim()));
        }

        if !self.tasks.is_empty() {
            let lines: Vec<String> = self
                .tasks
                .iter()
                .map(|task| {
                    let status = match (task.status, task.failed) {
                        (TaskStatus::Completed, true) => "failed",
                        (TaskStatus::Completed, false) => "completed",
                        (TaskStatus::InProgress, _) => "in progress",
                        (TaskStatus::Pending, _) => "not run",
                    };
                    format!(
                        "- [{}] {} ({}, {})",
                        if task.is_completed() { "x" } else { " " },
                        task.description,
                        task.priority,
                        status
                    )
                })
                .collect();
            out.push_str(&format!("\n### Tasks\n\n{}\n", lines.join("\n")));
        }

        if !self.phases.is_empty() {
            out.push_str("\n### Phases\n\n| Phase | Duration (ms) | Detail |\n|-------|---------------|--------|\n");
            for record in &self.phases {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    record.phase,
                    record.duration_ms,
                    record.detail.replace('|', "\\|")
                ));
            }
        }

        if !self.issues.is_empty() {
            let lines: Vec<String> = self
                .issues
                .iter()
                .map(|issue| match &issue.task_id {
                    Some(id) => format!("- **{}** ({}): {}", issue.kind, id, issue.message),
                    None => format!("- **{}**: {}", issue.kind, issue.message),
                })
                .collect();
            out.push_str(&format!("\n### Issues\n\n{}\n", lines.join("\n")));
        }

        out
    }
}
