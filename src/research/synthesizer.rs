//! Merges completed-task findings into a report draft and executive summary.

use crate::llm::LLMClient;
use crate::research::outcome::{IssueKind, PipelineIssue};
use crate::research::task_graph::Task;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NO_RESEARCH_DRAFT: &str = "No research completed. No task produced findings, \
either because planning yielded no executable tasks or because every task remained blocked.";

pub const NO_RESEARCH_SUMMARY: &str = "No research completed.";

const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are a senior research editor. Merge the findings of several research tasks into one coherent, well-structured report in Markdown.

Rules:
- Use the given section headings, in order, as level-2 headings (## Heading).
- Support claims with the evidence in the findings and keep source attributions.
- Reconcile overlapping findings and call out contradictions.
- Findings marked as failed are unreliable; mention the gap instead of inventing content.
- Do not add a title or an executive summary."#;

const SUMMARY_SYSTEM_PROMPT: &str = "You write executive summaries. Summarize the report \
in one short paragraph (at most 120 words) for a busy decision maker. Plain prose, no headings.";

/// Report under construction. Replaced on every re-synthesis; the revision
/// counter carries over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub draft: String,
    pub executive_summary: String,
    pub revision_count: u32,
    pub passes_quality: bool,
    pub revision_feedback: Option<String>,
    pub max_revisions_exceeded: bool,
}

impl Report {
    /// No further revision will be attempted
    pub fn is_terminal(&self) -> bool {
        self.passes_quality || self.max_revisions_exceeded
    }
}

pub struct Synthesizer {
    llm: Arc<dyn LLMClient>,
    outline: Vec<String>,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LLMClient>, outline: Vec<String>) -> Self {
        Self { llm, outline }
    }

    /// Build a fresh report. `previous` supplies the revision counter and the
    /// reviewer feedback to address.
    pub async fn synthesize(
        &self,
        query: &str,
        plan: &str,
        completed: &[Task],
        previous: Option<&Report>,
    ) -> (Report, Vec<PipelineIssue>) {
        let mut report = Report {
            revision_count: previous.map(|r| r.revision_count).unwrap_or(0),
            ..Report::default()
        };
        let mut issues = Vec::new();

        if completed.is_empty() {
            tracing::info!("No completed tasks; emitting placeholder report");
            report.draft = NO_RESEARCH_DRAFT.to_string();
            report.executive_summary = NO_RESEARCH_SUMMARY.to_string();
            return (report, issues);
        }

        let feedback = previous.and_then(|r| r.revision_feedback.as_deref());
        let prompt = self.draft_prompt(query, plan, completed, feedback);

        report.draft = match self
            .llm
            .generate_with_system(SYNTHESIS_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(draft) if !draft.trim().is_empty() => draft,
            Ok(_) => {
                issues.push(PipelineIssue::new(
                    IssueKind::Synthesis,
                    "Reasoning engine returned an empty draft; using merged findings",
                ));
                self.fallback_draft(query, plan, completed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Draft synthesis failed; using merged findings");
                issues.push(PipelineIssue::new(
                    IssueKind::Synthesis,
                    format!("Draft synthesis failed: {}", e),
                ));
                self.fallback_draft(query, plan, completed)
            }
        };

        let summary_prompt = format!("Research question: {}\n\nReport:\n{}", query, report.draft);
        report.executive_summary = match self
            .llm
            .generate_with_system(SUMMARY_SYSTEM_PROMPT, &summary_prompt)
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => fallback_summary(completed),
            Err(e) => {
                tracing::warn!(error = %e, "Executive summary failed");
                issues.push(PipelineIssue::new(
                    IssueKind::Synthesis,
                    format!("Executive summary failed: {}", e),
                ));
                fallback_summary(completed)
            }
        };

        tracing::info!(
            chars = report.draft.chars().count(),
            findings = completed.len(),
            revision = report.revision_count,
            "Synthesized report"
        );
        (report, issues)
    }

    fn draft_prompt(
        &self,
        query: &str,
        plan: &str,
        completed: &[Task],
        feedback: Option<&str>,
    ) -> String {
        let mut sections = vec![format!("Research question: {}", query)];
        if !plan.trim().is_empty() {
            sections.push(format!("Research plan:\n{}", plan.trim()));
        }

        let headings: Vec<String> = self.outline.iter().map(|h| format!("- {}", h)).collect();
        sections.push(format!("Section headings:\n{}", headings.join("\n")));

        let findings: Vec<String> = completed
            .iter()
            .enumerate()
            .map(|(i, task)| {
                format!(
                    "### Task {} ({} priority{}): {}\n{}",
                    i + 1,
                    task.priority,
                    if task.failed { ", failed" } else { "" },
                    task.description,
                    task.findings.as_deref().unwrap_or("")
                )
            })
            .collect();
        sections.push(format!("Findings:\n\n{}", findings.join("\n\n")));

        if let Some(feedback) = feedback {
            sections.push(format!(
                "A reviewer rejected the previous draft. Address this feedback:\n{}",
                feedback
            ));
        }
        sections.join("\n\n")
    }

    /// Findings laid out under the outline without any engine call
    fn fallback_draft(&self, query: &str, plan: &str, completed: &[Task]) -> String {
        let mut headings = self.outline.iter().map(String::as_str);

        let intro = headings.next().unwrap_or("Introduction");
        let mut draft = format!("## {}\n\nThis report addresses: {}\n\n", intro, query);
        if !plan.trim().is_empty() {
            draft.push_str(plan.trim());
            draft.push_str("\n\n");
        }

        let findings_heading = headings.next().unwrap_or("Findings");
        draft.push_str(&format!("## {}\n\n", findings_heading));
        for task in completed {
            draft.push_str(&format!(
                "### {}\n\n{}\n\n",
                task.description,
                task.findings.as_deref().unwrap_or("").trim()
            ));
        }

        for heading in headings {
            draft.push_str(&format!(
                "## {}\n\nNot synthesized: the reasoning engine was unavailable.\n\n",
                heading
            ));
        }
        draft
    }
}

fn fallback_summary(completed: &[Task]) -> String {
    let failed = completed.iter().filter(|t| t.failed).count();
    let areas: Vec<&str> = completed
        .iter()
        .filter(|t| !t.failed)
        .take(3)
        .map(|t| t.description.as_str())
        .collect();

    let mut summary = format!(
        "{} research task{} completed ({} with errors).",
        completed.len(),
        if completed.len() == 1 { "" } else { "s" },
        failed
    );
    if !areas.is_empty() {
        summary.push_str(&format!(" Covered: {}.", areas.join("; ")));
    }
    summary
}
