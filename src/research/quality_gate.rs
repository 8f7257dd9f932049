//! Two-tier report validation with a bounded revision budget.
//!
//! Tier 1 is a cheap structural check (draft length, number of completed
//! tasks). Tier 2 asks the reasoning engine to grade the draft against a
//! rubric. Every failed tier consumes one revision; once the budget is spent
//! the report is accepted as-is and flagged.

use crate::llm::LLMClient;
use crate::research::outcome::{IssueKind, PipelineIssue};
use crate::research::synthesizer::Report;
use crate::utils::toml_config::QualityConfig;
use std::sync::Arc;

const REVIEW_SYSTEM_PROMPT: &str = r#"You are a strict research reviewer. Grade the report against this rubric:
1. Completeness - does it answer the research question fully?
2. Evidence - are claims backed by the findings and attributed?
3. Structure - is it organised under clear sections?
4. Depth - does it go beyond surface-level statements?
5. Accuracy - is it free of contradictions and unsupported claims?

Answer in exactly this format:
VERDICT: PASS or REVISE
FEEDBACK: <specific changes required, or "none">"#;

const DEFAULT_REVISE_FEEDBACK: &str = "Reviewer requested a revision without specific feedback.";

/// Next step after an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The report is terminal
    Done,
    /// Rebuild the report from the same findings, addressing the feedback
    Resynthesize,
    /// Gather more findings first, then rebuild the report
    Resupervise,
}

/// Parsed tier-2 answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub feedback: Option<String>,
}

impl Verdict {
    /// Parse `VERDICT:` / `FEEDBACK:` lines. Only PASS passes; an empty
    /// verdict label takes its value from the next non-empty line. Without
    /// any verdict label the answer passes only if it says PASS and never
    /// REVISE.
    pub fn parse(response: &str) -> Self {
        let mut verdict_seen = false;
        let mut verdict: Option<&str> = None;
        let mut feedback_lines: Vec<&str> = Vec::new();
        let mut in_feedback = false;

        for line in response.lines() {
            let trimmed = line.trim();
            if let Some(rest) = strip_label(trimmed, "VERDICT:") {
                verdict_seen = true;
                in_feedback = false;
                if !rest.is_empty() {
                    verdict = Some(rest);
                }
            } else if let Some(rest) = strip_label(trimmed, "FEEDBACK:") {
                in_feedback = true;
                if !rest.is_empty() {
                    feedback_lines.push(rest);
                }
            } else if in_feedback {
                feedback_lines.push(trimmed);
            } else if verdict_seen && verdict.is_none() && !trimmed.is_empty() {
                verdict = Some(trimmed);
            }
        }

        let passed = if verdict_seen {
            verdict.is_some_and(is_pass)
        } else {
            let upper = response.to_uppercase();
            upper.contains("PASS") && !upper.contains("REVISE")
        };

        let feedback = feedback_lines.join("\n").trim().to_string();
        let feedback = if feedback.is_empty() || feedback.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(feedback)
        };

        Self { passed, feedback }
    }
}

/// First word of a verdict value, ignoring emphasis and punctuation
fn is_pass(value: &str) -> bool {
    value
        .split_whitespace()
        .next()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .is_some_and(|word| word.eq_ignore_ascii_case("PASS"))
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim_start_matches(['*', '#', ' ']);
    let prefix = line.get(..label.len())?;
    if prefix.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim().trim_start_matches('*').trim())
    } else {
        None
    }
}

/// Result of one gate evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub route: Route,
    pub tier1_passed: bool,
    /// Which tier produced the decision
    pub tier: u8,
    pub issue: Option<PipelineIssue>,
}

pub struct QualityGate {
    llm: Arc<dyn LLMClient>,
    config: QualityConfig,
}

impl QualityGate {
    pub fn new(llm: Arc<dyn LLMClient>, config: QualityConfig) -> Self {
        Self { llm, config }
    }

    /// Evaluate and annotate `report`. `completed_count` is the number of
    /// completed tasks backing it; `can_dispatch` tells whether the graph
    /// still has ready tasks.
    pub async fn evaluate(
        &self,
        query: &str,
        report: &mut Report,
        completed_count: usize,
        can_dispatch: bool,
    ) -> Evaluation {
        report.revision_feedback = None;

        let length = report.draft.chars().count();
        let too_short = length < self.config.min_report_length;
        let too_few = completed_count < self.config.min_findings_count;

        if too_short || too_few {
            let mut problems = Vec::new();
            if too_short {
                problems.push(format!(
                    "The report is {} characters long; at least {} are required. Expand the analysis with more detail and evidence.",
                    length, self.config.min_report_length
                ));
            }
            if too_few {
                problems.push(format!(
                    "Only {} research tasks back the report; at least {} are required.",
                    completed_count, self.config.min_findings_count
                ));
            }
            tracing::info!(length, completed_count, "Tier 1 quality check failed");

            let route = if too_few && can_dispatch {
                Route::Resupervise
            } else {
                Route::Resynthesize
            };
            return Evaluation {
                route: self.reject(report, problems.join(" "), route),
                tier1_passed: false,
                tier: 1,
                issue: None,
            };
        }

        let prompt = format!(
            "Research question: {}\n\nReport:\n{}\n\nExecutive summary:\n{}",
            query, report.draft, report.executive_summary
        );

        match self.llm.generate_with_system(REVIEW_SYSTEM_PROMPT, &prompt).await {
            Ok(response) => {
                let verdict = Verdict::parse(&response);
                tracing::info!(passed = verdict.passed, "Tier 2 review");
                let route = if verdict.passed {
                    report.passes_quality = true;
                    Route::Done
                } else {
                    let feedback = verdict
                        .feedback
                        .unwrap_or_else(|| DEFAULT_REVISE_FEEDBACK.to_string());
                    self.reject(report, feedback, Route::Resynthesize)
                };
                Evaluation {
                    route,
                    tier1_passed: true,
                    tier: 2,
                    issue: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Quality review failed; accepting report");
                report.passes_quality = true;
                Evaluation {
                    route: Route::Done,
                    tier1_passed: true,
                    tier: 2,
                    issue: Some(PipelineIssue::new(
                        IssueKind::QualityGate,
                        format!("Quality review failed, report accepted unreviewed: {}", e),
                    )),
                }
            }
        }
    }

    /// Record a failed tier. Force-accepts once the revision budget is spent.
    fn reject(&self, report: &mut Report, feedback: String, route: Route) -> Route {
        let exhausted = report.revision_count >= self.config.max_revisions.saturating_sub(1);
        report.revision_count += 1;
        report.revision_feedback = Some(feedback);

        if exhausted {
            tracing::warn!(
                revisions = report.revision_count,
                "Revision budget exhausted; accepting report"
            );
            report.max_revisions_exceeded = true;
            report.passes_quality = false;
            Route::Done
        } else {
            route
        }
    }
}
