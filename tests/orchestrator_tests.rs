//! End-to-end pipeline tests: plan, supervise, synthesize, quality gate.

mod common;

use common::mocks::{plan_json, MockLLMClient, MockSearchTool, Role};
use dossier::research::synthesizer::NO_RESEARCH_DRAFT;
use dossier::research::{IssueKind, Phase, ResearchOrchestrator, TerminationReason};
use dossier::tools::ToolRegistry;
use dossier::utils::toml_config::{DossierConfig, QualityConfig};
use dossier::AppError;
use serde_json::json;
use std::sync::Arc;

const THREE_TASKS: &[(&str, &str, &[&str])] = &[
    ("t1", "high", &[]),
    ("t2", "medium", &[]),
    ("t3", "low", &["t1"]),
];

fn long_draft(chars: usize) -> String {
    let mut draft = String::from("## Introduction\n\n");
    while draft.chars().count() < chars {
        draft.push_str("Evidence-backed analysis of the findings. ");
    }
    draft
}

fn orchestrator(llm: Arc<MockLLMClient>, config: DossierConfig) -> ResearchOrchestrator {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockSearchTool::default()));
    ResearchOrchestrator::new(llm, Arc::new(tools), config)
}

#[tokio::test]
async fn test_revise_twice_then_pass() {
    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(THREE_TASKS))
            .with_draft(long_draft(1200))
            .with_verdicts(&[
                "VERDICT: REVISE\nFEEDBACK: Cite more sources.",
                "VERDICT: REVISE\nFEEDBACK: Strengthen the conclusion.",
                "VERDICT: PASS\nFEEDBACK: none",
            ]),
    );

    let outcome = orchestrator(llm.clone(), DossierConfig::default())
        .run("Outlook for sodium-ion batteries")
        .await
        .unwrap();

    assert_eq!(outcome.report.revision_count, 2);
    assert!(outcome.report.passes_quality);
    assert!(!outcome.report.max_revisions_exceeded);
    assert_eq!(llm.calls_for(Role::Reviewer).len(), 3);
    // Initial synthesis plus one per revision
    assert_eq!(llm.calls_for(Role::Editor).len(), 3);

    let editor_prompts = llm.calls_for(Role::Editor);
    assert!(editor_prompts[1].prompt.contains("Cite more sources."));
    assert!(editor_prompts[2].prompt.contains("Strengthen the conclusion."));
    assert!(outcome.issues.is_empty());
}

#[tokio::test]
async fn test_report_that_never_reaches_min_length_exhausts_budget() {
    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(THREE_TASKS))
            .with_draft("Too short."),
    );

    let outcome = orchestrator(llm.clone(), DossierConfig::default())
        .run("Outlook for sodium-ion batteries")
        .await
        .unwrap();

    let quality = QualityConfig::default();
    assert!(outcome.report.max_revisions_exceeded);
    assert!(!outcome.report.passes_quality);
    assert_eq!(outcome.report.revision_count, quality.max_revisions);
    // Tier 1 short-circuits, so the reviewer is never consulted
    assert!(llm.calls_for(Role::Reviewer).is_empty());

    let evaluations = outcome
        .phases
        .iter()
        .filter(|p| p.phase == Phase::QualityGate)
        .count();
    assert!(evaluations <= quality.max_revisions as usize + 1);
}

#[tokio::test]
async fn test_phase_trace_and_task_snapshot() {
    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(THREE_TASKS))
            .with_draft(long_draft(1100))
            .with_summary("Sodium-ion is maturing."),
    );

    let outcome = orchestrator(llm, DossierConfig::default())
        .run("Outlook for sodium-ion batteries")
        .await
        .unwrap();

    let phases: Vec<Phase> = outcome.phases.iter().map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::Plan, Phase::Supervise, Phase::Synthesize, Phase::QualityGate]
    );
    assert!(outcome.phases[1].detail.contains("0 pending (0 blocked)"));
    assert_eq!(outcome.plan, "Mock research plan.");
    assert_eq!(outcome.tasks.len(), 3);
    assert!(outcome.tasks.iter().all(|t| t.is_completed()));
    assert_eq!(outcome.supervision.len(), 1);
    assert_eq!(outcome.supervision[0].reason, TerminationReason::NoPendingTasks);
    assert_eq!(outcome.report.executive_summary, "Sodium-ion is maturing.");

    let markdown = outcome.to_markdown();
    assert!(markdown.starts_with("# Outlook for sodium-ion batteries"));
    assert!(markdown.contains("Sodium-ion is maturing."));

    let json: serde_json::Value = serde_json::from_str(&outcome.to_json().unwrap()).unwrap();
    assert_eq!(json["report"]["passes_quality"], true);
    assert_eq!(json["phases"][0]["phase"], "plan");
}

#[tokio::test]
async fn test_too_few_findings_resupervises_remaining_tasks() {
    let mut config = DossierConfig::default();
    config.research.concurrency = 1;
    config.research.max_iterations = Some(1);

    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(&[
                ("a", "high", &[]),
                ("b", "high", &[]),
                ("c", "high", &[]),
            ]))
            .with_draft(long_draft(1500)),
    );

    let outcome = orchestrator(llm.clone(), config)
        .run("Three-part question")
        .await
        .unwrap();

    // One task per session; the gate sends the pipeline back twice
    assert_eq!(outcome.supervision.len(), 3);
    assert!(outcome
        .supervision
        .iter()
        .all(|s| s.reason == TerminationReason::MaxIterations));
    assert!(outcome.tasks.iter().all(|t| t.is_completed()));
    assert_eq!(outcome.report.revision_count, 2);
    assert!(outcome.report.passes_quality);
}

#[tokio::test]
async fn test_supervise_phase_reports_blocked_tasks() {
    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(&[
                ("t1", "high", &[]),
                ("t2", "medium", &[]),
                ("t3", "low", &["t1"]),
                ("t4", "low", &["t9"]),
            ]))
            .with_draft(long_draft(1200)),
    );

    let outcome = orchestrator(llm, DossierConfig::default())
        .run("Question")
        .await
        .unwrap();

    let supervise = outcome
        .phases
        .iter()
        .find(|p| p.phase == Phase::Supervise)
        .unwrap();
    assert!(supervise.detail.contains("3 tasks completed (0 failed), 1 pending (1 blocked)"));
    assert_eq!(outcome.supervision[0].reason, TerminationReason::Stalled);
    assert_eq!(outcome.issues_of(IssueKind::Planning).count(), 1);
}

#[tokio::test]
async fn test_workers_use_tools_end_to_end() {
    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(&[("t1", "high", &[])]))
            .with_worker_tool("web_search", json!({"query": "sodium-ion"}))
            .with_draft(long_draft(1100)),
    );
    let mut config = DossierConfig::default();
    config.quality.min_findings_count = 1;

    let outcome = orchestrator(llm, config).run("Sodium-ion").await.unwrap();

    let findings = outcome.tasks[0].findings.clone().unwrap();
    assert!(findings.contains("Evidence:"));
    assert!(outcome.report.passes_quality);
}

#[tokio::test]
async fn test_planning_failure_yields_placeholder_report() {
    let llm = Arc::new(MockLLMClient::new().failing_role(Role::Planner));

    let outcome = orchestrator(llm.clone(), DossierConfig::default())
        .run("Anything at all")
        .await
        .unwrap();

    assert!(outcome.tasks.is_empty());
    assert_eq!(outcome.report.draft, NO_RESEARCH_DRAFT);
    assert_eq!(outcome.issues_of(IssueKind::Planning).count(), 1);
    assert!(llm.calls_for(Role::Editor).is_empty());
    assert!(llm.calls_for(Role::Worker).is_empty());
}

#[tokio::test]
async fn test_reviewer_failure_fails_open() {
    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(THREE_TASKS))
            .with_draft(long_draft(1200))
            .failing_role(Role::Reviewer),
    );

    let outcome = orchestrator(llm, DossierConfig::default())
        .run("Question")
        .await
        .unwrap();

    assert!(outcome.report.passes_quality);
    assert_eq!(outcome.report.revision_count, 0);
    assert_eq!(outcome.issues_of(IssueKind::QualityGate).count(), 1);
}

#[tokio::test]
async fn test_editor_failure_falls_back_to_merged_findings() {
    let llm = Arc::new(
        MockLLMClient::new()
            .with_plan(plan_json(THREE_TASKS))
            .failing_role(Role::Editor),
    );

    let outcome = orchestrator(llm, DossierConfig::default())
        .run("Question")
        .await
        .unwrap();

    assert!(outcome.report.draft.contains("### Task t1"));
    assert!(outcome.issues_of(IssueKind::Synthesis).count() >= 1);
    assert!(outcome.report.is_terminal());
}

#[tokio::test]
async fn test_engine_down_still_terminates() {
    let llm = Arc::new(MockLLMClient::failing());

    let outcome = orchestrator(llm, DossierConfig::default())
        .run("Question")
        .await
        .unwrap();

    assert!(outcome.report.is_terminal());
    assert!(!outcome.issues.is_empty());
}

#[tokio::test]
async fn test_empty_query_is_invalid_input() {
    let llm = Arc::new(MockLLMClient::new());
    let result = orchestrator(llm, DossierConfig::default()).run("").await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn test_plan_only_does_not_dispatch() {
    let llm = Arc::new(MockLLMClient::new().with_plan(plan_json(THREE_TASKS)));

    let plan = orchestrator(llm.clone(), DossierConfig::default())
        .plan("Question")
        .await
        .unwrap();

    assert_eq!(plan.graph.len(), 3);
    assert_eq!(plan.graph.get_ready_tasks().len(), 2);
    assert!(llm.calls_for(Role::Worker).is_empty());
}
