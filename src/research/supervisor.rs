//! Round-based dispatch loop over the task graph.
//!
//! Each round selects up to K ready tasks, marks them in progress, runs one
//! [`Worker`] per task concurrently and waits for all of them before merging
//! results back into the graph. The supervisor is the graph's only writer
//! while a session runs; workers only see task snapshots.

use crate::research::outcome::{IssueKind, PipelineIssue};
use crate::research::task_graph::{Task, TaskGraph, TaskId};
use crate::research::worker::{excerpt, Worker, WorkerReport};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

/// Fraction of high-priority tasks that must be complete for early exit
const HIGH_PRIORITY_COVERAGE: f64 = 0.8;
/// Completed tasks required before coverage can end a session
const MIN_COMPLETED_FOR_COVERAGE: usize = 10;
/// Characters of a dependency's findings handed to a dependent task
const DEPENDENCY_CONTEXT_CHARS: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Round cap reached
    MaxIterations,
    /// Enough high-priority work is done
    HighPriorityCoverage,
    /// Nothing left to dispatch
    NoPendingTasks,
    /// Pending tasks remain but every one of them is blocked
    Stalled,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TerminationReason::MaxIterations => "iteration cap reached",
            TerminationReason::HighPriorityCoverage => "high-priority coverage reached",
            TerminationReason::NoPendingTasks => "no pending tasks",
            TerminationReason::Stalled => "remaining tasks are blocked",
        };
        f.write_str(label)
    }
}

/// Snapshot of a finished supervision session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisionSummary {
    pub iterations: usize,
    /// Tasks dispatched in each round
    pub round_sizes: Vec<usize>,
    /// Tasks completed during this session, in merge order
    pub completed: Vec<TaskId>,
    pub failed: usize,
    pub reason: TerminationReason,
}

/// Mutable state of one session
#[derive(Debug, Default)]
struct SupervisionSession {
    iteration_count: usize,
    round_sizes: Vec<usize>,
    completed: Vec<TaskId>,
    failed: usize,
    issues: Vec<PipelineIssue>,
}

impl SupervisionSession {
    fn into_summary(self, reason: TerminationReason) -> (SupervisionSummary, Vec<PipelineIssue>) {
        (
            SupervisionSummary {
                iterations: self.iteration_count,
                round_sizes: self.round_sizes,
                completed: self.completed,
                failed: self.failed,
                reason,
            },
            self.issues,
        )
    }
}

pub struct Supervisor {
    worker: Worker,
    concurrency: usize,
    max_iterations: usize,
}

impl Supervisor {
    pub fn new(worker: Worker, concurrency: usize, max_iterations: usize) -> Self {
        Self {
            worker,
            concurrency: concurrency.max(1),
            max_iterations,
        }
    }

    /// Run rounds until a termination rule fires
    pub async fn supervise(
        &self,
        graph: &mut TaskGraph,
    ) -> (SupervisionSummary, Vec<PipelineIssue>) {
        let mut session = SupervisionSession::default();

        loop {
            if let Some(reason) = self.should_terminate(graph, &session) {
                tracing::info!(
                    iterations = session.iteration_count,
                    completed = session.completed.len(),
                    reason = %reason,
                    "Supervision finished"
                );
                return session.into_summary(reason);
            }

            session.iteration_count += 1;
            self.run_round(graph, &mut session).await;
        }
    }

    /// Termination policy, first match wins
    fn should_terminate(
        &self,
        graph: &TaskGraph,
        session: &SupervisionSession,
    ) -> Option<TerminationReason> {
        if session.iteration_count >= self.max_iterations {
            return Some(TerminationReason::MaxIterations);
        }

        let (high_done, high_total) = graph.high_priority_progress();
        if high_total > 0
            && graph.completed_count() >= MIN_COMPLETED_FOR_COVERAGE
            && high_done as f64 / high_total as f64 >= HIGH_PRIORITY_COVERAGE
        {
            return Some(TerminationReason::HighPriorityCoverage);
        }

        if session.iteration_count > 0 {
            if graph.pending_count() == 0 {
                return Some(TerminationReason::NoPendingTasks);
            }
            if graph.get_ready_tasks().is_empty() {
                return Some(TerminationReason::Stalled);
            }
        }

        None
    }

    async fn run_round(&self, graph: &mut TaskGraph, session: &mut SupervisionSession) {
        let selected: Vec<Task> = graph
            .get_ready_tasks()
            .into_iter()
            .take(self.concurrency)
            .collect();

        let mut dispatched = Vec::with_capacity(selected.len());
        for task in selected {
            if graph.mark_in_progress(&task.id) {
                let context = dependency_context(graph, &task);
                dispatched.push((task, context));
            } else {
                let issue = PipelineIssue::for_task(
                    IssueKind::Delegation,
                    task.id.clone(),
                    "Task could not be dispatched; slot skipped",
                );
                tracing::warn!(task_id = %task.id, "Delegation failed");
                session.issues.push(issue);
            }
        }

        tracing::info!(
            round = session.iteration_count,
            dispatched = dispatched.len(),
            pending = graph.pending_count(),
            "Dispatching round"
        );
        session.round_sizes.push(dispatched.len());

        let reports: Vec<WorkerReport> = join_all(
            dispatched
                .iter()
                .map(|(task, context)| self.worker.execute(task, context)),
        )
        .await;

        for report in reports {
            self.merge(graph, session, report);
        }
    }

    fn merge(&self, graph: &mut TaskGraph, session: &mut SupervisionSession, report: WorkerReport) {
        let merged = if report.failed {
            session.issues.push(PipelineIssue::for_task(
                IssueKind::ToolExecution,
                report.task_id.clone(),
                report.findings.clone(),
            ));
            tracing::warn!(task_id = %report.task_id, findings = %report.findings, "Task degraded");
            graph.fail_task(&report.task_id, &report.findings)
        } else {
            graph.complete_task(&report.task_id, report.findings)
        };

        if merged {
            if report.failed {
                session.failed += 1;
            }
            session.completed.push(report.task_id);
        } else {
            tracing::warn!(task_id = %report.task_id, "Worker result could not be merged");
            session.issues.push(PipelineIssue::for_task(
                IssueKind::Delegation,
                report.task_id,
                "Worker result arrived for a task that is no longer in progress",
            ));
        }
    }
}

/// Findings of a task's completed dependencies, one entry per dependency
fn dependency_context(graph: &TaskGraph, task: &Task) -> String {
    task.dependencies
        .iter()
        .filter_map(|id| graph.get(id))
        .filter_map(|dep| {
            dep.findings.as_ref().map(|findings| {
                format!(
                    "- {}: {}",
                    dep.description,
                    excerpt(findings, DEPENDENCY_CONTEXT_CHARS)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ConversationMessage, LLMClient, LLMResponse};
    use crate::research::task_graph::Priority;
    use crate::tools::ToolRegistry;
    use crate::types::{Result, ToolDefinition};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers every task immediately, echoing the task line
    #[derive(Default)]
    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMClient for Echo {
        async fn complete(
            &self,
            messages: &[ConversationMessage],
            _tools: &[ToolDefinition],
        ) -> Result<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(LLMResponse::text(format!("Findings for: {}", prompt)))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn supervisor(llm: Arc<dyn LLMClient>, k: usize, max_iterations: usize) -> Supervisor {
        let worker = Worker::new(
            llm,
            Arc::new(ToolRegistry::new()),
            4,
            Duration::from_secs(1),
        );
        Supervisor::new(worker, k, max_iterations)
    }

    #[tokio::test]
    async fn test_five_high_tasks_run_in_rounds_of_three_then_two() {
        let mut graph = TaskGraph::new();
        for i in 0..5 {
            graph.create_task(format!("task {}", i), Priority::High, vec![]);
        }

        let (summary, issues) = supervisor(Arc::new(Echo::default()), 3, 30)
            .supervise(&mut graph)
            .await;

        assert_eq!(summary.round_sizes, vec![3, 2]);
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.reason, TerminationReason::NoPendingTasks);
        assert_eq!(summary.completed.len(), 5);
        assert!(issues.is_empty());
        assert!(graph.tasks().all(|t| t.is_completed() && t.findings.is_some()));
    }

    #[tokio::test]
    async fn test_dependencies_are_dispatched_after_prerequisites() {
        let mut graph = TaskGraph::new();
        let base = graph.create_task("base", Priority::Low, vec![]);
        let next = graph.create_task("next", Priority::High, vec![base.clone()]);

        let (summary, _) = supervisor(Arc::new(Echo::default()), 3, 30)
            .supervise(&mut graph)
            .await;

        assert_eq!(summary.completed, vec![base, next.clone()]);
        assert_eq!(summary.round_sizes, vec![1, 1]);
        // The dependent task saw its prerequisite's findings
        let findings = graph.get(&next).unwrap().findings.clone().unwrap();
        assert!(findings.contains("Findings from prerequisite tasks"));
    }

    #[tokio::test]
    async fn test_unknown_dependency_stalls_without_blocking_others() {
        let mut graph = TaskGraph::new();
        let blocked = graph.create_task("blocked", Priority::High, vec![TaskId::from("ghost")]);
        let free = graph.create_task("free", Priority::Low, vec![]);

        let (summary, _) = supervisor(Arc::new(Echo::default()), 3, 30)
            .supervise(&mut graph)
            .await;

        assert_eq!(summary.completed, vec![free]);
        assert_eq!(summary.reason, TerminationReason::Stalled);
        assert!(graph.get(&blocked).unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let mut graph = TaskGraph::new();
        for i in 0..4 {
            graph.create_task(format!("task {}", i), Priority::Medium, vec![]);
        }

        let (summary, _) = supervisor(Arc::new(Echo::default()), 1, 2)
            .supervise(&mut graph)
            .await;

        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.reason, TerminationReason::MaxIterations);
        assert_eq!(graph.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_high_priority_coverage_ends_session_early() {
        let mut graph = TaskGraph::new();
        for i in 0..10 {
            graph.create_task(format!("high {}", i), Priority::High, vec![]);
        }
        for i in 0..5 {
            graph.create_task(format!("low {}", i), Priority::Low, vec![]);
        }

        let (summary, _) = supervisor(Arc::new(Echo::default()), 5, 30)
            .supervise(&mut graph)
            .await;

        assert_eq!(summary.reason, TerminationReason::HighPriorityCoverage);
        assert_eq!(summary.iterations, 2);
        assert_eq!(graph.pending_count(), 5);
    }

    #[tokio::test]
    async fn test_empty_graph_runs_one_empty_round() {
        let mut graph = TaskGraph::new();
        let llm = Arc::new(Echo::default());

        let (summary, _) = supervisor(llm.clone(), 3, 30).supervise(&mut graph).await;

        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.round_sizes, vec![0]);
        assert_eq!(summary.reason, TerminationReason::NoPendingTasks);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }
}
