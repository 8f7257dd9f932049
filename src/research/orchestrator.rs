//! Plan → Supervise → Synthesize → QualityGate pipeline.
//!
//! The orchestrator is a sequential state machine. Its only loop is the
//! revision edge out of the quality gate, which either rebuilds the report or
//! gathers more findings first. The gate's revision budget bounds that loop.

use crate::llm::LLMClient;
use crate::research::outcome::{Phase, PhaseRecord, PipelineIssue, ResearchOutcome};
use crate::research::planner::{PlanOutput, Planner};
use crate::research::quality_gate::{QualityGate, Route};
use crate::research::supervisor::{SupervisionSummary, Supervisor};
use crate::research::synthesizer::{Report, Synthesizer};
use crate::research::task_graph::TaskGraph;
use crate::research::worker::Worker;
use crate::tools::ToolRegistry;
use crate::types::{AppError, Result};
use crate::utils::toml_config::DossierConfig;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A plan without execution, as produced by [`ResearchOrchestrator::plan`]
#[derive(Debug, Clone)]
pub struct ResearchPlan {
    pub query: String,
    pub plan: String,
    pub graph: TaskGraph,
    pub issues: Vec<PipelineIssue>,
}

pub struct ResearchOrchestrator {
    llm: Arc<dyn LLMClient>,
    tools: Arc<ToolRegistry>,
    config: DossierConfig,
}

/// Accumulates the trace of one run
struct RunState {
    phases: Vec<PhaseRecord>,
    issues: Vec<PipelineIssue>,
    supervision: Vec<SupervisionSummary>,
}

impl RunState {
    fn record(&mut self, phase: Phase, started: chrono::DateTime<Utc>, timer: Instant, detail: String) {
        tracing::info!(phase = %phase, elapsed_ms = timer.elapsed().as_millis() as u64, "{}", detail);
        self.phases.push(PhaseRecord::finish(phase, started, timer, detail));
    }
}

impl ResearchOrchestrator {
    pub fn new(llm: Arc<dyn LLMClient>, tools: Arc<ToolRegistry>, config: DossierConfig) -> Self {
        Self { llm, tools, config }
    }

    pub fn config(&self) -> &DossierConfig {
        &self.config
    }

    fn planner(&self) -> Planner {
        Planner::new(self.llm.clone(), self.config.research.limits().max_tasks)
    }

    fn supervisor(&self) -> Supervisor {
        let limits = self.config.research.limits();
        let worker = Worker::new(
            self.llm.clone(),
            self.tools.clone(),
            limits.max_tool_calls,
            Duration::from_secs(self.config.tools.timeout_secs),
        );
        Supervisor::new(worker, self.config.research.concurrency, limits.max_iterations)
    }

    fn validate_query(query: &str) -> Result<&str> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Research query cannot be empty".to_string(),
            ));
        }
        Ok(query)
    }

    /// Run only the planning phase
    pub async fn plan(&self, query: &str) -> Result<ResearchPlan> {
        let query = Self::validate_query(query)?;
        let mut graph = TaskGraph::new();
        let PlanOutput { plan, issues, .. } = self.planner().plan(query, &mut graph).await;

        Ok(ResearchPlan {
            query: query.to_string(),
            plan,
            graph,
            issues,
        })
    }

    /// Run the full pipeline. Only an empty query is an error; every other
    /// failure is recorded in the outcome's issues.
    pub async fn run(&self, query: &str) -> Result<ResearchOutcome> {
        let query = Self::validate_query(query)?;
        let started_at = Utc::now();
        tracing::info!(
            query,
            depth = %self.config.research.depth,
            model = self.llm.model_name(),
            "Starting research"
        );

        let mut state = RunState {
            phases: Vec::new(),
            issues: Vec::new(),
            supervision: Vec::new(),
        };
        let mut graph = TaskGraph::new();

        // Plan
        let (phase_start, timer) = (Utc::now(), Instant::now());
        let planned = self.planner().plan(query, &mut graph).await;
        state.issues.extend(planned.issues);
        state.record(
            Phase::Plan,
            phase_start,
            timer,
            format!("{} tasks planned", planned.task_ids.len()),
        );
        let plan = planned.plan;

        let supervisor = self.supervisor();
        let synthesizer = Synthesizer::new(self.llm.clone(), self.config.research.outline.clone());
        let gate = QualityGate::new(self.llm.clone(), self.config.quality.clone());

        self.supervise(&supervisor, &mut graph, &mut state).await;
        let mut report = self
            .synthesize(&synthesizer, query, &plan, &graph, None, &mut state)
            .await;

        loop {
            let (phase_start, timer) = (Utc::now(), Instant::now());
            let can_dispatch = !graph.get_ready_tasks().is_empty();
            let evaluation = gate
                .evaluate(query, &mut report, graph.completed_count(), can_dispatch)
                .await;
            if let Some(issue) = evaluation.issue {
                state.issues.push(issue);
            }
            state.record(
                Phase::QualityGate,
                phase_start,
                timer,
                format!(
                    "tier {} {:?}, revisions {}",
                    evaluation.tier, evaluation.route, report.revision_count
                ),
            );

            match evaluation.route {
                Route::Done => break,
                Route::Resupervise => {
                    self.supervise(&supervisor, &mut graph, &mut state).await;
                }
                Route::Resynthesize => {}
            }

            let revised = self
                .synthesize(&synthesizer, query, &plan, &graph, Some(&report), &mut state)
                .await;
            report = revised;
        }

        tracing::info!(
            passes_quality = report.passes_quality,
            revisions = report.revision_count,
            issues = state.issues.len(),
            "Research finished"
        );

        Ok(ResearchOutcome {
            query: query.to_string(),
            plan,
            report,
            tasks: graph.snapshot(),
            supervision: state.supervision,
            issues: state.issues,
            phases: state.phases,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn supervise(&self, supervisor: &Supervisor, graph: &mut TaskGraph, state: &mut RunState) {
        let (phase_start, timer) = (Utc::now(), Instant::now());
        let (summary, issues) = supervisor.supervise(graph).await;
        state.issues.extend(issues);

        let counts = graph.counts();
        let detail = format!(
            "{} rounds, {} tasks completed ({} failed), {} pending ({} blocked), {}",
            summary.iterations,
            summary.completed.len(),
            summary.failed,
            counts.pending,
            counts.blocked,
            summary.reason
        );
        state.supervision.push(summary);
        state.record(Phase::Supervise, phase_start, timer, detail);
    }

    async fn synthesize(
        &self,
        synthesizer: &Synthesizer,
        query: &str,
        plan: &str,
        graph: &TaskGraph,
        previous: Option<&Report>,
        state: &mut RunState,
    ) -> Report {
        let (phase_start, timer) = (Utc::now(), Instant::now());
        let completed = graph.completed_tasks();
        let (report, issues) = synthesizer.synthesize(query, plan, &completed, previous).await;
        state.issues.extend(issues);
        state.record(
            Phase::Synthesize,
            phase_start,
            timer,
            format!(
                "{} chars from {} findings",
                report.draft.chars().count(),
                completed.len()
            ),
        );
        report
    }
}
