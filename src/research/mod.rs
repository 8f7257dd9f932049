//! Research Task Orchestration
//!
//! This module turns a research question into a quality-gated report.
//!
//! # Architecture
//!
//! - [`task_graph::TaskGraph`] - Owns every task; dependency resolution and readiness
//! - [`planner::Planner`] - Decomposes the query into tasks
//! - [`worker::Worker`] - Executes one task through a bounded tool-call loop
//! - [`supervisor::Supervisor`] - Dispatches ready tasks in rounds of at most K workers
//! - [`synthesizer::Synthesizer`] - Merges findings into a draft and executive summary
//! - [`quality_gate::QualityGate`] - Validates the report with a capped revision budget
//! - [`orchestrator::ResearchOrchestrator`] - Sequences the phases and records the trace
//!
//! # Usage
//!
//! ```ignore
//! use dossier::research::ResearchOrchestrator;
//!
//! let orchestrator = ResearchOrchestrator::new(llm, tools, config);
//! let outcome = orchestrator
//!     .run("What are the latest developments in quantum computing?")
//!     .await?;
//!
//! println!("{}", outcome.to_markdown());
//! ```
//!
//! # Research Workflow
//!
//! 1. **Plan** - Break the query into prioritised, dependency-aware tasks
//! 2. **Supervise** - Dispatch ready tasks to workers until a termination rule fires
//! 3. **Synthesize** - Combine completed findings under the report outline
//! 4. **Quality Gate** - Accept, re-synthesize, or gather more findings

pub mod orchestrator;
pub mod outcome;
pub mod planner;
pub mod quality_gate;
pub mod supervisor;
pub mod synthesizer;
pub mod task_graph;
pub mod worker;

pub use orchestrator::{ResearchOrchestrator, ResearchPlan};
pub use outcome::{IssueKind, Phase, PhaseRecord, PipelineIssue, ResearchOutcome};
pub use quality_gate::{QualityGate, Route, Verdict};
pub use supervisor::{SupervisionSummary, Supervisor, TerminationReason};
pub use synthesizer::{Report, Synthesizer};
pub use task_graph::{GraphError, Priority, Task, TaskGraph, TaskId, TaskStatus};
pub use worker::{Worker, WorkerFinish, WorkerReport};
