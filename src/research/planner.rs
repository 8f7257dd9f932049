//! Query decomposition into a dependency-aware task graph.

use crate::llm::LLMClient;
use crate::research::outcome::{IssueKind, PipelineIssue};
use crate::research::task_graph::{Priority, TaskGraph, TaskId};
use serde::Deserialize;
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

const PLANNER_SYSTEM_PROMPT: &str = r#"You are a research planner. Break the research question into focused, independently researchable tasks.

Respond with JSON only, in this shape:
{
  "plan": "<short paragraph describing the research approach>",
  "tasks": [
    {"id": "t1", "description": "<what to find out>", "priority": "high|medium|low", "dependencies": []},
    {"id": "t2", "description": "<task that builds on t1>", "priority": "medium", "dependencies": ["t1"]}
  ]
}

Use dependencies only when a task genuinely needs another task's findings. Mark the tasks that are essential to answering the question as high priority."#;

/// Result of the planning phase
#[derive(Debug, Clone, Default)]
pub struct PlanOutput {
    pub plan: String,
    /// Created tasks, in plan order
    pub task_ids: Vec<TaskId>,
    pub issues: Vec<PipelineIssue>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    plan: String,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    dependencies: Vec<Value>,
}

pub struct Planner {
    llm: Arc<dyn LLMClient>,
    max_tasks: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LLMClient>, max_tasks: usize) -> Self {
        Self { llm, max_tasks }
    }

    /// Ask the engine for a plan and insert its tasks into `graph`.
    ///
    /// Never fails: an engine error or unusable answer yields an empty plan
    /// and a planning issue.
    pub async fn plan(&self, query: &str, graph: &mut TaskGraph) -> PlanOutput {
        let prompt = format!(
            "Research question: {}\n\nCreate at most {} tasks.",
            query, self.max_tasks
        );

        let response = match self
            .llm
            .generate_with_system(PLANNER_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Planning failed");
                return PlanOutput {
                    issues: vec![PipelineIssue::new(
                        IssueKind::Planning,
                        format!("Reasoning engine failed during planning: {}", e),
                    )],
                    ..PlanOutput::default()
                };
            }
        };

        match parse_plan(&response) {
            Some(raw) => self.build(raw, graph),
            None => {
                tracing::warn!("Planner returned no usable JSON plan");
                PlanOutput {
                    issues: vec![PipelineIssue::new(
                        IssueKind::Planning,
                        "Planner output could not be parsed as a JSON plan",
                    )],
                    ..PlanOutput::default()
                }
            }
        }
    }

    /// Create every task first, then wire dependencies so forward references resolve
    fn build(&self, raw: RawPlan, graph: &mut TaskGraph) -> PlanOutput {
        let mut output = PlanOutput::default();

        let total = raw.tasks.len();
        let tasks: Vec<RawTask> = raw
            .tasks
            .into_iter()
            .filter(|task| !task.description.trim().is_empty())
            .collect();
        if tasks.len() < total {
            output.issues.push(PipelineIssue::new(
                IssueKind::Planning,
                format!("Dropped {} planned task(s) without a description", total - tasks.len()),
            ));
        }
        if tasks.len() > self.max_tasks {
            output.issues.push(PipelineIssue::new(
                IssueKind::Planning,
                format!(
                    "Plan proposed {} tasks; keeping the first {}",
                    tasks.len(),
                    self.max_tasks
                ),
            ));
        }

        let mut local_ids: HashMap<String, TaskId> = HashMap::new();
        let mut created = Vec::new();
        for (position, task) in tasks.into_iter().take(self.max_tasks).enumerate() {
            let priority = task
                .priority
                .as_deref()
                .and_then(Priority::parse_loose)
                .unwrap_or_default();
            let id = graph.create_task(task.description.trim(), priority, vec![]);

            let local = task
                .id
                .as_ref()
                .map(reference)
                .unwrap_or_else(|| format!("t{}", position + 1));
            match local_ids.entry(local) {
                Entry::Vacant(slot) => {
                    slot.insert(id.clone());
                }
                Entry::Occupied(slot) => {
                    output.issues.push(PipelineIssue::for_task(
                        IssueKind::Planning,
                        id.clone(),
                        format!(
                            "Duplicate task reference '{}'; dependencies resolve to the first task using it",
                            slot.key()
                        ),
                    ));
                }
            }
            created.push((id, task.dependencies));
        }

        for (id, dependencies) in &created {
            for dep in dependencies {
                let local = reference(dep);
                let target = match local_ids.get(&local) {
                    Some(target) => target.clone(),
                    None => {
                        output.issues.push(PipelineIssue::for_task(
                            IssueKind::Planning,
                            id.clone(),
                            format!("Unknown dependency '{}'; task will stay blocked", local),
                        ));
                        TaskId::from(format!("unresolved:{}", local))
                    }
                };

                if let Err(e) = graph.add_dependency(id, target) {
                    output.issues.push(PipelineIssue::for_task(
                        IssueKind::Planning,
                        id.clone(),
                        format!("Dependency rejected: {}", e),
                    ));
                }
            }
        }

        if let Some(cycle) = graph.find_cycle() {
            tracing::error!(?cycle, "Task graph contains a dependency cycle");
            output.issues.push(PipelineIssue::new(
                IssueKind::Planning,
                format!(
                    "Dependency cycle left in the graph; its tasks will stay blocked: {}",
                    cycle
                        .iter()
                        .map(TaskId::as_str)
                        .collect::<Vec<_>>()
                        .join(" -> ")
                ),
            ));
        }

        output.task_ids = created.into_iter().map(|(id, _)| id).collect();
        output.plan = if raw.plan.trim().is_empty() {
            output
                .task_ids
                .iter()
                .filter_map(|id| graph.get(id))
                .enumerate()
                .map(|(i, task)| format!("{}. {}", i + 1, task.description))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            raw.plan.trim().to_string()
        };

        for issue in &output.issues {
            tracing::warn!(issue = %issue.message, "Planning issue");
        }
        tracing::info!(tasks = output.task_ids.len(), "Plan created");
        output
    }
}

/// Local task reference as written by the model (`"t1"`, `1`, ...)
fn reference(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Extract the JSON object from a model answer, tolerating code fences and prose
fn parse_plan(response: &str) -> Option<RawPlan> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}
