//! Task graph and dependency resolver
//!
//! The graph is an arena: it owns every [`Task`] and the rest of the engine
//! refers to tasks by [`TaskId`]. Readers get `&Task` or cloned snapshots;
//! every mutation goes through a `TaskGraph` method, which is what keeps the
//! status machine one-directional (pending → in_progress → completed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Prefix carried by findings of a task whose worker failed
pub const ERROR_TAG: &str = "[ERROR]";

/// Unique task identifier.
///
/// Any string is accepted so that dependencies on ids the graph has never
/// seen can still be represented (they stay unsatisfied forever).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh id
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("task-{}", &raw[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Lenient parse used for model output; unknown labels yield `None`
    pub fn parse_loose(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" | "critical" | "urgent" => Some(Priority::High),
            "medium" | "normal" | "moderate" => Some(Priority::Medium),
            "low" | "minor" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

/// A unit of research work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    /// Set only on completion
    pub findings: Option<String>,
    /// Completed with error-tagged findings
    #[serde(default)]
    pub failed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation order, used to break priority ties
    pub sequence: u64,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Task not found: {0}")]
    UnknownTask(TaskId),

    #[error("Task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("Dependency would create a cycle: {}", format_cycle(.0))]
    Cycle(Vec<TaskId>),
}

fn format_cycle(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Per-status tallies of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Tasks in creation order
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    next_sequence: u64,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending task with a fresh id
    pub fn create_task(
        &mut self,
        description: impl Into<String>,
        priority: Priority,
        dependencies: Vec<TaskId>,
    ) -> TaskId {
        let id = TaskId::generate();

        let mut seen = HashSet::new();
        let dependencies: Vec<TaskId> = dependencies
            .into_iter()
            .filter(|dep| seen.insert(dep.clone()))
            .collect();

        let task = Task {
            id: id.clone(),
            description: description.into(),
            priority,
            status: TaskStatus::Pending,
            dependencies,
            findings: None,
            failed: false,
            created_at: Utc::now(),
            completed_at: None,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        self.index.insert(id.clone(), self.tasks.len());
        self.tasks.push(task);
        id
    }

    /// Add an edge `id` depends on `dependency`.
    ///
    /// `dependency` may be unknown to the graph (the task then stays blocked),
    /// but an edge that would close a cycle is rejected.
    pub fn add_dependency(&mut self, id: &TaskId, dependency: TaskId) -> Result<(), GraphError> {
        if id == &dependency {
            return Err(GraphError::SelfDependency(id.clone()));
        }
        let position = *self
            .index
            .get(id)
            .ok_or_else(|| GraphError::UnknownTask(id.clone()))?;

        if let Some(mut path) = self.dependency_path(&dependency, id) {
            path.insert(0, id.clone());
            return Err(GraphError::Cycle(path));
        }

        let task = &mut self.tasks[position];
        if !task.dependencies.contains(&dependency) {
            task.dependencies.push(dependency);
        }
        Ok(())
    }

    /// Path `from -> ... -> to` following dependency edges, if one exists
    fn dependency_path(&self, from: &TaskId, to: &TaskId) -> Option<Vec<TaskId>> {
        let mut stack = vec![vec![from.clone()]];
        let mut visited = HashSet::new();

        while let Some(path) = stack.pop() {
            let current = path.last()?.clone();
            if &current == to {
                return Some(path);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(task) = self.get(&current) {
                for dep in &task.dependencies {
                    let mut next = path.clone();
                    next.push(dep.clone());
                    stack.push(next);
                }
            }
        }
        None
    }

    /// Report one dependency cycle among known tasks, if any
    pub fn find_cycle(&self) -> Option<Vec<TaskId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.tasks.len()];

        for start in 0..self.tasks.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // (task position, next dependency to inspect)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::Active;

            while let Some(top) = stack.last_mut() {
                let (position, next_dep) = *top;
                let deps = &self.tasks[position].dependencies;
                if next_dep >= deps.len() {
                    marks[position] = Mark::Done;
                    stack.pop();
                    continue;
                }
                top.1 += 1;
                let dep = &deps[next_dep];

                let Some(&dep_position) = self.index.get(dep) else {
                    continue;
                };
                match marks[dep_position] {
                    Mark::Unvisited => {
                        marks[dep_position] = Mark::Active;
                        stack.push((dep_position, 0));
                    }
                    Mark::Active => {
                        let from = stack
                            .iter()
                            .position(|(p, _)| *p == dep_position)
                            .unwrap_or(0);
                        let mut cycle: Vec<TaskId> = stack[from..]
                            .iter()
                            .map(|(p, _)| self.tasks[*p].id.clone())
                            .collect();
                        cycle.push(self.tasks[dep_position].id.clone());
                        return Some(cycle);
                    }
                    Mark::Done => {}
                }
            }
        }
        None
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&position| &self.tasks[position])
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// All tasks in creation order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// A dependency is satisfied only by a known, completed task
    fn is_satisfied(&self, dependency: &TaskId) -> bool {
        self.get(dependency).is_some_and(Task::is_completed)
    }

    fn is_ready(&self, task: &Task) -> bool {
        task.is_pending() && task.dependencies.iter().all(|dep| self.is_satisfied(dep))
    }

    /// Pending tasks whose dependencies are all completed, high priority
    /// first and creation order within a priority.
    pub fn get_ready_tasks(&self) -> Vec<Task> {
        let mut ready: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| self.is_ready(task))
            .cloned()
            .collect();
        ready.sort_by_key(|task| (task.priority.rank(), task.sequence));
        ready
    }

    /// Pending tasks with at least one unsatisfied dependency
    pub fn get_blocked_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| task.is_pending() && !self.is_ready(task))
            .cloned()
            .collect()
    }

    /// pending → in_progress. Returns `false` for unknown ids or any other state.
    pub fn mark_in_progress(&mut self, id: &TaskId) -> bool {
        match self.task_mut(id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::InProgress;
                true
            }
            _ => false,
        }
    }

    /// in_progress → completed with findings. Returns `false` for unknown ids
    /// or tasks that are not in progress.
    pub fn complete_task(&mut self, id: &TaskId, findings: impl Into<String>) -> bool {
        self.finish(id, findings.into(), false)
    }

    /// Complete a task with error-tagged findings
    pub fn fail_task(&mut self, id: &TaskId, error: &str) -> bool {
        let findings = if error.starts_with(ERROR_TAG) {
            error.to_string()
        } else {
            format!("{} {}", ERROR_TAG, error)
        };
        self.finish(id, findings, true)
    }

    fn finish(&mut self, id: &TaskId, findings: String, failed: bool) -> bool {
        match self.task_mut(id) {
            Some(task) if task.status == TaskStatus::InProgress => {
                task.status = TaskStatus::Completed;
                task.findings = Some(findings);
                task.failed = failed;
                task.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Remove a pending task. Tasks depending on it become permanently blocked.
    pub fn cancel_task(&mut self, id: &TaskId) -> bool {
        let Some(&position) = self.index.get(id) else {
            return false;
        };
        if !self.tasks[position].is_pending() {
            return false;
        }

        self.tasks.remove(position);
        self.index = self
            .tasks
            .iter()
            .enumerate()
            .map(|(position, task)| (task.id.clone(), position))
            .collect();
        true
    }

    fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        let position = *self.index.get(id)?;
        self.tasks.get_mut(position)
    }

    /// Completed tasks, high priority first and creation order within a priority
    pub fn completed_tasks(&self) -> Vec<Task> {
        let mut completed: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.is_completed())
            .cloned()
            .collect();
        completed.sort_by_key(|task| (task.priority.rank(), task.sequence));
        completed
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_pending()).count()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_completed()).count()
    }

    /// (completed, total) high-priority tasks
    pub fn high_priority_progress(&self) -> (usize, usize) {
        self.tasks
            .iter()
            .filter(|task| task.priority == Priority::High)
            .fold((0, 0), |(done, total), task| {
                (done + usize::from(task.is_completed()), total + 1)
            })
    }

    pub fn counts(&self) -> GraphCounts {
        let mut counts = GraphCounts::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => {
                    counts.pending += 1;
                    if !self.is_ready(task) {
                        counts.blocked += 1;
                    }
                }
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => {
                    counts.completed += 1;
                    if task.failed {
                        counts.failed += 1;
                    }
                }
            }
        }
        counts
    }

    /// Owned copy of every task, in creation order
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }
}
