//! Mock implementations for testing.
//!
//! [`MockLLMClient`] answers like a well-behaved model for each pipeline role
//! (planner, worker, editor, summarizer, reviewer), picking the role from the
//! system prompt of the request. Every behaviour is scripted through builder
//! methods so tests stay deterministic even with concurrent workers.

use async_trait::async_trait;
use dossier::llm::{ConversationMessage, LLMClient, LLMResponse, MessageRole};
use dossier::tools::{Tool, ToolError};
use dossier::types::{AppError, Result, ToolCall, ToolDefinition};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Pipeline role inferred from the request's system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Planner,
    Worker,
    Editor,
    Summarizer,
    Reviewer,
}

impl Role {
    fn detect(messages: &[ConversationMessage]) -> Role {
        let system = messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();

        if system.contains("research planner") {
            Role::Planner
        } else if system.contains("research analyst") {
            Role::Worker
        } else if system.contains("research editor") {
            Role::Editor
        } else if system.contains("executive summar") {
            Role::Summarizer
        } else {
            Role::Reviewer
        }
    }
}

/// One request seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub role: Role,
    pub prompt: String,
}

/// Role-aware scripted LLM client.
///
/// # Examples
///
/// ```ignore
/// let llm = MockLLMClient::new()
///     .with_plan(plan_json(&[("t1", "high", &[])]))
///     .with_draft(&"x".repeat(1200))
///     .with_verdicts(&["VERDICT: REVISE\nFEEDBACK: more", "VERDICT: PASS"]);
/// ```
pub struct MockLLMClient {
    plan: String,
    draft: String,
    summary: String,
    verdicts: Mutex<VecDeque<String>>,
    worker_tool: Option<(String, Value)>,
    worker_delay: Option<Duration>,
    failing_roles: HashSet<Role>,
    failing_tasks: HashSet<String>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self {
            plan: plan_json(&[]),
            draft: "## Introduction\n\nMock draft.".to_string(),
            summary: "Mock executive summary.".to_string(),
            verdicts: Mutex::new(VecDeque::new()),
            worker_tool: None,
            worker_delay: None,
            failing_roles: HashSet::new(),
            failing_tasks: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A client whose every call fails
    pub fn failing() -> Self {
        let mut client = Self::new();
        client.failing_roles = [
            Role::Planner,
            Role::Worker,
            Role::Editor,
            Role::Summarizer,
            Role::Reviewer,
        ]
        .into_iter()
        .collect();
        client
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = plan.into();
        self
    }

    pub fn with_draft(mut self, draft: impl Into<String>) -> Self {
        self.draft = draft.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Reviewer answers, in order; PASS once exhausted
    pub fn with_verdicts(self, verdicts: &[&str]) -> Self {
        *self.verdicts.lock().unwrap() = verdicts.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Workers request this tool once before answering
    pub fn with_worker_tool(mut self, name: &str, arguments: Value) -> Self {
        self.worker_tool = Some((name.to_string(), arguments));
        self
    }

    /// Workers take this long per call (for concurrency checks)
    pub fn with_worker_delay(mut self, delay: Duration) -> Self {
        self.worker_delay = Some(delay);
        self
    }

    pub fn failing_role(mut self, role: Role) -> Self {
        self.failing_roles.insert(role);
        self
    }

    /// Worker calls for a task whose description contains `needle` fail
    pub fn failing_task(mut self, needle: &str) -> Self {
        self.failing_tasks.insert(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, role: Role) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.role == role).collect()
    }

    /// Highest number of concurrent worker calls observed
    pub fn max_concurrent_workers(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn worker_turn(&self, messages: &[ConversationMessage]) -> Result<LLMResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.worker_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let task_prompt = messages
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let header = task_prompt.lines().next().unwrap_or("");
        if self.failing_tasks.iter().any(|n| header.contains(n.as_str())) {
            return Err(AppError::LLM("Mock worker failure".to_string()));
        }

        let tool_results: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .map(|m| m.content.as_str())
            .collect();

        if let Some((name, arguments)) = &self.worker_tool {
            if tool_results.is_empty() {
                return Ok(LLMResponse::with_tool_calls(
                    "",
                    vec![ToolCall {
                        id: format!("call-{}", messages.len()),
                        name: name.clone(),
                        arguments: arguments.clone(),
                    }],
                ));
            }
        }

        let description = header
            .split("): ")
            .nth(1)
            .unwrap_or("task")
            .to_string();
        let mut findings = format!("Findings for {}.", description);
        for result in tool_results {
            findings.push_str(&format!(" Evidence: {}", result));
        }
        Ok(LLMResponse::text(findings))
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        _tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let role = Role::detect(messages);
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push(RecordedCall { role, prompt });

        if self.failing_roles.contains(&role) {
            return Err(AppError::LLM(format!("Mock {:?} failure", role)));
        }

        match role {
            Role::Planner => Ok(LLMResponse::text(self.plan.clone())),
            Role::Worker => self.worker_turn(messages).await,
            Role::Editor => Ok(LLMResponse::text(self.draft.clone())),
            Role::Summarizer => Ok(LLMResponse::text(self.summary.clone())),
            Role::Reviewer => {
                let verdict = self
                    .verdicts
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| "VERDICT: PASS\nFEEDBACK: none".to_string());
                Ok(LLMResponse::text(verdict))
            }
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Planner JSON for `(id, priority, dependencies)` triples; descriptions are `Task <id>`
pub fn plan_json(tasks: &[(&str, &str, &[&str])]) -> String {
    let tasks: Vec<Value> = tasks
        .iter()
        .map(|(id, priority, deps)| {
            json!({
                "id": id,
                "description": format!("Task {}", id),
                "priority": priority,
                "dependencies": deps,
            })
        })
        .collect();
    json!({"plan": "Mock research plan.", "tasks": tasks}).to_string()
}

/// Search tool returning canned results and recording queries
#[derive(Default)]
pub struct MockSearchTool {
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl Tool for MockSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Mock web search"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> std::result::Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(|q| q.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("query is required".to_string()))?;
        self.queries.lock().unwrap().push(query.to_string());
        Ok(json!({
            "query": query,
            "results": [{"title": "Mock source", "url": "https://example.com/source"}]
        }))
    }
}

/// Tool that always fails
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn invoke(&self, _args: Value) -> std::result::Result<Value, ToolError> {
        Err(ToolError::Execution("upstream unavailable".to_string()))
    }
}
