//! Single-task worker: a bounded reasoning/tool-call loop.
//!
//! A worker owns its conversation and a snapshot of the task. It shares the
//! reasoning engine and tool registry read-only, and it never fails: every
//! error is folded into error-tagged findings in the returned [`WorkerReport`].

use crate::llm::{ConversationMessage, LLMClient};
use crate::research::task_graph::{Task, TaskId, ERROR_TAG};
use crate::tools::{ToolError, ToolRegistry};
use crate::types::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Characters of a single tool output kept in accumulated findings
const TOOL_OUTPUT_EXCERPT: usize = 2_000;

const WORKER_SYSTEM_PROMPT: &str = r#"You are a meticulous research analyst working on one task of a larger research project.

Use the available tools to gather evidence. When you have enough information, reply WITHOUT calling any tool and write your findings:
- State concrete facts, figures and dates.
- Attribute claims to their sources (site or document names, URLs when known).
- Flag uncertainty and conflicting evidence explicitly.
Keep the findings focused on the task; do not write an introduction or conclusion for the whole project."#;

/// Why a worker loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerFinish {
    /// The model answered without requesting tools
    Completed,
    /// The tool-call budget ran out; findings are the accumulated content
    ToolBudgetExhausted,
    /// A tool invocation failed or timed out
    ToolError,
    /// The reasoning engine returned an error
    EngineError,
}

/// Record of a tool call made during execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub result: Value,
    pub success: bool,
    pub duration_ms: u64,
}

/// Result of executing one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub task_id: TaskId,
    pub findings: String,
    pub failed: bool,
    /// Reasoning-engine calls made
    pub iterations: usize,
    pub finish: WorkerFinish,
    pub tool_calls: Vec<ToolCallRecord>,
    pub duration_ms: u64,
}

#[derive(Clone)]
pub struct Worker {
    llm: Arc<dyn LLMClient>,
    tools: Arc<ToolRegistry>,
    max_tool_calls: usize,
    tool_timeout: Duration,
}

impl Worker {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        tools: Arc<ToolRegistry>,
        max_tool_calls: usize,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            tools,
            max_tool_calls,
            tool_timeout,
        }
    }

    /// Execute `task`. `context` carries findings of the task's dependencies.
    pub async fn execute(&self, task: &Task, context: &str) -> WorkerReport {
        let start = Instant::now();
        let mut run = WorkerRun::new(task.id.clone());

        let mut messages = vec![
            ConversationMessage::system(WORKER_SYSTEM_PROMPT),
            ConversationMessage::user(task_prompt(task, context)),
        ];
        let definitions = self.tools.definitions();

        let finish = loop {
            run.iterations += 1;

            let response = match self.llm.complete(&messages, &definitions).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "Reasoning engine failed");
                    run.error(format!("Reasoning engine failed: {}", e));
                    break WorkerFinish::EngineError;
                }
            };

            if !response.content.trim().is_empty() {
                run.last_content = response.content.clone();
            }

            if !response.requests_tools() {
                run.findings = Some(response.content);
                break WorkerFinish::Completed;
            }

            messages.push(ConversationMessage::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            match self.run_tool_calls(&response.tool_calls, &mut messages, &mut run).await {
                Some(finish) => break finish,
                None => continue,
            }
        };

        let failed = matches!(finish, WorkerFinish::ToolError | WorkerFinish::EngineError);
        let findings = run.final_findings();

        tracing::info!(
            task_id = %task.id,
            iterations = run.iterations,
            tool_calls = run.records.len(),
            finish = ?finish,
            "Worker finished"
        );

        WorkerReport {
            task_id: run.task_id,
            findings,
            failed,
            iterations: run.iterations,
            finish,
            tool_calls: run.records,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Execute the requested calls in order. Returns `Some` when the loop must end.
    async fn run_tool_calls(
        &self,
        calls: &[ToolCall],
        messages: &mut Vec<ConversationMessage>,
        run: &mut WorkerRun,
    ) -> Option<WorkerFinish> {
        for call in calls {
            if run.records.len() >= self.max_tool_calls {
                tracing::debug!(
                    task_id = %run.task_id,
                    budget = self.max_tool_calls,
                    "Tool-call budget exhausted"
                );
                return Some(WorkerFinish::ToolBudgetExhausted);
            }

            let call_start = Instant::now();
            tracing::debug!(task_id = %run.task_id, tool = %call.name, "Invoking tool");
            let outcome = self.invoke_with_timeout(call).await;
            let duration_ms = call_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(result) => {
                    messages.push(ConversationMessage::tool_result(&call.id, &result));
                    run.tool_outputs.push(format!(
                        "[{}] {}",
                        call.name,
                        excerpt(&render_value(&result), TOOL_OUTPUT_EXCERPT)
                    ));
                    run.records.push(ToolCallRecord {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        result,
                        success: true,
                        duration_ms,
                    });
                }
                Err(e) => {
                    tracing::warn!(task_id = %run.task_id, tool = %call.name, error = %e, "Tool failed");
                    run.records.push(ToolCallRecord {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        result: Value::String(e.to_string()),
                        success: false,
                        duration_ms,
                    });
                    run.error(format!("Tool '{}' failed: {}", call.name, e));
                    return Some(WorkerFinish::ToolError);
                }
            }
        }
        None
    }

    async fn invoke_with_timeout(&self, call: &ToolCall) -> Result<Value, ToolError> {
        match tokio::time::timeout(
            self.tool_timeout,
            self.tools.invoke(&call.name, call.arguments.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(
                call.name.clone(),
                self.tool_timeout.as_secs(),
            )),
        }
    }
}

/// Mutable state of one execution
struct WorkerRun {
    task_id: TaskId,
    iterations: usize,
    records: Vec<ToolCallRecord>,
    tool_outputs: Vec<String>,
    last_content: String,
    findings: Option<String>,
}

impl WorkerRun {
    fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            iterations: 0,
            records: Vec::new(),
            tool_outputs: Vec::new(),
            last_content: String::new(),
            findings: None,
        }
    }

    fn error(&mut self, message: String) {
        self.findings = Some(format!("{} {}", ERROR_TAG, message));
    }

    /// Final answer, else last assistant text plus tool outputs
    fn final_findings(&mut self) -> String {
        if let Some(findings) = self.findings.take() {
            if !findings.trim().is_empty() {
                return findings;
            }
        }

        let mut parts = Vec::new();
        if !self.last_content.trim().is_empty() {
            parts.push(self.last_content.trim().to_string());
        }
        parts.extend(self.tool_outputs.iter().cloned());

        if parts.is_empty() {
            "No findings reported.".to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

fn task_prompt(task: &Task, context: &str) -> String {
    let mut prompt = format!(
        "Research task ({} priority): {}",
        task.priority, task.description
    );
    if !context.trim().is_empty() {
        prompt.push_str("\n\nFindings from prerequisite tasks:\n");
        prompt.push_str(context);
    }
    prompt
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
