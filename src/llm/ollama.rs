//! Ollama `/api/chat` client with tool calling.

use crate::llm::client::{
    http_client, send_json_with_retry, ConversationMessage, LLMClient, LLMResponse, MessageRole,
};
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde_json::{json, Value};

const MAX_RETRIES: u32 = 1;

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn encode_message(message: &ConversationMessage) -> Value {
        match message.role {
            MessageRole::Assistant if !message.tool_calls.is_empty() => {
                let tool_calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments
                            }
                        })
                    })
                    .collect();
                json!({
                    "role": "assistant",
                    "content": message.content,
                    "tool_calls": tool_calls
                })
            }
            role => json!({
                "role": role.as_str(),
                "content": message.content
            }),
        }
    }

    /// Parse Ollama response JSON
    pub(crate) fn parse_response(body: &Value) -> Result<LLMResponse> {
        let message = body
            .get("message")
            .ok_or_else(|| AppError::LLM("No message in response".to_string()))?;

        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(tc_array) = message.get("tool_calls").and_then(|v| v.as_array()) {
            for tc in tc_array {
                if let Some(func) = tc.get("function") {
                    let name = func
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    let arguments = func.get("arguments").cloned().unwrap_or(json!({}));

                    tool_calls.push(ToolCall {
                        id: uuid::Uuid::new_v4().to_string(),
                        name,
                        arguments,
                    });
                }
            }
        }

        let finish_reason = if !tool_calls.is_empty() {
            "tool_calls".to_string()
        } else {
            body.get("done_reason")
                .and_then(|v| v.as_str())
                .unwrap_or("stop")
                .to_string()
        };

        Ok(LLMResponse {
            content,
            tool_calls,
            finish_reason,
        })
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(Self::encode_message).collect::<Vec<_>>(),
            "stream": false
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(model = %self.model, messages = messages.len(), "Ollama chat");

        let response =
            send_json_with_retry("Ollama", MAX_RETRIES, || self.http.post(&url).json(&body))
                .await?;

        Self::parse_response(&response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
