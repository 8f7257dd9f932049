//! OpenAI-compatible chat completions client.
//!
//! Works against api.openai.com and any endpoint speaking the same
//! `/chat/completions` dialect (OpenRouter, vLLM, LM Studio, ...).

use crate::llm::client::{
    http_client, send_json_with_retry, ConversationMessage, LLMClient, LLMResponse, MessageRole,
};
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde_json::{json, Value};

const MAX_RETRIES: u32 = 2;

pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn encode_message(message: &ConversationMessage) -> Value {
        match message.role {
            MessageRole::Assistant if !message.tool_calls.is_empty() => {
                let tool_calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string()
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
            MessageRole::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content
            }),
            role => json!({
                "role": role.as_str(),
                "content": message.content
            }),
        }
    }

    fn build_request(&self, messages: &[ConversationMessage], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(Self::encode_message).collect::<Vec<_>>(),
        });

        if !tools.is_empty() {
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
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    /// Parse a chat completions response body
    pub(crate) fn parse_response(body: &Value) -> Result<LLMResponse> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| AppError::LLM("No choices in response".to_string()))?;
        let message = choice
            .get("message")
            .ok_or_else(|| AppError::LLM("No message in response choice".to_string()))?;

        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let tool_calls: Vec<ToolCall> = message
            .get("tool_calls")
            .and_then(|v| v.as_array())
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|tc| {
                        let function = tc.get("function")?;
                        let name = function.get("name")?.as_str()?.to_string();
                        // Arguments arrive as a JSON-encoded string
                        let arguments = match function.get("arguments") {
                            Some(Value::String(raw)) => serde_json::from_str(raw)
                                .unwrap_or_else(|_| Value::String(raw.clone())),
                            Some(other) => other.clone(),
                            None => json!({}),
                        };
                        let id = tc
                            .get("id")
                            .and_then(|v| v.as_str())
                            .map(String::from)
                            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                        Some(ToolCall {
                            id,
                            name,
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| {
                if tool_calls.is_empty() {
                    "stop".to_string()
                } else {
                    "tool_calls".to_string()
                }
            });

        Ok(LLMResponse {
            content,
            tool_calls,
            finish_reason,
        })
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let body = self.build_request(messages, tools);
        let url = self.endpoint();
        tracing::debug!(model = %self.model, messages = messages.len(), "OpenAI chat completion");

        let response = send_json_with_retry("OpenAI", MAX_RETRIES, || {
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        Self::parse_response(&response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello"},
                "finish_reason": "stop"
            }]
        });
        let response = OpenAIClient::parse_response(&body).unwrap();
        assert_eq!(response, LLMResponse::text("Hello"));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{\"query\":\"lithium prices\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let response = OpenAIClient::parse_response(&body).unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_abc");
        assert_eq!(response.tool_calls[0].arguments["query"], "lithium prices");
    }

    #[test]
    fn test_parse_empty_choices_is_error() {
        assert!(OpenAIClient::parse_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_encode_tool_messages() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "fetch_page".to_string(),
            arguments: json!({"url": "https://example.com"}),
        };
        let assistant = OpenAIClient::encode_message(&ConversationMessage::assistant("", vec![call]));
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "fetch_page");
        assert!(assistant["tool_calls"][0]["function"]["arguments"].is_string());

        let tool = OpenAIClient::encode_message(&ConversationMessage::tool_result(
            "call_1",
            &json!({"title": "Example"}),
        ));
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_1");
    }

    #[test]
    fn test_request_omits_tools_when_none_offered() {
        let client = OpenAIClient::new(
            "key".to_string(),
            "https://api.openai.com/v1/".to_string(),
            "gpt-4o-mini".to_string(),
        )
        .unwrap();
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");

        let body = client.build_request(&[ConversationMessage::user("hi")], &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }
}
