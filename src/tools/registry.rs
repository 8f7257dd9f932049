use crate::types::ToolDefinition;
use crate::utils::toml_config::ToolsConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Errors a tool can report back to the worker that invoked it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Tool '{0}' timed out after {1}s")]
    Timeout(String, u64),
}

/// A named research capability.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

/// Tagged dispatch table from tool name to implementation.
///
/// Built once at startup and shared read-only between concurrent workers.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Create a registry with the research tools enabled in `config`
    pub fn with_default_tools(config: &ToolsConfig) -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "web-tools")]
        {
            if config.web_search {
                registry.register(Arc::new(crate::tools::search::SearchTool::new(
                    config.max_search_results,
                )));
            }
            if config.fetch_page {
                registry.register(Arc::new(crate::tools::search::FetchPageTool::new()));
            }
        }

        #[cfg(not(feature = "web-tools"))]
        {
            if config.web_search || config.fetch_page {
                tracing::warn!("web tools requested but dossier was built without `web-tools`");
            }
        }

        registry
    }

    /// Register a tool, replacing any previous tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if self.tools.insert(tool.name().to_string(), tool).is_some() {
            tracing::debug!("Replaced previously registered tool");
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(args).await,
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }

    /// Get a list of all registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments back"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
            args.get("text")
                .cloned()
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text'".to_string()))
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.tool_names().len(), 0);
    }

    #[test]
    fn test_register_and_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));

        assert_eq!(registry.tool_names(), vec!["echo".to_string()]);
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "echo");
        assert!(definitions[0].parameters.is_object());
    }

    #[tokio::test]
    async fn test_invoke_dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));

        let value = registry.invoke("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(value, json!("hi"));

        let err = registry.invoke("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_nonexistent_tool() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("nonexistent_tool", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::NotFound("nonexistent_tool".to_string()));
    }

    #[test]
    fn test_disabled_tools_are_not_registered() {
        let config = ToolsConfig {
            web_search: false,
            fetch_page: false,
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::with_default_tools(&config);
        assert!(registry.is_empty());
    }
}
