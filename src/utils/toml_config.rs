//! TOML-based configuration for Dossier
//!
//! All behaviour knobs of a research run live in `dossier.toml`: the
//! reasoning-engine provider, the research-depth profile, the concurrency
//! bound, quality-gate thresholds, tool toggles and logging. Every section
//! is optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure loaded from dossier.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DossierConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Ollama {
            base_url: default_ollama_url(),
            model: "llama3.2".to_string(),
        }
    }
}

// ============= Research Configuration =============

/// Named research-depth profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Quick,
    #[default]
    Standard,
    Deep,
    Exhaustive,
}

/// Limits selected by a research depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthProfile {
    /// Upper bound on tasks the planner may create
    pub max_tasks: usize,
    /// Tool-call iterations a single worker may spend
    pub max_tool_calls: usize,
    /// Supervisor round cap
    pub max_iterations: usize,
}

impl ResearchDepth {
    pub fn profile(self) -> DepthProfile {
        let (max_tasks, max_tool_calls, max_iterations) = match self {
            ResearchDepth::Quick => (5, 10, 10),
            ResearchDepth::Standard => (12, 30, 30),
            ResearchDepth::Deep => (20, 60, 40),
            ResearchDepth::Exhaustive => (30, 100, 60),
        };
        DepthProfile {
            max_tasks,
            max_tool_calls,
            max_iterations,
        }
    }
}

impl std::str::FromStr for ResearchDepth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(ResearchDepth::Quick),
            "standard" => Ok(ResearchDepth::Standard),
            "deep" => Ok(ResearchDepth::Deep),
            "exhaustive" => Ok(ResearchDepth::Exhaustive),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown research depth '{}' (expected quick, standard, deep or exhaustive)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResearchDepth::Quick => "quick",
            ResearchDepth::Standard => "standard",
            ResearchDepth::Deep => "deep",
            ResearchDepth::Exhaustive => "exhaustive",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchConfig {
    #[serde(default)]
    pub depth: ResearchDepth,

    /// Maximum workers dispatched per supervisor round (K)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Overrides the depth profile's task budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tasks: Option<usize>,

    /// Overrides the depth profile's per-worker tool-call budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<usize>,

    /// Overrides the depth profile's supervisor round cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,

    /// Section headings the synthesizer organises findings under
    #[serde(default = "default_outline")]
    pub outline: Vec<String>,
}

fn default_concurrency() -> usize {
    3
}

pub fn default_outline() -> Vec<String> {
    [
        "Introduction",
        "Key Findings",
        "Analysis",
        "Risks and Open Questions",
        "Conclusion",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            depth: ResearchDepth::default(),
            concurrency: default_concurrency(),
            max_tasks: None,
            max_tool_calls: None,
            max_iterations: None,
            outline: default_outline(),
        }
    }
}

impl ResearchConfig {
    /// Depth profile with explicit overrides applied
    pub fn limits(&self) -> DepthProfile {
        let base = self.depth.profile();
        DepthProfile {
            max_tasks: self.max_tasks.unwrap_or(base.max_tasks),
            max_tool_calls: self.max_tool_calls.unwrap_or(base.max_tool_calls),
            max_iterations: self.max_iterations.unwrap_or(base.max_iterations),
        }
    }
}

// ============= Quality Gate Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    /// Minimum draft length in characters
    #[serde(default = "default_min_report_length")]
    pub min_report_length: usize,

    /// Minimum number of completed tasks backing the report
    #[serde(default = "default_min_findings_count")]
    pub min_findings_count: usize,

    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
}

fn default_min_report_length() -> usize {
    1000
}

fn default_min_findings_count() -> usize {
    3
}

fn default_max_revisions() -> u32 {
    3
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_report_length: default_min_report_length(),
            min_findings_count: default_min_findings_count(),
            max_revisions: default_max_revisions(),
        }
    }
}

// ============= Tool Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub web_search: bool,

    #[serde(default = "default_true")]
    pub fetch_page: bool,

    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

fn default_true() -> bool {
    true
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_max_search_results() -> usize {
    8
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search: true,
            fetch_page: true,
            timeout_secs: default_tool_timeout(),
            max_search_results: default_max_search_results(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl DossierConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to validated defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(
                "No configuration at {}, using built-in defaults",
                path.display()
            );
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse without validating
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate limits and provider environment
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ProviderConfig::OpenAI { api_key_env, .. } = &self.provider {
            self.validate_env_var(api_key_env)?;
        }

        let model = match &self.provider {
            ProviderConfig::Ollama { model, .. } | ProviderConfig::OpenAI { model, .. } => model,
        };
        if model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.model must not be empty".to_string(),
            ));
        }

        if self.research.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "research.concurrency must be at least 1".to_string(),
            ));
        }

        let limits = self.research.limits();
        if limits.max_tasks == 0 || limits.max_tool_calls == 0 || limits.max_iterations == 0 {
            return Err(ConfigError::ValidationError(format!(
                "research limits must be non-zero (max_tasks={}, max_tool_calls={}, max_iterations={})",
                limits.max_tasks, limits.max_tool_calls, limits.max_iterations
            )));
        }

        if self.quality.max_revisions == 0 {
            return Err(ConfigError::ValidationError(
                "quality.max_revisions must be at least 1".to_string(),
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        self.resolve_env(name)
            .map(|_| ())
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }

    /// Get the value of an environment variable
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }
}
