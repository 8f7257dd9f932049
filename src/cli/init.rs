//! Init command implementation
//!
//! Writes a commented starter `dossier.toml` (and `.env.example`).

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    Success,
    /// dossier.toml exists and --force was not given
    AlreadyExists,
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (ollama or openai)
    pub provider: String,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.header("Initializing dossier");

    let base_path = &config.path;
    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    let config_path = base_path.join("dossier.toml");
    if config_path.exists() && !config.force {
        output.warning("dossier.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if let Err(e) = write_file(&config_path, &generate_dossier_toml(&config.provider), true) {
        output.error(&format!("Failed to create dossier.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "dossier.toml");

    let env_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_path, ENV_EXAMPLE, config.force) {
        output.warning(&format!("Failed to create .env.example: {}", e));
    } else {
        output.created("env", ".env.example");
    }

    output.header("Next Steps");
    if config.provider == "openai" {
        output.info("Set your API key:");
        output.command("cp .env.example .env  # then set OPENAI_API_KEY");
    } else {
        output.info("Start Ollama and pull the model:");
        output.command("ollama serve");
        output.command("ollama pull llama3.2");
    }
    output.info("Run your first research:");
    output.command("dossier research \"What changed in EU battery regulation in 2024?\"");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_dossier_toml(provider: &str) -> String {
    let provider_section = if provider == "openai" {
        r#"# OpenAI or any OpenAI-compatible endpoint (key read from the env var below)
[provider]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
model = "gpt-4o-mini"
"#
    } else {
        r#"# Local Ollama server
[provider]
type = "ollama"
base_url = "http://localhost:11434"
model = "llama3.2"
"#
    };

    format!(
        r#"# dossier configuration
# Every section is optional; omitted values use the defaults shown here.

{provider_section}
[research]
# quick | standard | deep | exhaustive
depth = "standard"
# Workers dispatched per supervisor round
concurrency = 3
# Uncomment to override the depth profile
# max_tasks = 12
# max_tool_calls = 30
# max_iterations = 30
outline = ["Introduction", "Key Findings", "Analysis", "Risks and Open Questions", "Conclusion"]

[quality]
# Minimum draft length in characters
min_report_length = 1000
# Minimum completed tasks backing the report
min_findings_count = 3
max_revisions = 3

[tools]
web_search = true
fetch_page = true
timeout_secs = 30
max_search_results = 8

[logging]
# Overridden by RUST_LOG when set
level = "info"
json = false
"#
    )
}

const ENV_EXAMPLE: &str = r#"# dossier environment variables
# Copy this file to .env and fill in the values.

# Required for the openai provider
# OPENAI_API_KEY=sk-...

# Optional: log filter, overrides [logging].level
# RUST_LOG=info,dossier=debug
"#;
