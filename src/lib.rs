//! # dossier - Research Task Orchestration Engine
//!
//! Turns a natural-language research question into a quality-gated report.
//! The query is decomposed into a dependency-aware task graph. Ready tasks
//! are dispatched in rounds to workers that call research tools, and the
//! merged findings loop through a quality gate with a capped revision budget.
//!
//! ## Overview
//!
//! dossier can be used in two ways:
//!
//! 1. **As a CLI** - Run the `dossier` binary
//! 2. **As a library** - Embed the orchestrator in your own Rust project
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use dossier::{DossierConfig, Provider, ResearchOrchestrator, ToolRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DossierConfig::load_or_default("dossier.toml")?;
//!     let llm = Provider::from_config(&config)?.create_client()?;
//!     let tools = Arc::new(ToolRegistry::with_default_tools(&config.tools));
//!
//!     let orchestrator = ResearchOrchestrator::new(llm, tools, config);
//!     let outcome = orchestrator.run("How mature is sodium-ion storage?").await?;
//!     println!("{}", outcome.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI-compatible APIs (default) |
//! | `web-tools` | `web_search` and `fetch_page` tools via daedra (default) |
//!
//! ## Modules
//!
//! - [`research`] - Task graph, planner, worker, supervisor, synthesizer, quality gate
//! - [`llm`] - Reasoning engine clients
//! - [`tools`] - Tool trait and registry
//! - [`utils`] - `dossier.toml` configuration
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Command-line interface (argument parsing, init, output).
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Research task orchestration.
pub mod research;
/// Research tools and the tool registry.
pub mod tools;
/// Core types and errors.
pub mod types;
/// Configuration loading.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, LLMResponse, Provider};
pub use research::{ResearchOrchestrator, ResearchOutcome, TaskGraph};
pub use tools::registry::ToolRegistry;
pub use types::{AppError, Result};
pub use utils::toml_config::DossierConfig;
