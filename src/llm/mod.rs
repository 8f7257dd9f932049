//! Reasoning Engine Clients
//!
//! The research pipeline never talks to a model API directly. It holds an
//! `Arc<dyn LLMClient>` built once at startup from `[provider]` in
//! `dossier.toml` and shares it between the planner, the workers, the
//! synthesizer and the quality gate.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible endpoints
//! - `ollama` - Local Ollama server
//!
//! # Example
//!
//! ```ignore
//! use dossier::llm::Provider;
//!
//! let provider = Provider::from_config(&config)?;
//! let client = provider.create_client()?;
//! let answer = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait, conversation types and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{ConversationMessage, LLMClient, LLMResponse, MessageRole, Provider};
