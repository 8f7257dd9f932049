//! Research Tools
//!
//! Workers reach the outside world only through the tool registry: a tagged
//! dispatch table from tool name to a typed `invoke(args)` implementation.
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - `Tool` trait, `ToolError` and the dispatch table
//! - `search` - daedra-backed `web_search` and `fetch_page` (feature `web-tools`)
//!
//! # Tool Registry
//!
//! ```ignore
//! let registry = ToolRegistry::with_default_tools(&config.tools);
//! let definitions = registry.definitions(); // schemas handed to the LLM
//! let result = registry.invoke("web_search", json!({"query": "rust async"})).await?;
//! ```

/// Tool registry and the `Tool` trait.
pub mod registry;
/// Web search and page fetching tools.
#[cfg(feature = "web-tools")]
pub mod search;

pub use registry::{Tool, ToolError, ToolRegistry};
