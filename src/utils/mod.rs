/// TOML configuration (`dossier.toml`) loading and validation.
pub mod toml_config;

pub use toml_config::{
    ConfigError, DepthProfile, DossierConfig, LoggingConfig, ProviderConfig, QualityConfig,
    ResearchConfig, ResearchDepth, ToolsConfig,
};
