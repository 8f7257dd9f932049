//! CLI module for dossier
//!
//! Provides command-line interface parsing for the dossier binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use crate::utils::toml_config::ResearchDepth;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// dossier - quality-gated deep research from the command line
///
/// Decomposes a research question into a task graph, researches the tasks
/// with web tools and an LLM, and writes a reviewed report.
#[derive(Parser, Debug)]
#[command(
    name = "dossier",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "dossier - quality-gated deep research",
    long_about = "Turns a research question into a report: plans dependency-aware tasks,\n\
                  researches them with bounded concurrency, synthesizes the findings and\n\
                  runs the result through a quality gate with a capped revision budget.",
    after_help = "EXAMPLES:\n    \
                  dossier init                                  # Write a starter dossier.toml\n    \
                  dossier research \"State of solid-state batteries\"\n    \
                  dossier research -d deep -o report.md \"...\"   # Deeper run, report to a file\n    \
                  dossier plan \"...\"                            # Show the task plan only"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "dossier.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Report rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the report
    Research {
        /// The research question
        query: String,

        /// Research depth profile (quick, standard, deep, exhaustive)
        #[arg(short, long)]
        depth: Option<ResearchDepth>,

        /// Workers dispatched per round
        #[arg(short = 'k', long)]
        concurrency: Option<usize>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// Plan a research question without executing it
    Plan {
        /// The research question
        query: String,

        /// Research depth profile (bounds the number of tasks)
        #[arg(short, long)]
        depth: Option<ResearchDepth>,
    },

    /// Write a starter dossier.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (ollama or openai)
        #[arg(long, default_value = "ollama")]
        provider: String,
    },

    /// Show the effective configuration
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_research_command() {
        let cli = Cli::try_parse_from([
            "dossier",
            "research",
            "--depth",
            "deep",
            "-k",
            "5",
            "--format",
            "json",
            "Solid-state batteries",
        ])
        .unwrap();

        match cli.command {
            Commands::Research {
                query,
                depth,
                concurrency,
                output,
                format,
            } => {
                assert_eq!(query, "Solid-state batteries");
                assert_eq!(depth, Some(ResearchDepth::Deep));
                assert_eq!(concurrency, Some(5));
                assert!(output.is_none());
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("dossier.toml"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["dossier", "plan", "q", "--config", "alt.toml", "--no-color"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(cli.no_color);
    }

    #[test]
    fn test_invalid_depth_is_rejected() {
        assert!(Cli::try_parse_from(["dossier", "research", "-d", "bottomless", "q"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["dossier"]).is_err());
    }
}
