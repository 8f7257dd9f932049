use anyhow::Context;
use dossier::cli::init::{self, InitConfig, InitResult};
use dossier::cli::output::Output;
use dossier::cli::{Cli, Commands, OutputFormat};
use dossier::research::ResearchPlan;
use dossier::{DossierConfig, Provider, ResearchOrchestrator, ToolRegistry};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let (path, force, provider) = match cli.command {
        Commands::Init {
            path,
            force,
            provider,
        } => (path, force, provider),
        command => return run_command(command, &cli.config, cli.verbose, &output).await,
    };

    match init::run(
        InitConfig {
            path,
            force,
            provider,
        },
        &output,
    ) {
        InitResult::Success | InitResult::AlreadyExists => Ok(()),
        InitResult::Error(e) => Err(anyhow::anyhow!(e)),
    }
}

async fn run_command(
    command: Commands,
    config_path: &std::path::Path,
    verbose: bool,
    output: &Output,
) -> anyhow::Result<()> {
    let mut config = DossierConfig::load_or_default(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    init_tracing(&config, verbose);

    match command {
        Commands::Research {
            query,
            depth,
            concurrency,
            output: output_path,
            format,
        } => {
            if let Some(depth) = depth {
                config.research.depth = depth;
            }
            if let Some(k) = concurrency {
                config.research.concurrency = k;
            }
            config.validate()?;

            let orchestrator = build_orchestrator(config)?;
            output.info(&format!("Researching: {}", query));
            let outcome = orchestrator.run(&query).await?;

            let rendered = match format {
                OutputFormat::Markdown => outcome.to_markdown(),
                OutputFormat::Json => outcome.to_json()?,
            };
            match output_path {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    output.created("report", &path.display().to_string());
                }
                None => println!("{}", rendered),
            }

            if outcome.report.passes_quality {
                output.success(&format!(
                    "Report passed quality review after {} revision(s)",
                    outcome.report.revision_count
                ));
            } else {
                output.warning("Report did not pass quality review within the revision budget");
            }
            for issue in &outcome.issues {
                output.warning(&format!("{}: {}", issue.kind, issue.message));
            }
        }
        Commands::Plan { query, depth } => {
            if let Some(depth) = depth {
                config.research.depth = depth;
            }
            let orchestrator = build_orchestrator(config)?;
            let plan = orchestrator.plan(&query).await?;
            print_plan(&plan);
            for issue in &plan.issues {
                output.warning(&format!("{}: {}", issue.kind, issue.message));
            }
        }
        Commands::Config { validate } => {
            config.validate()?;
            if validate {
                output.success(&format!("{} is valid", config_path.display()));
                return Ok(());
            }
            let limits = config.research.limits();
            output.header("Effective configuration");
            output.kv("provider", &format!("{:?}", config.provider));
            output.kv("depth", &config.research.depth.to_string());
            output.kv("concurrency", &config.research.concurrency.to_string());
            output.kv("max_tasks", &limits.max_tasks.to_string());
            output.kv("max_tool_calls", &limits.max_tool_calls.to_string());
            output.kv("max_iterations", &limits.max_iterations.to_string());
            output.kv(
                "quality",
                &format!(
                    "min_length={} min_findings={} max_revisions={}",
                    config.quality.min_report_length,
                    config.quality.min_findings_count,
                    config.quality.max_revisions
                ),
            );
            for heading in &config.research.outline {
                output.list_item(heading);
            }
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}

/// Engine and tools are built once here and injected into the orchestrator
fn build_orchestrator(config: DossierConfig) -> anyhow::Result<ResearchOrchestrator> {
    let provider = Provider::from_config(&config)?;
    let llm = provider.create_client()?;
    let tools = Arc::new(ToolRegistry::with_default_tools(&config.tools));
    tracing::info!(
        provider = provider.name(),
        model = provider.model(),
        tools = ?tools.tool_names(),
        "Reasoning engine ready"
    );
    Ok(ResearchOrchestrator::new(llm, tools, config))
}

/// Logs go to stderr; stdout is reserved for the report
fn init_tracing(config: &DossierConfig, verbose: bool) {
    let default_level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_plan(plan: &ResearchPlan) {
    println!("# Plan: {}\n", plan.query);
    if !plan.plan.trim().is_empty() {
        println!("{}\n", plan.plan.trim());
    }
    for task in plan.graph.tasks() {
        let deps: Vec<String> = task
            .dependencies
            .iter()
            .map(|dep| match plan.graph.get(dep) {
                Some(t) => t.description.clone(),
                None => format!("{} (unresolved)", dep),
            })
            .collect();
        if deps.is_empty() {
            println!("- [{}] {}", task.priority, task.description);
        } else {
            println!(
                "- [{}] {} (after: {})",
                task.priority,
                task.description,
                deps.join("; ")
            );
        }
    }
}
