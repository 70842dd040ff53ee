//! Command-line interface for agentrelay.
//!
//! Provides commands for running one pipeline or all of them, invoking a
//! single backend task, checking the backend and serving the HTTP API.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::{load_config, ResolvedConfig};
use crate::core::{Orchestrator, PipelineSet};
use crate::server::{self, AppState};

/// agentrelay - Session-scoped orchestrator for agent-runner backends
#[derive(Parser, Debug)]
#[command(name = "agentrelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Caller id sessions are created under (overrides config)
    #[arg(long, global = true)]
    pub caller_id: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a configured pipeline
    Run {
        /// Pipeline label (name field of a file in the pipelines directory)
        pipeline_name: String,

        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read input from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Run every configured pipeline against the same input
    Batch {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read input from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Invoke a single backend task on a fresh session
    Invoke {
        /// Task (backend app) name
        task_name: String,

        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read input from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Check that the backend is reachable and list its tasks
    Health,

    /// List configured pipelines
    Pipelines,

    /// Show resolved configuration (debug)
    Config,

    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        address: Option<String>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = load_config()?;
        if let Some(caller_id) = self.caller_id {
            config.caller_id = caller_id;
        }

        match self.command {
            Commands::Run {
                pipeline_name,
                input,
                stdin,
            } => run_pipeline(&config, &pipeline_name, input, stdin).await,
            Commands::Batch { input, stdin } => run_batch(&config, input, stdin).await,
            Commands::Invoke {
                task_name,
                input,
                stdin,
            } => invoke_task(&config, &task_name, input, stdin).await,
            Commands::Health => show_health(&config).await,
            Commands::Pipelines => list_pipelines(&config),
            Commands::Config => show_config(&config),
            Commands::Serve { address } => serve(&config, address).await,
        }
    }
}

/// Run one pipeline and print its labeled response
async fn run_pipeline(
    config: &ResolvedConfig,
    pipeline_name: &str,
    input_file: Option<PathBuf>,
    use_stdin: bool,
) -> Result<()> {
    let pipelines = load_pipelines(config)?;
    let pipeline = pipelines.get(pipeline_name).with_context(|| {
        let known: Vec<&str> = pipelines.labels().collect();
        format!(
            "Pipeline '{}' not found in {} (known: {})",
            pipeline_name,
            config.pipelines_dir.display(),
            known.join(", ")
        )
    })?;

    let input = read_input(input_file, use_stdin)?;

    let orchestrator = Orchestrator::from_config(config);
    let response = orchestrator
        .run_labeled(pipeline_name, pipeline, &input, &config.caller_id)
        .await;

    print_json(&response)?;
    if !response.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

/// Run every pipeline and print the batch result
async fn run_batch(config: &ResolvedConfig, input_file: Option<PathBuf>, use_stdin: bool) -> Result<()> {
    let pipelines = load_pipelines(config)?;
    if pipelines.is_empty() {
        anyhow::bail!("No pipelines found in {}", config.pipelines_dir.display());
    }

    let input = read_input(input_file, use_stdin)?;

    let orchestrator = Orchestrator::from_config(config);
    let results = orchestrator
        .run_batch(&pipelines, &input, &config.caller_id)
        .await;

    print_json(&results)
}

/// Invoke one task and print the fetched state
async fn invoke_task(
    config: &ResolvedConfig,
    task_name: &str,
    input_file: Option<PathBuf>,
    use_stdin: bool,
) -> Result<()> {
    let input = read_input(input_file, use_stdin)?;

    let orchestrator = Orchestrator::from_config(config);
    orchestrator.limits().validate_input(&input)?;
    let state = orchestrator
        .invoke(task_name, &input, &config.caller_id)
        .await?;

    print_json(&state)
}

/// Print backend health; non-zero exit when unreachable
async fn show_health(config: &ResolvedConfig) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config);
    let health = orchestrator.health().await;

    print_json(&health)?;
    if !health.healthy {
        std::process::exit(1);
    }

    Ok(())
}

/// List configured pipelines
fn list_pipelines(config: &ResolvedConfig) -> Result<()> {
    let pipelines = load_pipelines(config)?;

    if pipelines.is_empty() {
        println!("No pipelines found in {}", config.pipelines_dir.display());
        return Ok(());
    }

    println!("{:<20} {:<8} {}", "PIPELINE", "STAGES", "DESCRIPTION");
    println!("{}", "-".repeat(75));

    for (label, pipeline) in pipelines.iter() {
        println!(
            "{:<20} {:<8} {}",
            label,
            pipeline.stages.len(),
            pipeline.description
        );
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("Config file: {}", match &config.config_file {
        Some(path) => path.display().to_string(),
        None => "(none, using defaults)".to_string(),
    });
    println!("Backend URL: {}", config.backend_url);
    println!("Caller ID: {}", config.caller_id);
    println!("Pipelines: {}", config.pipelines_dir.display());
    println!("Server address: {}", config.server_address);
    println!("\nLimits:");
    println!("  max_input_bytes: {}", config.limits.max_input_bytes);
    println!("  max_stages: {}", config.limits.max_stages);
    println!("  max_parallel_members: {}", config.limits.max_parallel_members);
    println!("  request_timeout_seconds: {}", config.limits.request_timeout_seconds);
    println!("  run_timeout_seconds: {}", config.limits.run_timeout_seconds);

    Ok(())
}

/// Start the HTTP server
async fn serve(config: &ResolvedConfig, address: Option<String>) -> Result<()> {
    let pipelines = load_pipelines(config)?;
    let orchestrator = Orchestrator::from_config(config);
    let address = address.unwrap_or_else(|| config.server_address.clone());

    let state = AppState::new(orchestrator, pipelines, &config.caller_id);
    server::serve(&address, state).await
}

/// Load all pipelines from the configured directory
fn load_pipelines(config: &ResolvedConfig) -> Result<PipelineSet> {
    PipelineSet::load_dir(&config.pipelines_dir).with_context(|| {
        format!(
            "Failed to load pipelines from {}",
            config.pipelines_dir.display()
        )
    })
}

/// Read input from a file, or from stdin when piped or requested
fn read_input(input_file: Option<PathBuf>, use_stdin: bool) -> Result<String> {
    let input = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if use_stdin || !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    if input.trim().is_empty() {
        anyhow::bail!("Input is empty");
    }

    Ok(input)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
