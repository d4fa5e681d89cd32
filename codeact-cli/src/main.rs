//! # codeact CLI
//!
//! Command-line interface for running the code-writing agent.
//!
//! Usage:
//!   codeact <query>
//!   codeact run <query>
//!   codeact exec <file.py>
//!   codeact prompts
//!
//! Examples:
//!   codeact "What is the 10th Fibonacci number?"
//!   codeact --max-steps 4 --json-mode "How many primes are below 10000?"
//!   codeact exec scratch/fib.py
//!
//! The service is configured through `CODEACT_API_KEY`, `CODEACT_BASE_URL`
//! and `CODEACT_MODEL`; flags override the environment.

use clap::{Parser, Subcommand};
use codeact_agent::{prompts, Agent, AgentConfig, RunOutcome, DEFAULT_MAX_STEPS};
use codeact_error::{Error, Result};
use codeact_runtime::{CodeExecutor, OpenAIProvider, ProviderConfig, PythonSandbox, SandboxConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codeact")]
#[command(author, version, about = "codeact - an agent that writes and runs its own tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Query to answer (when not using subcommands)
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,

    /// Model name sent to the service
    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Step budget for the decision loop
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Sandbox time limit per execution, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Python interpreter used by the sandbox
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    /// Replace the agent persona with the contents of a file
    #[arg(long, global = true)]
    agent_prompt: Option<PathBuf>,

    /// Replace the coder persona with the contents of a file
    #[arg(long, global = true)]
    coder_prompt: Option<PathBuf>,

    /// Request JSON-object responses for decisions
    #[arg(long, global = true)]
    json_mode: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - warnings only, just the final answer on stdout
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a query
    Run {
        /// The query
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
    /// Run a Python file through the sandbox and print the result
    Exec {
        /// Path to the source file
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print the effective agent and coder prompts
    Prompts,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_prompt(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::from(e)
            .with_operation("cli::read_prompt")
            .with_context("path", path.display().to_string())
    })
}

fn agent_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = AgentConfig {
        max_steps: cli.max_steps,
        json_mode: cli.json_mode,
        ..AgentConfig::default()
    };
    if let Some(path) = &cli.agent_prompt {
        config.agent_prompt = read_prompt(path)?;
    }
    if let Some(path) = &cli.coder_prompt {
        config.coder_prompt = read_prompt(path)?;
    }
    Ok(config)
}

fn provider_config(cli: &Cli) -> Result<ProviderConfig> {
    let mut config = ProviderConfig::from_env()?;
    if let Some(model) = &cli.model {
        config = config.with_model(model);
    }
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }
    Ok(config)
}

fn sandbox(cli: &Cli) -> Result<PythonSandbox> {
    let config = SandboxConfig::from_env()?.with_cli_overrides(cli.python.clone(), cli.timeout);
    Ok(PythonSandbox::new(config))
}

async fn run_query(cli: &Cli, query: &str) -> Result<ExitCode> {
    if cli.max_steps == 0 {
        return Err(Error::invalid_argument("--max-steps must be at least 1"));
    }

    let provider = Arc::new(OpenAIProvider::new(provider_config(cli)?)?);
    let executor = Arc::new(sandbox(cli)?);
    let agent = Agent::with_config(provider.clone(), executor, agent_config(cli)?);

    let result = agent.run(query).await;

    let usage = provider.usage();
    tracing::info!(
        calls = usage.total_calls,
        prompt_tokens = usage.total_prompt_tokens,
        completion_tokens = usage.total_completion_tokens,
        total_tokens = usage.total_tokens(),
        "usage_summary"
    );

    let result = result?;
    match result.outcome {
        RunOutcome::FinalAnswer(answer) => {
            println!("{}", answer);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::BudgetExhausted { max_steps } => {
            eprintln!(
                "No final answer after {} steps; try a larger --max-steps or a simpler query.",
                max_steps
            );
            Ok(ExitCode::from(2))
        }
    }
}

async fn exec_file(cli: &Cli, file: &Path) -> Result<ExitCode> {
    let code = std::fs::read_to_string(file).map_err(|e| {
        Error::from(e)
            .with_operation("cli::exec")
            .with_context("path", file.display().to_string())
    })?;
    let output = sandbox(cli)?.execute(&code).await;
    println!("{}", output);
    Ok(ExitCode::SUCCESS)
}

fn show_prompts(cli: &Cli) -> Result<ExitCode> {
    let config = agent_config(cli)?;
    println!("=== Agent prompt ===\n{}\n", config.agent_prompt);
    println!("=== Coder prompt ===\n{}", config.coder_prompt);
    println!("\n=== Injected messages ===");
    println!("parse retry: {}", prompts::PARSE_RETRY_MESSAGE);
    println!("observation: {}", prompts::observation("<result>"));
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let outcome = match &cli.command {
        Some(Commands::Prompts) => show_prompts(&cli),
        Some(Commands::Exec { file }) => exec_file(&cli, file).await,
        Some(Commands::Run { query }) => run_query(&cli, &query.join(" ")).await,
        None => {
            if cli.query.is_empty() {
                eprintln!("Error: No query provided.");
                eprintln!("Usage: codeact [OPTIONS] <QUERY>...");
                eprintln!("       codeact run <QUERY>...");
                eprintln!("       codeact exec <FILE>");
                eprintln!("       codeact prompts");
                eprintln!("\nExamples:");
                eprintln!("  codeact \"What is the 10th Fibonacci number?\"");
                eprintln!("  codeact exec scratch/fib.py");
                eprintln!("  codeact --help");
                return ExitCode::FAILURE;
            }
            run_query(&cli, &cli.query.join(" ")).await
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "run_failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
