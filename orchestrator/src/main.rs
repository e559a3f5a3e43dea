//! qag CLI
//!
//! Turns text contexts into question/answer sets.
//!
//! Usage:
//!   qag run --data-path data/contexts.jsonl --output-dir output
//!   qag generate "City Y is the capital of Country X."
//!   echo "..." | qag generate
//!   qag models

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qag_agent::config::{Backend, LlmConfig, QagConfig};
use qag_agent::llm::{list_ollama_models, list_openai_models};
use qag_orchestrator::batch::{load_examples, to_pretty_json};
use qag_orchestrator::{BatchRunner, QagPipeline};

#[derive(Parser)]
#[command(name = "qag")]
#[command(about = "Generate vetted question/answer sets from text contexts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the nearest .qag.toml)
    #[arg(long, env = "QAG_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Completion service protocol: openai or ollama
    #[arg(long, env = "QAG_BACKEND", global = true)]
    backend: Option<Backend>,

    /// Completion service URL
    #[arg(long, env = "QAG_URL", global = true)]
    url: Option<String>,

    /// Model name (defaults to the first model the service lists)
    #[arg(short = 'm', long, env = "QAG_MODEL", global = true)]
    model: Option<String>,

    /// API key for OpenAI-compatible services
    #[arg(long, env = "QAG_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, env = "QAG_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every example of a JSONL dataset
    Run {
        /// JSONL input, one {"text": ...} object per line
        #[arg(long)]
        data_path: Option<PathBuf>,

        /// Directory receiving output_{i}.json files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Examples processed at once
        #[arg(long, short = 'j')]
        concurrency: Option<usize>,

        /// Give up on a question after this many answer passes
        #[arg(long)]
        max_answer_attempts: Option<usize>,
    },
    /// Run the pipeline on one context and print the result
    Generate {
        /// Context text (read from stdin when omitted)
        context: Option<String>,

        /// Give up on a question after this many answer passes
        #[arg(long)]
        max_answer_attempts: Option<usize>,
    },
    /// List models offered by the configured service
    Models,
}

/// Initialize tracing with the given verbosity level
///
/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
///
/// `RUST_LOG` overrides the level and `LOG_FORMAT=json` switches stderr output
/// to JSON. With `log_dir`, every event is also written to
/// `qag_YYYYmmdd_HHMMSS.log` in that directory.
fn init_tracing(verbosity: u8, log_dir: Option<&Path>) -> Result<()> {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // Allow RUST_LOG to override if set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let path = dir.join(format!("qag_{}.log", chrono::Local::now().format("%Y%m%d_%H%M%S")));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI first to get verbosity before initializing tracing
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_dir.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => QagConfig::load_from_path(path)?,
        None => QagConfig::load()?,
    };

    // CLI values win over the config file
    if let Some(backend) = cli.backend {
        config.llm.backend = backend;
    }
    if cli.url.is_some() {
        config.llm.url = cli.url.clone();
    }
    if cli.model.is_some() {
        config.llm.model = cli.model.clone();
    }
    if let Some(api_key) = &cli.api_key {
        config.llm.api_key = api_key.clone();
    }

    match cli.command {
        Commands::Run {
            data_path,
            output_dir,
            concurrency,
            max_answer_attempts,
        } => {
            let data_path = match data_path {
                Some(path) => path,
                None => config.data.data_path()?,
            };
            let output_dir = match output_dir {
                Some(dir) => dir,
                None => config.data.output_dir()?,
            };
            let concurrency = concurrency.unwrap_or(config.run.concurrency);
            let max_answer_attempts = max_answer_attempts.or(config.run.max_answer_attempts);

            run_batch(&config.llm, &data_path, output_dir, concurrency, max_answer_attempts).await
        }
        Commands::Generate {
            context,
            max_answer_attempts,
        } => {
            let max_answer_attempts = max_answer_attempts.or(config.run.max_answer_attempts);
            run_generate(&config.llm, context, max_answer_attempts).await
        }
        Commands::Models => run_models(&config.llm).await,
    }
}

async fn run_batch(
    llm: &LlmConfig,
    data_path: &Path,
    output_dir: PathBuf,
    concurrency: usize,
    max_answer_attempts: Option<usize>,
) -> Result<()> {
    let examples = load_examples(data_path)
        .with_context(|| format!("failed to load examples from {}", data_path.display()))?;
    tracing::info!("Loaded {} examples from {}", examples.len(), data_path.display());

    let model = llm.build_model().await?;
    let pipeline = QagPipeline::new(model).with_max_answer_attempts(max_answer_attempts);
    let runner = BatchRunner::new(Arc::new(pipeline), output_dir).with_concurrency(concurrency);

    let summary = runner.run(examples).await?;

    println!("Examples: {}", summary.total());
    println!("Processed: {}", summary.processed);
    println!("Skipped (already done): {}", summary.skipped);
    println!("Failed: {}", summary.failed.len());
    for (index, reason) in &summary.failed {
        println!("  [{}] {}", index, reason);
    }

    Ok(())
}

async fn run_generate(llm: &LlmConfig, context: Option<String>, max_answer_attempts: Option<usize>) -> Result<()> {
    let context = match context {
        Some(context) => context,
        None => {
            if std::io::stdin().is_terminal() {
                anyhow::bail!("no context given: pass it as an argument or pipe it on stdin");
            }
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read context from stdin")?;
            buf
        }
    };
    if context.trim().is_empty() {
        anyhow::bail!("context is empty");
    }

    let model = llm.build_model().await?;
    let pipeline = QagPipeline::new(model).with_max_answer_attempts(max_answer_attempts);
    let result = pipeline.run(&context).await?;

    let json = to_pretty_json(&result)?;
    println!("{}", String::from_utf8_lossy(&json));
    Ok(())
}

async fn run_models(llm: &LlmConfig) -> Result<()> {
    let url = llm.resolved_url();
    let names: Vec<String> = match llm.backend {
        Backend::OpenAi => list_openai_models(&url, &llm.resolved_api_key()?)
            .await
            .with_context(|| format!("failed to list models at {}", url))?,
        Backend::Ollama => list_ollama_models(&url)
            .await
            .with_context(|| format!("failed to list models at {}", url))?
            .into_iter()
            .map(|m| m.name)
            .collect(),
    };

    if names.is_empty() {
        println!("No models available at {}", url);
        return Ok(());
    }

    println!("Available models at {}:\n", url);
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}
