use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use rootcause_orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError};
use rootcause_protocol::{serialize_json, ErrorEnvelope, TaskState};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod report;

const CLI_INTERRUPT_REASON: &str = "interrupted from the command line";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "rootcause")]
#[command(about = "Root-cause analysis for IT incidents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one analysis in-process against a corpus file and print its final status
    Analyze(AnalyzeArgs),

    /// Validate and print the effective configuration
    ConfigCheck(ConfigCheckArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Natural-language incident description
    text: String,

    /// Evidence corpus (records plus topology) used to seed the in-memory backends
    #[arg(long, value_name = "FILE")]
    corpus: PathBuf,

    /// Orchestrator config (TOML); defaults plus environment overrides when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Task owner recorded in the status snapshot
    #[arg(long, default_value = "cli")]
    owner: String,

    /// Print the status snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Request an interrupt this many milliseconds after submission
    #[arg(long, value_name = "MS")]
    interrupt_after_ms: Option<u64>,

    /// Give up waiting for a terminal state after this many milliseconds
    #[arg(long, value_name = "MS", default_value_t = 300_000)]
    timeout_ms: u64,
}

#[derive(Args)]
struct ConfigCheckArgs {
    /// Orchestrator config (TOML); defaults plus environment overrides when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    let json_output = match &cli.command {
        Commands::Analyze(args) => args.json,
        Commands::ConfigCheck(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await?,
        Commands::ConfigCheck(args) => run_config_check(&args)?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    match path {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let mut config = OrchestratorConfig::default();
            config.apply_env_overrides();
            config.validate().context("Invalid configuration from environment")?;
            Ok(config)
        }
    }
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let toolkit = config
        .toolkit_from_corpus(&args.corpus)
        .await
        .with_context(|| format!("Failed to load corpus {}", args.corpus.display()))?;
    let orchestrator = Orchestrator::in_memory(config, toolkit)?;

    let task_id = match orchestrator.submit(&args.text, &args.owner).await {
        Ok(task_id) => task_id,
        Err(err) => return exit_with_error(&err, args.json),
    };
    let accepted = orchestrator.accepted(&task_id);
    log::info!(
        "Task {} accepted (poll every {}ms)",
        accepted.task_id,
        accepted.polling_interval_ms
    );

    if let Some(delay_ms) = args.interrupt_after_ms {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        if !orchestrator.interrupt(&task_id, CLI_INTERRUPT_REASON).await? {
            log::info!("Task {task_id} finished before the interrupt was requested");
        }
    }

    let snapshot = orchestrator
        .wait_for_terminal(&task_id, Duration::from_millis(args.timeout_ms))
        .await?;
    orchestrator.shutdown();
    if args.json {
        print_stdout(&serialize_json(&snapshot)?)?;
    } else {
        print_stdout(&report::render_snapshot(&snapshot))?;
    }

    if snapshot.status == TaskState::Failed {
        std::process::exit(1);
    }
    Ok(())
}

fn run_config_check(args: &ConfigCheckArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let rules = config.rules().context("Failed to load rule tables")?;
    log::info!("Rule tables {} validated", rules.version);

    let output = if args.json {
        serialize_json(&config)?
    } else {
        toml::to_string_pretty(&config).context("Failed to render config as TOML")?
    };
    print_stdout(output.trim_end())
}

fn exit_with_error(err: &OrchestratorError, json: bool) -> Result<()> {
    let envelope = ErrorEnvelope::from_class(err.class(), err.to_string());
    if json {
        print_stdout(&serialize_json(&envelope)?)?;
    } else {
        eprintln!("Error: {}", envelope.message);
        if let Some(hint) = &envelope.hint {
            eprintln!("Hint: {hint}");
        }
    }
    std::process::exit(1);
}
