use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use osh_collector::collector::collect_to_disk;
use osh_collector::config::{ConfigLoader, ResolvedConfig};
use osh_collector::error::CollectorError;
use osh_collector::osf::OsfHttpClient;
use osh_collector::output::{HumanOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "osh-collect")]
#[command(about = "Collect OSF metadata for open-source-hardware projects into one JSON dataset")]
#[command(version, author)]
struct Cli {
    /// JSON config file (defaults to ./osh-collector.json when present)
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Seed file, one OSF url or id per line
    #[arg(long)]
    input: Option<Utf8PathBuf>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    checkpoint: Option<Utf8PathBuf>,

    #[arg(long)]
    failures: Option<Utf8PathBuf>,

    /// Minimum spacing between any two requests
    #[arg(long)]
    delay_ms: Option<u64>,

    #[arg(long)]
    checkpoint_every: Option<usize>,

    #[arg(long)]
    max_retries: Option<usize>,

    #[arg(long)]
    base_url: Option<String>,

    /// Leave the checkpoint file in place after the dataset is written
    #[arg(long)]
    keep_checkpoint: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CollectorError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CollectorError) -> u8 {
    match error {
        CollectorError::ConfigRead(_)
        | CollectorError::ConfigParse(_)
        | CollectorError::SeedRead { .. } => 2,
        CollectorError::CheckpointCorrupt { .. } | CollectorError::CheckpointMismatch(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let config = apply_overrides(ConfigLoader::resolve(cli.config.as_deref())?, &cli);
    let api = OsfHttpClient::new(&config)?;
    let summary = collect_to_disk(api, &config)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_summary(&summary),
    }
    Ok(())
}

fn apply_overrides(mut config: ResolvedConfig, cli: &Cli) -> ResolvedConfig {
    if let Some(input) = &cli.input {
        config.input = input.clone();
    }
    if let Some(output) = &cli.output {
        config.output = output.clone();
    }
    if let Some(checkpoint) = &cli.checkpoint {
        config.checkpoint = checkpoint.clone();
    }
    if let Some(failures) = &cli.failures {
        config.failures = failures.clone();
    }
    if let Some(delay) = cli.delay_ms {
        config.request_interval = Duration::from_millis(delay);
    }
    if let Some(every) = cli.checkpoint_every {
        config.checkpoint_every = every.max(1);
    }
    if let Some(retries) = cli.max_retries {
        config.retry.max_retries = retries;
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    config.keep_checkpoint |= cli.keep_checkpoint;
    config
}
