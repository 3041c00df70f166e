use std::path::PathBuf;

use clap::Parser;
use pin_rotate::replay::{self, ReplayError, Scenario};
use pin_rotate::settings::{ConfigError, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pin-rotate", about = "Replay pointer rotation scenarios against a scripted placement host")]
struct Cli {
    /// Scenario file (JSON).
    scenario: PathBuf,

    /// Take engine settings from `PIN_ROTATE_*` environment variables instead
    /// of the scenario file.
    #[arg(long)]
    env_settings: bool,

    /// Force diagnostic engine logs on.
    #[arg(long, env = "PIN_ROTATE_DEBUG")]
    debug: bool,

    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pin_rotate=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut scenario = Scenario::load(&cli.scenario)?;
    if cli.env_settings {
        scenario.settings = Settings::from_env()?;
    }
    if cli.debug {
        scenario.settings.debug_logs = true;
    }
    tracing::info!(
        path = %cli.scenario.display(),
        events = scenario.events.len(),
        workflow = ?scenario.target.workflow,
        "replaying scenario"
    );

    let report = replay::run(&scenario);
    let out = if cli.pretty { serde_json::to_string_pretty(&report)? } else { serde_json::to_string(&report)? };
    println!("{out}");
    Ok(())
}
