use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use atrun::{
    accounts::{AccountLookup, SystemAccounts},
    config::{Config, defaults::DEFAULT_CONFIG_FILE},
    job_scheduling::{JobExecutor, LoadGate, SpoolScanner, SystemLoad},
    logging,
    privileges::{Identity, Privileges, SystemCredentials},
};

#[derive(Parser)]
#[command(name = "atrun")]
#[command(version)]
#[command(about = "Run jobs queued for later execution")]
#[command(long_about = None)]
struct Cli {
    /// Log to stderr at debug level instead of the system log
    #[arg(short = 'd', long)]
    debug: bool,

    /// Run deferred jobs only while the load average is below this value
    #[arg(short = 'l', long = "load", value_name = "THRESHOLD", allow_hyphen_values = true)]
    load: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(&cli);
    logging::init(config.as_ref().map_or(cli.debug, |config| config.debug));

    match config.and_then(|config| run(&config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Configuration file with command-line overrides applied
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_from_file(&cli.config)
        .with_context(|| format!("Cannot load configuration from {}", cli.config))?;
    config.debug = cli.debug;
    if let Some(load) = cli.load.as_deref() {
        config.load.override_from_arg(load);
    }
    Ok(config)
}

fn run(config: &Config) -> Result<()> {
    let daemon = SystemAccounts
        .by_name(&config.execution.daemon_user)
        .with_context(|| format!("Cannot look up user {}", config.execution.daemon_user))?
        .ok_or_else(|| anyhow!("Unknown daemon user {}", config.execution.daemon_user))?;
    let privileges = Privileges::relinquish(
        SystemCredentials,
        Identity {
            uid: daemon.uid,
            gid: daemon.gid,
        },
    )?;

    let gate = LoadGate::new(SystemLoad, config.load.threshold);
    let scanner = SpoolScanner::new(&config.spool.job_dir, &privileges, gate);
    let mut executor = JobExecutor::new(config, &privileges, SystemAccounts);

    let report = scanner.scan(&mut executor, Utc::now())?;
    info!(
        "Scan complete: {} started, {} swept, {} ignored, batch {:?}",
        report.launched.len(),
        report.swept.len(),
        report.ignored,
        report.batch
    );
    Ok(())
}
