#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # autofish
//!
//! Unattended fishing client. Loads config, obtains credentials, looks up the
//! splash sound id for the configured version, then hands over to the
//! reconnect loop until interrupted.
//!
//! ## Signals
//!
//! | Signal  | Effect                                               |
//! |---------|------------------------------------------------------|
//! | SIGINT  | stop, print the report, exit 0                       |
//! | SIGTERM | same as SIGINT                                       |
//! | SIGUSR1 | go offline for `[idle] offline_secs`, or extend it   |
//!
//! ## Exit codes
//!
//! - `0`: stopped by signal or by the wear ceiling
//! - `1`: bad config, credentials, game data, host not found, or refused connection

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use autofish::auth;
use autofish::config::Config;
use autofish::control;
use autofish::error::FatalError;
use autofish::gamedata;
use autofish::reconnect::Reconnector;
use autofish::report::SessionReport;
use autofish::resolve::HostResolver;
use autofish::session::policy::SessionPolicy;
use autofish::session::StopCause;
use autofish::transport::bridge::BridgeTransport;

/// Unattended fishing client.
#[derive(Parser)]
#[command(name = "autofish", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    config: Option<String>,
    /// Path to the sound id cache (overrides `[options] gamedata_path`).
    #[arg(long)]
    gamedata: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("autofish: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = cli.gamedata {
        config.options.gamedata_path = path;
    }

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("autofish v{} starting", env!("CARGO_PKG_VERSION"));

    match run(&config).await {
        Ok((cause, report)) => {
            info!("Ending session ({cause:?})");
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> Result<(StopCause, SessionReport), FatalError> {
    let (handle, mut control) = control::channel();
    control::install_signal_handlers(handle);
    let mut report = SessionReport::start();

    let startup = async {
        let credentials = auth::obtain_credentials(config).await?;
        info!("Logged in as {}", credentials.username);
        let primary_event_id = gamedata::primary_event_id(config).await?;
        info!(
            "Version {} uses splash sound id {primary_event_id}",
            config.host.version
        );
        Ok::<_, FatalError>((credentials, primary_event_id))
    };
    let Some(startup) = control.unless_stopped(startup).await else {
        info!("Interrupted during startup");
        report.finish(StopCause::Interrupted);
        return Ok((StopCause::Interrupted, report));
    };
    let (credentials, primary_event_id) = startup?;

    let policy = SessionPolicy::from_config(config, primary_event_id);
    let resolver = HostResolver::from_config(config, &credentials);
    let transport = BridgeTransport::new(
        config.transport.bridge_url.clone(),
        config.host.version.clone(),
    );

    let mut reconnector = Reconnector::new(
        resolver,
        transport,
        policy,
        credentials,
        Duration::from_secs(config.resolver.retry_delay_secs),
    );
    let cause = reconnector.run(&mut report, &mut control).await?;
    report.finish(cause);
    Ok((cause, report))
}
