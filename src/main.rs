//! Hanna Cloud poller - command line entry point
//!
//! - `verify`: check credentials with a single login
//! - `once`: run one poll cycle and print the host entities as JSON
//! - `run`: poll on the configured interval until Ctrl-C

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hanna_cloud_rust::{
    config::credentials::Credentials,
    logging::{init_logging, LogConfig},
    services::{describe, validate_setup, CycleOutcome, PollCoordinator},
    ServerConfig, UpdateInterval,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Hanna Cloud poller configuration
#[derive(Parser, Debug)]
#[command(name = "hanna-cloud-poller")]
#[command(about = "Poll Hanna Cloud water-quality controllers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Hanna Cloud account email
    #[arg(long, global = true, env = "HANNA_EMAIL")]
    email: Option<String>,

    /// Hanna Cloud account password
    #[arg(long, global = true, env = "HANNA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Update interval in minutes (1-60)
    #[arg(long, global = true)]
    interval: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate credentials with a single login
    Verify,
    /// Run a single poll cycle and print the entities
    Once,
    /// Poll until interrupted
    Run,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::from_env()?,
        };

        if let Some(minutes) = self.interval {
            config.polling.update_interval = UpdateInterval::from_minutes(minutes)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn credentials(&self) -> anyhow::Result<Credentials> {
        let (Some(email), Some(password)) = (&self.email, &self.password) else {
            bail!("Credentials required. Use --email/--password or set HANNA_EMAIL/HANNA_PASSWORD");
        };
        Ok(Credentials::new(email.as_str(), password.as_str())?)
    }

    fn initialize_logging(&self, config: &ServerConfig) -> anyhow::Result<()> {
        let mut log_config = LogConfig::from_env().with_level_name(&config.logging.level);
        if let Some(file) = &config.logging.file {
            log_config.file_path = Some(PathBuf::from(file));
        }
        if !config.logging.timestamps {
            log_config.timestamps = false;
        }
        if self.debug {
            log_config.level = tracing::Level::DEBUG;
        }
        init_logging(log_config).map_err(|e| anyhow::anyhow!("initializing logging: {e}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    cli.initialize_logging(&config)?;
    let credentials = cli.credentials()?;

    match cli.command {
        Command::Verify => {
            let setup = validate_setup(&config, &credentials)
                .await
                .context("validating credentials")?;
            println!("{}", setup.title);
        }
        Command::Once => {
            let coordinator = PollCoordinator::connect(&config, credentials)?;
            if let CycleOutcome::Failed(kind) = coordinator.run_cycle().await {
                let status = coordinator.status().await;
                bail!(
                    "poll cycle failed ({kind}): {}",
                    status.last_error.unwrap_or_default()
                );
            }
            let entities = describe(&coordinator.host_view().await);
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
        Command::Run => {
            let coordinator = PollCoordinator::connect(&config, credentials)?;
            let shutdown = CancellationToken::new();

            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            info!("Shutdown requested");
                            shutdown.cancel();
                        }
                        Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
                    }
                }
            });

            info!(
                "Polling Hanna Cloud every {} minutes",
                coordinator.update_interval().minutes()
            );
            coordinator.run(shutdown).await;

            let status = coordinator.status().await;
            info!(
                "Stopped; last success {:?}, {} consecutive failures",
                status.last_success, status.consecutive_failures
            );
        }
    }

    Ok(())
}
