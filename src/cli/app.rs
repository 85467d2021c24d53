use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};

pub async fn run() -> Result<()> {
    load_local_env_overrides();
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!(
        git = env!("GIT_HASH"),
        built = env!("BUILD_DATE"),
        "Starting ghost-trader v{}",
        env!("CARGO_PKG_VERSION")
    );

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let cli_context = CliContext::new(config, path);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
