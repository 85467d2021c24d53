use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ghost_trader::Config;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const APP_DIR: &str = "ghost-trader";

/// Export `KEY=VALUE` lines of `config/local.env` unless already set.
pub fn load_local_env_overrides() {
    let path = Path::new("config/local.env");
    if !path.exists() {
        return;
    }

    match stdfs::read_to_string(path) {
        Ok(contents) => {
            for (idx, raw_line) in contents.lines().enumerate() {
                let line = raw_line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((key, value)) = line.split_once('=') else {
                    warn!(line = idx + 1, "invalid local.env entry; skipping");
                    continue;
                };
                let key = key.trim();
                if key.is_empty() || env::var(key).is_ok() {
                    continue;
                }
                env::set_var(key, unescape_value(value.trim()));
            }
            info!(path = %path.display(), "Loaded environment overrides from local.env");
        }
        Err(err) => {
            warn!(path = %path.display(), ?err, "failed to read local.env overrides");
        }
    }
}

/// Logs go to stderr so command output stays pipeable.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// `--config`, else `./config/config.yaml`, else the user config directory.
pub fn config_path(explicit: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path.clone();
    }
    let local_config = PathBuf::from("config/config.yaml");
    if local_config.exists() {
        return local_config;
    }
    match dirs::config_dir() {
        Some(mut path) => {
            path.push(APP_DIR);
            path.push("config.yaml");
            path
        }
        None => local_config,
    }
}

pub async fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = config_path(explicit);

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded configuration from: {}", config_path.display());
        config
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Config::default()
    };

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}
