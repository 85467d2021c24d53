use std::path::Path;

use crate::cli::context::CliContext;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use ghost_trader::Config;
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file plus environment overrides)
    Show,

    /// Write the default configuration to the config path
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set a value in the configuration file, e.g. `site.counterpart_id 2456`
    Set {
        /// Dotted configuration key
        key: String,

        /// Configuration value (JSON, or a bare string)
        value: String,
    },

    /// Get a value from the configuration file
    Get {
        /// Dotted configuration key
        key: String,
    },

    /// Validate the configuration file
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            println!("Effective configuration ({}):", path.display());
            println!("{}", serde_yaml::to_string(ctx.config())?);
        }
        ConfigAction::Init { force } => {
            if !force && fs::try_exists(&path).await? {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            save_config_file(&path, &Config::default()).await?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Set { key, value } => {
            let config = load_config_file(&path).await?;
            let mut json = serde_json::to_value(&config)?;
            let segments = split_key(&key)?;
            if get_json_value(&json, &segments).is_none() {
                bail!("{} is not a configuration key", key);
            }
            set_json_value(&mut json, &segments, parse_cli_value(&value))?;
            let config: Config = serde_json::from_value(json)
                .with_context(|| format!("{key} cannot be set to {value:?}"))?;
            config.validate()?;
            save_config_file(&path, &config).await?;
            info!("Updated configuration key {}", key);
            println!("Saved configuration to {}", path.display());
        }
        ConfigAction::Get { key } => {
            let config = load_config_file(&path).await?;
            let json = serde_json::to_value(&config)?;
            let segments = split_key(&key)?;
            if let Some(value) = get_json_value(&json, &segments) {
                print!("{}", serde_yaml::to_string(value)?);
            } else {
                bail!("{} not found in configuration", key);
            }
        }
        ConfigAction::Validate => {
            if fs::try_exists(&path).await? {
                let config = load_config_file(&path).await?;
                config.validate()?;
                println!("Configuration file {} is valid", path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
        }
    }

    Ok(())
}

async fn load_config_file(path: &Path) -> Result<Config> {
    if fs::try_exists(path).await? {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config =
            serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

async fn save_config_file(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let serialized = serde_yaml::to_string(config)?;
    fs::write(path, serialized)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn parse_cli_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn set_json_value(target: &mut JsonValue, path: &[&str], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry((*segment).to_string())
            .or_insert(JsonValue::Null);
    }
    ensure_object(current, last)?.insert((*last).to_string(), value);
    Ok(())
}

fn ensure_object<'a>(
    value: &'a mut JsonValue,
    segment: &str,
) -> Result<&'a mut Map<String, JsonValue>> {
    if value.is_null() {
        *value = JsonValue::Object(Map::new());
    }
    match value.as_object_mut() {
        Some(map) => Ok(map),
        None => bail!(
            "{} resolves to a non-object value; cannot assign nested configuration",
            segment
        ),
    }
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_nested_keys() {
        let mut doc = json!({});
        set_json_value(&mut doc, &["site", "counterpart_id"], JsonValue::from(2456)).unwrap();
        set_json_value(
            &mut doc,
            &["timing", "settle_delay_ms"],
            JsonValue::from(1500),
        )
        .unwrap();
        assert_eq!(
            get_json_value(&doc, &["site", "counterpart_id"]),
            Some(&JsonValue::from(2456))
        );
        assert_eq!(
            get_json_value(&doc, &["timing", "settle_delay_ms"]),
            Some(&JsonValue::from(1500))
        );
    }

    #[test]
    fn scalar_parents_are_rejected() {
        let mut doc = json!({ "site": 3 });
        assert!(set_json_value(&mut doc, &["site", "marker"], JsonValue::from("x")).is_err());
    }

    #[test]
    fn values_parse_as_json_then_string() {
        assert_eq!(parse_cli_value("true"), JsonValue::Bool(true));
        assert_eq!(parse_cli_value("Auto Ghost"), JsonValue::from("Auto Ghost"));
        assert!(split_key("..").is_err());
    }
}
