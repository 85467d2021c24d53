//! Application configuration.
//!
//! Persisted as YAML. Every section has defaults, so an empty file (or no
//! file at all) is a valid configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use trade_flow::adapter::{DEFAULT_BASE_URL, DEFAULT_MARKER};
use trade_flow::{FlowTiming, SelectorSet, TornUiAdapter};
use url::Url;

use crate::errors::GhostTraderError;

pub const ENV_COUNTERPART_ID: &str = "GHOST_TRADER_COUNTERPART_ID";
pub const ENV_BASE_URL: &str = "GHOST_TRADER_BASE_URL";
pub const ENV_HEADLESS: &str = "GHOST_TRADER_HEADLESS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub selectors: SelectorSet,
    pub timing: TimingConfig,
    pub storage: StorageConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Player the ghost trade is opened with
    pub counterpart_id: u64,
    pub marker: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            counterpart_id: 1,
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// Workflow timings in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_delay_ms: u64,
    pub list_wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub add_control_timeout_ms: u64,
    pub confirm_settle_ms: u64,
    /// Attempts per polling step; unset polls until cancelled.
    pub max_attempts: Option<u64>,
    /// Wall-clock bound per polling step.
    pub max_duration_ms: Option<u64>,
    pub stall_log_every: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let timing = FlowTiming::default();
        Self {
            settle_delay_ms: millis(timing.settle_delay),
            list_wait_timeout_ms: millis(timing.list_wait_timeout),
            poll_interval_ms: millis(timing.poll_interval),
            add_control_timeout_ms: millis(timing.add_control_timeout),
            confirm_settle_ms: millis(timing.confirm_settle),
            max_attempts: None,
            max_duration_ms: None,
            stall_log_every: timing.stall_log_every,
        }
    }
}

impl TimingConfig {
    pub fn to_flow_timing(&self) -> FlowTiming {
        FlowTiming {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            list_wait_timeout: Duration::from_millis(self.list_wait_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            add_control_timeout: Duration::from_millis(self.add_control_timeout_ms),
            confirm_settle: Duration::from_millis(self.confirm_settle_ms),
            max_attempts: self.max_attempts.unwrap_or(u64::MAX),
            max_duration: self.max_duration_ms.map(Duration::from_millis),
            stall_log_every: self.stall_log_every,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub intent_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            intent_key: intent_store::DEFAULT_INTENT_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    /// Attach to a running browser instead of launching one
    pub websocket_url: Option<String>,
    pub pump_interval_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            user_data_dir: None,
            websocket_url: None,
            pump_interval_ms: 100,
        }
    }
}

impl Config {
    /// Apply `GHOST_TRADER_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), GhostTraderError> {
        if let Ok(raw) = env::var(ENV_COUNTERPART_ID) {
            self.site.counterpart_id = raw.trim().parse().map_err(|_| {
                GhostTraderError::config(format!("{ENV_COUNTERPART_ID}={raw:?} is not a player id"))
            })?;
            info!(counterpart_id = self.site.counterpart_id, "counterpart id from environment");
        }
        if let Ok(raw) = env::var(ENV_BASE_URL) {
            self.site.base_url = raw.trim().to_string();
            info!(base_url = %self.site.base_url, "base url from environment");
        }
        if let Ok(raw) = env::var(ENV_HEADLESS) {
            self.browser.headless = parse_flag(&raw).ok_or_else(|| {
                GhostTraderError::config(format!("{ENV_HEADLESS}={raw:?} is not a boolean"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), GhostTraderError> {
        if self.site.counterpart_id == 0 {
            return Err(GhostTraderError::config("site.counterpart_id must be positive"));
        }
        Url::parse(&self.site.base_url).map_err(|err| {
            GhostTraderError::config(format!("site.base_url {:?}: {err}", self.site.base_url))
        })?;
        if self.site.marker.trim().is_empty() {
            return Err(GhostTraderError::config("site.marker cannot be empty"));
        }
        if self.storage.intent_key.trim().is_empty() {
            return Err(GhostTraderError::config("storage.intent_key cannot be empty"));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(GhostTraderError::config("timing.poll_interval_ms must be positive"));
        }
        if self.timing.max_attempts == Some(0) {
            return Err(GhostTraderError::config("timing.max_attempts must be positive"));
        }
        let selectors = [
            ("balance", &self.selectors.balance),
            ("balance_attribute", &self.selectors.balance_attribute),
            ("target_list", &self.selectors.target_list),
            ("target_item", &self.selectors.target_item),
            ("view_link", &self.selectors.view_link),
            ("description", &self.selectors.description),
            ("submit", &self.selectors.submit),
            ("add_quantity", &self.selectors.add_quantity),
            ("quantity_input", &self.selectors.quantity_input),
            ("confirm", &self.selectors.confirm),
        ];
        for (name, value) in selectors {
            if value.trim().is_empty() {
                return Err(GhostTraderError::config(format!(
                    "selectors.{name} cannot be empty"
                )));
            }
        }
        Ok(())
    }

    pub fn adapter(&self) -> TornUiAdapter {
        TornUiAdapter::new(self.site.counterpart_id)
            .with_base_url(self.site.base_url.clone())
            .with_marker(self.site.marker.clone())
            .with_selectors(self.selectors.clone())
    }

    pub fn flow_timing(&self) -> FlowTiming {
        self.timing.to_flow_timing()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_workflow_defaults() {
        let config = Config::default();
        assert_eq!(config.flow_timing(), FlowTiming::default());
        assert_eq!(config.storage.intent_key, "ghostTradeAmount");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config: Config = serde_yaml::from_str(
            "site:\n  counterpart_id: 2456\ntiming:\n  settle_delay_ms: 250\n  max_attempts: 40\n",
        )
        .unwrap();
        assert_eq!(config.site.counterpart_id, 2456);
        assert_eq!(config.site.marker, DEFAULT_MARKER);
        let timing = config.flow_timing();
        assert_eq!(timing.settle_delay, Duration::from_millis(250));
        assert_eq!(timing.poll_interval, Duration::from_millis(500));
        assert_eq!(timing.max_attempts, 40);
        assert_eq!(config.selectors, SelectorSet::default());
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let mut config = Config::default();
        config.site.counterpart_id = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.site.base_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.selectors.quantity_input = " ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("selectors.quantity_input"));
    }

    #[test]
    fn adapter_carries_site_settings() {
        let mut config = Config::default();
        config.site.counterpart_id = 99;
        config.site.base_url = "https://example.test/".into();
        let adapter = config.adapter();
        assert_eq!(adapter.counterpart_id(), 99);
        use trade_flow::HostUiAdapter;
        assert_eq!(
            adapter.destination_url(None),
            "https://example.test/trade.php#step=start&userID=99"
        );
    }

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
