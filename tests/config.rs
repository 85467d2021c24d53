use std::env;
use std::fs;

use ghost_trader::config::{ENV_BASE_URL, ENV_COUNTERPART_ID, ENV_HEADLESS};
use ghost_trader::Config;
use serial_test::serial;
use tempfile::tempdir;
use trade_flow::HostUiAdapter;

fn clear_env() {
    for key in [ENV_COUNTERPART_ID, ENV_BASE_URL, ENV_HEADLESS] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn environment_overrides_the_file() {
    clear_env();
    env::set_var(ENV_COUNTERPART_ID, "2456");
    env::set_var(ENV_BASE_URL, "https://staging.example.test");
    env::set_var(ENV_HEADLESS, "yes");

    let mut config = Config::default();
    config.apply_env_overrides().unwrap();
    clear_env();

    assert_eq!(config.site.counterpart_id, 2456);
    assert!(config.browser.headless);
    assert_eq!(
        config.adapter().destination_url(None),
        "https://staging.example.test/trade.php#step=start&userID=2456"
    );
}

#[test]
#[serial]
fn malformed_override_is_an_error() {
    clear_env();
    env::set_var(ENV_COUNTERPART_ID, "bob");
    let result = Config::default().apply_env_overrides();
    clear_env();

    let err = result.unwrap_err();
    assert!(err.to_string().contains(ENV_COUNTERPART_ID));
}

#[test]
#[serial]
fn no_overrides_leave_the_config_alone() {
    clear_env();
    let mut config = Config::default();
    config.apply_env_overrides().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn yaml_file_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");

    let mut config = Config::default();
    config.site.counterpart_id = 31337;
    config.site.marker = "Parked funds".into();
    config.timing.max_attempts = Some(120);
    config.browser.websocket_url = Some("ws://127.0.0.1:9222/devtools/browser/x".into());
    fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();

    let loaded: Config = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());
    assert_eq!(loaded.flow_timing().max_attempts, 120);
}

#[test]
fn selector_overrides_reach_the_adapter() {
    let config: Config = serde_yaml::from_str(
        "selectors:\n  balance: '#wallet'\n  balance_attribute: data-amount\n",
    )
    .unwrap();
    let source = config.adapter().balance_source();
    assert_eq!(source.selector, "#wallet");
    assert_eq!(source.attribute, "data-amount");
    assert_eq!(config.selectors.target_list, "ul.trades-cont.current");
}
