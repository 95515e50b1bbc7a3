//! Configuration layering: command line over environment over file over defaults

use clap::Parser;
use journey_engine::{Cli, CompletionProviderKind, EngineConfig, EntitlementProviderKind};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

const VARS: &[&str] = &[
    "JOURNEY_ENGINE_DATA_DIR",
    "JOURNEY_ENGINE_COMPLETION_PROVIDER",
    "JOURNEY_ENGINE_ENTITLEMENT_PROVIDER",
    "JOURNEY_ENGINE_SUPPORT_EMAIL",
    "JOURNEY_ENGINE_EXTRA_CRISIS_PHRASES",
    "ANTHROPIC_API_KEY",
];

fn clear_env() {
    for var in VARS {
        unsafe { env::remove_var(var) };
    }
}

fn parse(args: &[&str]) -> EngineConfig {
    let cli = Cli::try_parse_from(
        ["journey-engine"]
            .into_iter()
            .chain(args.iter().copied())
            .chain(["guidance", "1"]),
    )
    .unwrap();
    EngineConfig::from_args(cli.config).unwrap()
}

#[test]
#[serial]
fn env_vars_fill_unset_flags() {
    clear_env();
    unsafe {
        env::set_var("JOURNEY_ENGINE_DATA_DIR", "/var/lib/journeys");
        env::set_var("JOURNEY_ENGINE_COMPLETION_PROVIDER", "mock");
        env::set_var("JOURNEY_ENGINE_ENTITLEMENT_PROVIDER", "disabled");
        env::set_var("JOURNEY_ENGINE_EXTRA_CRISIS_PHRASES", "give up,no way out");
    }

    let config = parse(&[]);
    assert_eq!(config.data_dir, PathBuf::from("/var/lib/journeys"));
    assert_eq!(config.completion_provider, CompletionProviderKind::Mock);
    assert_eq!(config.entitlement_provider, EntitlementProviderKind::Disabled);
    assert_eq!(config.extra_crisis_phrases, vec!["give up", "no way out"]);

    let overridden = parse(&["--data-dir", "/tmp/override"]);
    assert_eq!(overridden.data_dir, PathBuf::from("/tmp/override"));

    clear_env();
}

#[test]
#[serial]
fn api_key_comes_from_environment() {
    clear_env();
    unsafe { env::set_var("ANTHROPIC_API_KEY", "sk-env") };

    let config = parse(&[]);
    assert_eq!(config.completion_provider, CompletionProviderKind::Anthropic);
    assert_eq!(config.completion().api_key.as_deref(), Some("sk-env"));

    clear_env();
    let cli = Cli::try_parse_from(["journey-engine", "guidance", "1"]).unwrap();
    assert!(EngineConfig::from_args(cli.config).is_err());
}

#[test]
#[serial]
fn json_file_sits_below_env() {
    clear_env();
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
            "completion_provider": "unavailable",
            "support_email": "help@example.org",
            "completion_timeout_secs": 5,
            "conversation_list_limit": 20
        }}"#
    )
    .unwrap();
    unsafe { env::set_var("JOURNEY_ENGINE_SUPPORT_EMAIL", "care@example.org") };

    let path = file.path().to_string_lossy().to_string();
    let config = parse(&["--config", &path]);
    assert_eq!(config.completion_provider, CompletionProviderKind::Unavailable);
    assert_eq!(config.support_email, "care@example.org");
    assert_eq!(config.completion_timeout, Duration::from_secs(5));
    assert_eq!(config.service_settings().conversation_list_limit, 20);

    clear_env();
}

#[test]
#[serial]
fn unknown_file_keys_are_rejected() {
    clear_env();
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "completion_provider: mock\nworkspace_root: /tmp").unwrap();

    let path = file.path().to_string_lossy().to_string();
    let cli = Cli::try_parse_from(["journey-engine", "--config", &path, "guidance", "1"]).unwrap();
    let err = EngineConfig::from_args(cli.config).unwrap_err();
    assert!(format!("{err:#}").contains("workspace_root"));
}
