/// Environment and JSON configuration of ScopeOptions

use lineage_di::config::{ENV_INHERIT_KEYS, ENV_MAX_ALIAS_DEPTH, ENV_REPORT_FAILURES};
use lineage_di::{DiError, ScopeOptions};
use serial_test::serial;
use std::env;

fn clear_env() {
    for var in [ENV_MAX_ALIAS_DEPTH, ENV_INHERIT_KEYS, ENV_REPORT_FAILURES] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_env_unset_keeps_values() {
    clear_env();
    let options = ScopeOptions::default().with_max_alias_depth(5).from_env().unwrap();
    assert_eq!(options.max_alias_depth, 5);
    assert!(options.report_failures);
}

#[test]
#[serial]
fn test_env_overrides_apply() {
    clear_env();
    env::set_var(ENV_MAX_ALIAS_DEPTH, " 7 ");
    env::set_var(ENV_INHERIT_KEYS, "app::TraceId, ,app::User");
    env::set_var(ENV_REPORT_FAILURES, "off");

    let options = ScopeOptions::default().from_env().unwrap();
    clear_env();

    assert_eq!(options.max_alias_depth, 7);
    assert_eq!(options.inherit_keys, vec!["app::TraceId".to_string(), "app::User".to_string()]);
    assert!(!options.report_failures);
}

#[test]
#[serial]
fn test_env_malformed_values_are_config_errors() {
    clear_env();
    env::set_var(ENV_MAX_ALIAS_DEPTH, "deep");
    let err = ScopeOptions::default().from_env().unwrap_err();
    clear_env();
    assert!(matches!(err, DiError::Config(ref msg) if msg.contains(ENV_MAX_ALIAS_DEPTH)));

    env::set_var(ENV_REPORT_FAILURES, "perhaps");
    let err = ScopeOptions::default().from_env().unwrap_err();
    clear_env();
    assert!(matches!(err, DiError::Config(_)));
}

#[test]
#[serial]
fn test_env_zero_depth_fails_validation() {
    clear_env();
    env::set_var(ENV_MAX_ALIAS_DEPTH, "0");
    let result = ScopeOptions::default().from_env();
    clear_env();
    assert!(matches!(result, Err(DiError::Config(_))));
}

#[cfg(feature = "config")]
#[test]
fn test_json_round_trip_keeps_defaults() {
    let options = ScopeOptions::from_json(r#"{ "inherit_keys": ["app::TraceId"] }"#).unwrap();
    assert_eq!(options.max_alias_depth, ScopeOptions::default().max_alias_depth);
    assert_eq!(options.inherit_keys, vec!["app::TraceId".to_string()]);

    let json = options.to_json().unwrap();
    assert_eq!(ScopeOptions::from_json(&json).unwrap(), options);
}

#[cfg(feature = "config")]
#[test]
fn test_json_rejects_invalid() {
    assert!(matches!(ScopeOptions::from_json("{ not json"), Err(DiError::Config(_))));
    assert!(matches!(
        ScopeOptions::from_json(r#"{ "max_alias_depth": 0 }"#),
        Err(DiError::Config(_))
    ));
}
