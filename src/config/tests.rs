//! Config module tests

use std::io::Write;

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    std::env::remove_var("TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${TEST_VAR_UNSET:-default_value}\"");
    assert_eq!(result, "value = \"default_value\"");

    std::env::set_var("TEST_VAR_SET", "env_value");
    let result = substitute_env_vars("value = \"${TEST_VAR_SET:-default_value}\"");
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${TEST_VAR_MISSING}\"");
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.log.level, "info");
    assert!(config.bridge.is_empty());
}

#[test]
fn test_parse_bridge_topics_mixed_forms() {
    let toml = r##"
[log]
level = "debug"

[[bridge]]
name = "cloud"
address = "cloud.example.com:1883"
topics = [
  "sensors/# out 1 edge/ cloud/",
  '"" in 0 local/ remote/',
  { pattern = "cmd/#", direction = "in", qos = 2, local_prefix = "l/", remote_prefix = "r/" },
  { pattern = "status/+", direction = "sub" },
]
"##;

    let config = Config::parse(toml).unwrap();
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.bridge.len(), 1);

    let bridge = &config.bridge[0];
    assert_eq!(bridge.name, "cloud");
    assert!(bridge.enabled);
    assert_eq!(bridge.topics.len(), 4);

    assert_eq!(bridge.topics[0].pattern.as_deref(), Some("sensors/#"));
    assert_eq!(bridge.topics[0].local_prefix.as_deref(), Some("edge/"));
    assert_eq!(bridge.topics[1].pattern, None);
    assert_eq!(
        bridge.topics[2],
        BridgeTopicConfig {
            pattern: Some("cmd/#".to_string()),
            direction: Direction::In,
            qos: 2,
            local_prefix: Some("l/".to_string()),
            remote_prefix: Some("r/".to_string()),
        }
    );
    assert_eq!(bridge.topics[3].direction, Direction::Sub);
    assert_eq!(bridge.topics[3].qos, 0);
}

#[test]
fn test_parse_rejects_bad_topic_line() {
    let toml = r#"
[[bridge]]
name = "cloud"
topics = ["a/# sideways"]
"#;

    assert!(matches!(Config::parse(toml), Err(ConfigError::Parse(_))));
}

#[test]
fn test_invalid_qos() {
    let toml = r#"
[[bridge]]
name = "cloud"
topics = ["a/# out 3"]
"#;

    let err = Config::parse(toml).unwrap_err().to_string();
    assert!(err.contains("qos must be 0, 1, or 2"));
}

#[test]
fn test_duplicate_bridge_names() {
    let toml = r#"
[[bridge]]
name = "cloud"

[[bridge]]
name = "cloud"
"#;

    let err = Config::parse(toml).unwrap_err().to_string();
    assert!(err.contains("Duplicate bridge name 'cloud'"));
}

#[test]
fn test_empty_bridge_name() {
    let toml = r#"
[[bridge]]
name = ""
"#;

    assert!(matches!(
        Config::parse(toml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_build_registry_skips_disabled() {
    let toml = r##"
[[bridge]]
name = "active"
topics = ["a/# sub 1"]

[[bridge]]
name = "parked"
enabled = false
topics = ["b/# sub 1"]
"##;

    let registry = Config::parse(toml).unwrap().build_registry(None).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.get("active").is_some());
    assert!(registry.get("parked").is_none());
}

#[test]
fn test_build_registry_reports_failing_bridge() {
    let toml = r##"
[[bridge]]
name = "good"
topics = ["a/# out"]

[[bridge]]
name = "bad"
topics = ["a/# sub 0 local/"]
"##;

    match Config::parse(toml).unwrap().build_registry(None) {
        Err(ConfigError::Bridge { name, source }) => {
            assert_eq!(name, "bad");
            assert_eq!(source, BridgeError::InvalidArgument("sub topic with prefix"));
        }
        other => panic!("unexpected result: {:?}", other.map(|r| r.len())),
    }
}

#[test]
fn test_load_config_from_file_with_env_substitution() {
    std::env::set_var("TEST_BRIDGE_PREFIX", "site1/");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r##"
[[bridge]]
name = "edge"
address = "${{TEST_BRIDGE_HOST:-edge.local}}:1883"
topics = ["sensors/# in 1 ${{TEST_BRIDGE_PREFIX}} remote/"]
"##
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.bridge.len(), 1);
    assert_eq!(config.bridge[0].address, "edge.local:1883");
    assert_eq!(
        config.bridge[0].topics[0].local_prefix.as_deref(),
        Some("site1/")
    );

    std::env::remove_var("TEST_BRIDGE_PREFIX");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert!(config.bridge.is_empty());
    assert_eq!(config.log.level, "info");
}
