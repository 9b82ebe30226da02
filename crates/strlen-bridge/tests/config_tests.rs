//! Configuration loading and validation tests

use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use strlen_bridge::{BridgeConfig, ConfigError};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join("bridge.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_full_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
library = "measure"
symbol = "measure_utf8"
search_paths = ["/opt/app/lib", "vendor/lib"]
system_search_paths = false
"#,
    );

    let config = BridgeConfig::load_from_file(&path).unwrap();

    assert_eq!(
        config,
        BridgeConfig {
            library: "measure".to_string(),
            symbol: "measure_utf8".to_string(),
            search_paths: vec![PathBuf::from("/opt/app/lib"), PathBuf::from("vendor/lib")],
            system_search_paths: false,
        }
    );
}

#[test]
fn test_missing_fields_take_defaults() {
    let config = BridgeConfig::from_toml_str("search_paths = [\"/opt/lib\"]").unwrap();
    assert_eq!(config.library, "string_length");
    assert_eq!(config.symbol, "calculate_string_length_from_rust");
    assert!(config.system_search_paths);
    assert_eq!(config.search_paths, vec![PathBuf::from("/opt/lib")]);
}

#[test]
fn test_empty_document_is_default() {
    assert_eq!(BridgeConfig::from_toml_str("").unwrap(), BridgeConfig::default());
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");
    match BridgeConfig::load_from_file(&path) {
        Err(ConfigError::NotFound(missing)) => assert_eq!(missing, path),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_unknown_field_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "libary = \"typo\"\n");
    match BridgeConfig::load_from_file(&path) {
        Err(ConfigError::TomlParseError { file, .. }) => assert_eq!(file, path),
        other => panic!("expected TomlParseError, got {:?}", other),
    }
}

#[test]
fn test_invalid_toml_syntax() {
    assert!(matches!(
        BridgeConfig::from_toml_str("library = "),
        Err(ConfigError::TomlParseError { .. })
    ));
}

// ============================================================================
// Validation
// ============================================================================

#[rstest]
#[case("library = \"\"", "library")]
#[case("library = \"/usr/lib/libstring_length.so\"", "library")]
#[case("library = \"lib\\\\string_length\"", "library")]
#[case("symbol = \"\"", "symbol")]
#[case("symbol = \"9lives\"", "symbol")]
#[case("symbol = \"has-dash\"", "symbol")]
fn test_invalid_values(#[case] content: &str, #[case] expected_field: &str) {
    match BridgeConfig::from_toml_str(content) {
        Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected_field),
        other => panic!("expected InvalidValue for {}, got {:?}", expected_field, other),
    }
}

#[test]
fn test_invalid_value_message() {
    let err = BridgeConfig::from_toml_str("symbol = \"has-dash\"").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Invalid value for 'symbol': 'has-dash' is not a C identifier");
}

#[test]
fn test_default_config_serializes_without_search_paths() {
    let rendered = toml::to_string(&BridgeConfig::default()).unwrap();
    insta::assert_snapshot!(rendered, @r###"
    library = "string_length"
    symbol = "calculate_string_length_from_rust"
    system_search_paths = true
    "###);
}
