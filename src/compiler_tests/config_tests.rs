#![cfg(test)]

use crate::compiler_messages::compiler_errors::ErrorType;
use crate::settings::{CodegenConfig, DEFAULT_HEAP_START, NumberRepr};
use std::io::Write;
use tempfile::NamedTempFile;

fn config_error(source: &str) -> ErrorType {
    match CodegenConfig::from_toml_str(source) {
        Ok(config) => panic!("expected a config error, got {:?}", config),
        Err(error) => error.error_type,
    }
}

#[test]
fn empty_file_gives_the_defaults() {
    let config = CodegenConfig::from_toml_str("").unwrap();
    assert_eq!(config, CodegenConfig::default());
    assert_eq!(config.heap_start, DEFAULT_HEAP_START);
    assert_eq!(config.number_repr, NumberRepr::Native);
}

#[test]
fn keys_override_the_defaults() {
    let config = CodegenConfig::from_toml_str(
        r#"
        number_repr = "bigint"
        list_bounds_check = false
        list_growth_slack = 0
        intrinsics_module = "host"
        "#,
    )
    .unwrap();

    assert_eq!(config.number_repr, NumberRepr::Bigint);
    assert!(!config.list_bounds_check);
    assert_eq!(config.list_growth_slack, 0);
    assert_eq!(config.intrinsics_module, "host");
    assert_eq!(config.heap_start, DEFAULT_HEAP_START);
}

#[test]
fn rejects_malformed_toml() {
    assert_eq!(config_error("number_repr = "), ErrorType::Config);
    assert_eq!(config_error("number_repr = \"float\""), ErrorType::Config);
}

#[test]
fn heap_start_must_be_aligned_and_past_the_head() {
    assert_eq!(config_error("heap_start = 3"), ErrorType::Config);
    assert_eq!(config_error("heap_start = 4"), ErrorType::Config);
    assert!(CodegenConfig::from_toml_str("heap_start = 8").is_ok());
}

#[test]
fn memory_pages_must_cover_the_heap_start() {
    let error = config_error(
        r#"
        heap_start = 131072
        min_memory_pages = 1
        "#,
    );
    assert_eq!(error, ErrorType::Config);
}

#[test]
fn maximum_pages_cannot_be_below_the_minimum() {
    let error = config_error(
        r#"
        min_memory_pages = 4
        max_memory_pages = 3
        "#,
    );
    assert_eq!(error, ErrorType::Config);
}

#[test]
fn loads_from_a_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "list_bounds_check = false").unwrap();
    writeln!(file, "validate_output = false").unwrap();

    let config = CodegenConfig::from_file(file.path()).unwrap();
    assert!(!config.list_bounds_check);
    assert!(!config.validate_output);
}

#[test]
fn missing_file_is_a_config_error() {
    let directory = tempfile::tempdir().unwrap();
    let error = CodegenConfig::from_file(&directory.path().join("codegen.toml")).unwrap_err();

    assert_eq!(error.error_type, ErrorType::Config);
    assert!(error.msg.contains("codegen.toml"));
}

#[test]
fn repl_config_imports_memory() {
    let config = CodegenConfig::repl();

    assert!(config.import_memory);
    assert_eq!(config.heap_start, DEFAULT_HEAP_START);
}

#[test]
fn global_capacity_follows_the_heap_start() {
    let config = CodegenConfig {
        heap_start: 16,
        ..CodegenConfig::default()
    };
    assert_eq!(config.max_global_slot(), 3);
}
