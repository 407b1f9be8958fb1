//! Unit tests for bootstrap configuration and graceful degradation
//!
//! Tests that manipulate CAELUM_ROOT_FOLDER or CAELUM_ROOT are marked with
//! #[serial] so they never race each other on process environment.

use caelum_common::config::{
    load_or_default, load_toml_config, CompiledDefaults, RootFolderInitializer,
    RootFolderResolver, TomlConfig, ROOT_ENV, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn clear_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(ROOT_ENV);
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.root_folder.to_string_lossy().contains("caelum"));
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_env();

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/caelum-from-env");

    let root_folder = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/caelum-from-cli")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/caelum-from-cli"));

    clear_env();
}

#[test]
#[serial]
fn test_resolver_root_folder_var_takes_precedence() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/caelum-priority-1");
    env::set_var(ROOT_ENV, "/tmp/caelum-priority-2");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/caelum-priority-1"));

    clear_env();
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    clear_env();
    env::set_var(ROOT_ENV, "/tmp/caelum-env-root");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/caelum-toml-root")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new("test-module").with_toml(&toml).resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/caelum-env-root"));

    env::remove_var(ROOT_ENV);
    let root_folder = RootFolderResolver::new("test-module").with_toml(&toml).resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/caelum-toml-root"));
}

#[test]
fn test_initializer_database_path() {
    let root = PathBuf::from("/tmp/caelum-test-root");
    let initializer = RootFolderInitializer::new(root.clone());
    assert_eq!(initializer.database_path(), root.join("caelum.db"));
}

#[test]
fn test_initializer_idempotent_directory_creation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(root.is_dir());
    assert!(!initializer.database_exists());
}

#[test]
fn test_full_toml_parses() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
root_folder = "/srv/caelum"
port = 6100

[logging]
level = "debug"

[relay]
endpoint = "https://relay.example/mint"
token = "secret-token"
mode = "sig"

[stats]
webhook_secret = "hook"

[notifications]
mint_webhook = "https://hooks.example/mint"

[mint]
chain_id = 8453
verifying_contract = "0x1111111111111111111111111111111111111111"
"#
    )
    .unwrap();

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/caelum")));
    assert_eq!(config.port, Some(6100));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.relay.mode.as_deref(), Some("sig"));
    assert_eq!(config.stats.webhook_secret.as_deref(), Some("hook"));
    assert_eq!(config.notifications.reflection_webhook, None);
    assert_eq!(config.mint.chain_id, Some(8453));
}

#[test]
fn test_partial_toml_uses_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 7000").unwrap();

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.port, Some(7000));
    assert_eq!(config.logging.level, "info");
    assert!(config.relay.endpoint.is_none());
}

#[test]
fn test_explicit_missing_file_is_error() {
    let missing = PathBuf::from("/tmp/caelum-definitely-missing-config.toml");
    assert!(load_or_default("caelum-shards", Some(&missing)).is_err());
}

#[test]
fn test_missing_default_file_falls_back() {
    let config = load_or_default("caelum-nonexistent-module-xyz", None).unwrap();
    assert_eq!(config, TomlConfig::default());
}
