use super::load_existing_config as load_existing_config_impl;
use super::*;
use crate::config::settings::CONFIG_DIR_ENV;
use serial_test::serial;
use tempfile::TempDir;

#[test]
#[serial]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    unsafe { std::env::set_var(CONFIG_DIR_ENV, temp_dir.path()) };

    let config = load_existing_config_impl().expect("config loaded successfully");
    unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.model.is_empty());
    assert!(config.retrieval.top_k > 0);
}

#[test]
#[serial]
fn broken_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "this is [not toml")
        .expect("should write config");
    unsafe { std::env::set_var(CONFIG_DIR_ENV, temp_dir.path()) };

    let config = load_existing_config_impl().expect("config loaded successfully");
    unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
#[serial]
fn api_key_description() {
    unsafe { std::env::remove_var(API_KEY_ENV) };

    let mut chat = ChatConfig::default();
    assert!(describe_api_key(&chat).contains("not set"));

    unsafe { std::env::set_var(API_KEY_ENV, "sk-from-env") };
    assert!(describe_api_key(&chat).contains(API_KEY_ENV));

    chat.set_api_key("sk-from-file");
    assert!(describe_api_key(&chat).contains("config file"));
    unsafe { std::env::remove_var(API_KEY_ENV) };
}
