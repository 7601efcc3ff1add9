// Configuration management module
// TOML settings file, validation and interactive setup

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CONFIG_DIR_ENV, ChatConfig, Config, ConfigError, OllamaConfig, RetrievalConfig, TimeoutConfig,
};
