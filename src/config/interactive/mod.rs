#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::{ChatConfig, Config, ConfigError, OllamaConfig};
use crate::chat::{API_KEY_ENV, resolve_api_key};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Doc RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embedding generation.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama)? {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before adding documents.");
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Chat Configuration").bold().yellow());
    eprintln!("Answers are generated by an OpenAI-compatible chat completion API.");
    eprintln!();
    configure_chat(&mut config.chat)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!(
        "  Retry Attempts: {}",
        style(config.ollama.retry_attempts).cyan()
    );
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} words",
        style(config.chunking.chunk_size).cyan()
    );
    eprintln!("  Overlap: {} words", style(config.chunking.overlap).cyan());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!("{}", style("Chat Settings:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.chat.endpoint).cyan());
    eprintln!("  Model: {}", style(&config.chat.model).cyan());
    eprintln!("  Temperature: {}", style(config.chat.temperature).cyan());
    eprintln!("  Max Tokens: {}", style(config.chat.max_tokens).cyan());
    eprintln!("  API Key: {}", describe_api_key(&config.chat));

    eprintln!();
    eprintln!("{}", style("Timeouts:").bold().yellow());
    eprintln!(
        "  Initialization: {}s",
        style(config.timeouts.initialization_secs).cyan()
    );
    eprintln!(
        "  Embedding: {}s",
        style(config.timeouts.embedding_secs).cyan()
    );
    eprintln!(
        "  Extraction: {}s",
        style(config.timeouts.extraction_secs).cyan()
    );
    eprintln!("  Chat: {}s", style(config.timeouts.chat_secs).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().or_else(|_| {
        eprintln!(
            "{}",
            style("No valid configuration found. Using defaults.").yellow()
        );
        let base_dir = Config::config_dir().context("Failed to locate config directory")?;
        Ok(Config {
            base_dir,
            ..Config::default()
        })
    })
}

fn describe_api_key(chat: &ChatConfig) -> String {
    if chat.api_key.is_some() {
        style("set in config file").green().to_string()
    } else if resolve_api_key(chat).is_some() {
        style(format!("from {}", API_KEY_ENV)).green().to_string()
    } else {
        style("not set").red().to_string()
    }
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let retry_attempts: u32 = Input::new()
        .with_prompt("Attempts per Ollama request")
        .default(ollama.retry_attempts)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=10).contains(input) {
                Ok(())
            } else {
                Err("Attempts must be between 1 and 10")
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_retry_attempts(retry_attempts)?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Words per chunk")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let overlap: usize = Input::new()
        .with_prompt("Words of overlap between chunks")
        .default(config.chunking.overlap.min(chunk_size - 1))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input >= chunk_size {
                Err("Overlap must be smaller than the chunk size")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Passages retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Top K must be between 1 and 100")
            }
        })
        .interact_text()?;

    config.set_chunking(chunk_size, overlap)?;
    config.retrieval.set_top_k(top_k)?;

    Ok(())
}

fn configure_chat(chat: &mut ChatConfig) -> Result<()> {
    let endpoint: String = Input::new()
        .with_prompt("Chat completions endpoint")
        .default(chat.endpoint.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            ChatConfig {
                endpoint: input.clone(),
                ..ChatConfig::default()
            }
            .validate()
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(chat.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    chat.set_endpoint(endpoint)?;
    chat.set_model(model)?;

    let prompt = if chat.api_key.is_some() {
        "API key (leave empty to keep the current one)".to_string()
    } else {
        format!("API key (leave empty to use {})", API_KEY_ENV)
    };
    let api_key = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;
    if !api_key.trim().is_empty() {
        chat.set_api_key(&api_key);
    }

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> Result<bool> {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
