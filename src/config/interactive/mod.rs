use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, IngestConfig, OllamaConfig};
use crate::config::settings::MAX_UPSERT_BATCH_SIZE;
use crate::embeddings::OllamaClient;

#[inline]
pub fn run_interactive_config(config_dir: &std::path::Path) -> Result<()> {
    eprintln!(
        "{}",
        style("🔧 csv-semsearch Configuration Setup").bold().cyan()
    );
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embedding generation.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Ingestion Configuration").bold().yellow());
    configure_ingest(&mut config.ingest)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config)? {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting.");
    }

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
pub fn show_config(config_dir: &std::path::Path) -> Result<()> {
    let config = Config::load_from(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Ingestion Settings:").bold().yellow());
    eprintln!(
        "  Upsert Batch Size: {}",
        style(config.ingest.upsert_batch_size).cyan()
    );
    eprintln!(
        "  Default Collection: {}",
        style(&config.ingest.default_collection).cyan()
    );

    eprintln!();
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &std::path::Path) -> Result<Config> {
    Config::load_from(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
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
            temp_config.validate()?;
            Ok(())
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

    let batch_size: u32 = Input::new()
        .with_prompt("Embedding batch size")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 || *input > 1000 {
                Err("Batch size must be between 1 and 1000")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Embedding dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    ollama.protocol = protocol;
    ollama.host = host;
    ollama.port = port;
    ollama.model = model;
    ollama.batch_size = batch_size;
    ollama.embedding_dimension = embedding_dimension;

    Ok(())
}

fn configure_ingest(ingest: &mut IngestConfig) -> Result<()> {
    let upsert_batch_size: usize = Input::new()
        .with_prompt("Upsert batch size")
        .default(ingest.upsert_batch_size)
        .validate_with(|input: &usize| -> Result<(), String> {
            if *input == 0 || *input > MAX_UPSERT_BATCH_SIZE {
                Err(format!(
                    "Upsert batch size must be between 1 and {MAX_UPSERT_BATCH_SIZE}"
                ))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let default_collection: String = Input::new()
        .with_prompt("Default collection")
        .default(ingest.default_collection.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            super::settings::validate_collection_name(input)
        })
        .interact_text()?;

    ingest.upsert_batch_size = upsert_batch_size;
    ingest.default_collection = default_collection;

    Ok(())
}

fn test_ollama_connection(config: &Config) -> Result<bool> {
    match OllamaClient::new(config) {
        Ok(client) => Ok(client.health_check().is_ok()),
        Err(_) => Ok(false),
    }
}
