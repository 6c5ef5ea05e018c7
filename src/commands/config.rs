/// `stowage config` command implementation
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use stowage::config::{load_config_with_discovery, StowageConfig};

use crate::cli::ConfigCommands;

pub fn run(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { path } => validate(path),
        ConfigCommands::Generate => generate(),
        ConfigCommands::Show { config } => show(config.as_deref()),
    }
}

fn validate(path: &Path) -> Result<()> {
    info!("Validating config file: {}", path.display());

    // from_file validates after parsing
    let config = StowageConfig::from_file(path)?;

    println!("Configuration file is valid: {}", path.display());
    println!("  - Cache backend: {:?}", config.cache.backend);
    println!("  - Cache directory: {}", config.cache.dir.display());
    println!("  - dotnet tools: {}", config.gitversion.tools.join(", "));
    Ok(())
}

fn generate() -> Result<()> {
    print!("{}", StowageConfig::example()?);
    Ok(())
}

fn show(config: Option<&Path>) -> Result<()> {
    let config = load_config_with_discovery(config)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
