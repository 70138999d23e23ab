//! Config command - View and manage peaklog configuration
//!
//! Provides the `peaklog config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use peaklog_core::config::{Config, StorageBackend};
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.user", "User id to sync as (empty to clear)"),
    ("sync.max_retries", "Retries per remote operation (0 disables)"),
    ("sync.retry_base_delay_ms", "Base backoff delay in milliseconds"),
    ("storage.backend", "json|sqlite"),
    ("storage.data_dir", "Directory for local data"),
    ("logging.level", "trace|debug|info|warn|error"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "storage.backend")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(config_path, format),
            ConfigCommand::Set { key, value } => {
                self.execute_set(config_path, key, value, format).await
            }
            ConfigCommand::Validate => self.execute_validate(config_path, format),
        }
    }

    fn execute_show(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = Config::load_or_default(config_path);

        info!(config_path = %config_path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");
            for line in config.to_yaml()?.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    async fn execute_set(
        &self,
        config_path: &Path,
        key: &str,
        value: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = Config::load_or_default(config_path);

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{key}': {e}"));
                formatter.info("");
                formatter.info("Supported keys:");
                for (key, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {key:<26} - {help}"));
                }
            }
            return Ok(());
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": messages,
                }));
            } else {
                formatter.error(&format!(
                    "Invalid value for '{key}': {}",
                    messages.join("; ")
                ));
            }
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create configuration directory")?;
        }
        tokio::fs::write(config_path, config.to_yaml()?)
            .await
            .context("Failed to write configuration file")?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {key} = {value}"));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        if !config_path.exists() {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": true,
                    "config_path": config_path.display().to_string(),
                    "errors": [],
                    "defaults": true,
                }));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info("Using default configuration. Run 'peaklog config set <key> <value>' to create one.");
            }
            return Ok(());
        }

        let config = match Config::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {e}")],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {e}"));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = config.validate();

        if format.is_json() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": messages,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "sync.user" => {
            config.sync.user = (!value.is_empty()).then(|| value.to_string());
        }
        "sync.max_retries" => {
            config.sync.max_retries = value
                .parse::<u32>()
                .context("Expected a non-negative integer for sync.max_retries")?;
        }
        "sync.retry_base_delay_ms" => {
            config.sync.retry_base_delay_ms = value
                .parse::<u64>()
                .context("Expected a non-negative integer for sync.retry_base_delay_ms")?;
        }
        "storage.backend" => {
            config.storage.backend = match value.to_ascii_lowercase().as_str() {
                "json" => StorageBackend::Json,
                "sqlite" => StorageBackend::Sqlite,
                other => bail!("Unknown storage backend '{other}' (expected json or sqlite)"),
            };
        }
        "storage.data_dir" => {
            config.storage.data_dir = PathBuf::from(value);
        }
        "logging.level" => {
            config.logging.level = value.to_ascii_lowercase();
        }
        _ => bail!("Unknown configuration key '{key}'"),
    }
    Ok(())
}
