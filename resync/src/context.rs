//! Application context that holds resolved configuration
//!
//! The context is built following the precedence order:
//! 1. Default values
//! 2. Config file values
//! 3. Environment variables
//! 4. CLI flags
//!
//! Once built, the context is passed as read-only throughout the application.

use crate::format::{color_choice, output_format};
use libresync::Config;
use std::env;
use std::path::PathBuf;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "RESYNC_CONFIG";
/// Environment variable overriding `sync.concurrency`.
pub const CPU_COUNT_ENV: &str = "RESYNC_CPU_COUNT";
/// Environment variable overriding `sync.dry_run`.
pub const DRY_RUN_ENV: &str = "RESYNC_DRY_RUN";
/// Environment variable overriding `output.color`.
pub const COLOR_ENV: &str = "RESYNC_COLOR";

/// Settings given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub cpu_count: Option<usize>,
    pub dry_run: bool,
    pub format: Option<String>,
    pub color: Option<String>,
}

/// Application context with resolved configuration
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Resolved configuration
    pub config: Config,
}

impl AppContext {
    /// Build context with precedence: defaults > config file > env vars > CLI flags
    pub fn build(cli: &CliOverrides) -> Result<Self, String> {
        Self::build_with_env(cli, |key| env::var(key).ok())
    }

    fn build_with_env<F>(cli: &CliOverrides, env: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 1 + 2. Defaults, then the config file. A path given explicitly must exist.
        let explicit = cli
            .config_path
            .clone()
            .or_else(|| env(CONFIG_ENV).map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Config::load(Some(&path)),
            None => match Config::default_path() {
                Some(path) => Config::load_optional(&path),
                None => Ok(Config::default()),
            },
        }
        .map_err(|e| e.to_string())?;

        // 3. Environment variable overrides
        if let Some(count) = env(CPU_COUNT_ENV) {
            let count = count
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("{} must be a number, got '{}'", CPU_COUNT_ENV, count))?;
            config.sync.concurrency = Some(count);
        }
        if let Some(flag) = env(DRY_RUN_ENV) {
            config.sync.dry_run = parse_flag(&flag)
                .ok_or_else(|| format!("{} must be true or false, got '{}'", DRY_RUN_ENV, flag))?;
        }
        if let Some(color) = env(COLOR_ENV) {
            config.output.color = color_choice(&color);
        }

        // 4. CLI flag overrides (highest priority)
        if let Some(count) = cli.cpu_count {
            config.sync.concurrency = Some(count);
        }
        if cli.dry_run {
            config.sync.dry_run = true;
        }
        if let Some(format) = &cli.format {
            config.output.format = output_format(format);
        }
        if let Some(color) = &cli.color {
            config.output.color = color_choice(color);
        }

        Ok(Self { config })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
