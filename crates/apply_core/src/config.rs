//! Configuration management for the apply kernel

use crate::errors::{ApplyError, Result};
use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

/// Environment variable selecting the execution strategy
pub const ENV_STRATEGY: &str = "CBM_APPLY_STRATEGY";
/// Environment variable toggling parallel batch prediction
pub const ENV_BATCH_PARALLEL: &str = "CBM_APPLY_BATCH_PARALLEL";
/// Environment variable for the parallel batch threshold
pub const ENV_BATCH_MIN_PARALLEL_ROWS: &str = "CBM_APPLY_BATCH_MIN_PARALLEL_ROWS";
/// Environment variable for the default log level
pub const ENV_LOG_LEVEL: &str = "CBM_APPLY_LOG_LEVEL";
/// Environment variable for the log output format
pub const ENV_LOG_FORMAT: &str = "CBM_APPLY_LOG_FORMAT";

/// Apply kernel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApplyConfig {
    /// Execution strategy
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Batch prediction configuration
    #[serde(default)]
    pub batch: BatchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch prediction configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchConfig {
    /// Spread large batches across the rayon pool
    pub parallel: bool,
    /// Smallest batch that is split across threads
    pub min_parallel_rows: usize,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_rows: 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ApplyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(ApplyError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

impl ApplyConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render as a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration, returning human-readable warnings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.batch.parallel && self.batch.min_parallel_rows == 0 {
            warnings.push("Parallel batches enabled with a zero row threshold".to_string());
        }

        if self.batch.parallel && !cfg!(feature = "parallel") {
            warnings.push(
                "Parallel batches requested but the crate was built without 'parallel'"
                    .to_string(),
            );
        }

        if self.logging.level.trim().is_empty() {
            warnings.push("Log level is empty, falling back to 'info'".to_string());
        }

        if matches!(
            self.strategy,
            StrategyKind::Vectorized | StrategyKind::Unrolled
        ) && !crate::strategy::simd_available()
        {
            warnings.push(format!(
                "Strategy '{}' requested without SIMD support; results are unchanged but slower",
                self.strategy
            ));
        }

        warnings
    }
}

/// Configuration manager holding the active config and its overrides
pub struct ConfigManager {
    config: RwLock<ApplyConfig>,
    overrides: RwLock<HashMap<String, serde_json::Value>>,
}

impl ConfigManager {
    /// Create a new configuration manager with defaults
    pub fn new() -> Self {
        Self::with_config(ApplyConfig::default())
    }

    pub fn with_config(config: ApplyConfig) -> Self {
        Self {
            config: RwLock::new(config),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let config = ApplyConfig::from_toml_str(&content)
            .map_err(|e| ApplyError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        self.update_config(config);
        info!("Configuration loaded successfully");
        Ok(())
    }

    /// Apply `CBM_APPLY_*` environment variables
    pub fn load_from_env(&self) -> Result<()> {
        info!("Loading configuration from environment variables");
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    ///
    /// Unparseable values are rejected with [`ApplyError::Config`]; the
    /// active configuration is left unchanged in that case.
    pub fn apply_overrides<F>(&self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.get_config();
        let mut applied = Vec::new();

        if let Some(val) = lookup(ENV_STRATEGY) {
            config.strategy = val.parse()?;
            applied.push((
                "strategy",
                serde_json::Value::String(config.strategy.to_string()),
            ));
        }

        if let Some(val) = lookup(ENV_BATCH_PARALLEL) {
            config.batch.parallel = parse_bool(&val)
                .ok_or_else(|| ApplyError::Config(format!("{ENV_BATCH_PARALLEL}: '{val}'")))?;
            applied.push((
                "batch.parallel",
                serde_json::Value::Bool(config.batch.parallel),
            ));
        }

        if let Some(val) = lookup(ENV_BATCH_MIN_PARALLEL_ROWS) {
            config.batch.min_parallel_rows = val.trim().parse().map_err(|e| {
                ApplyError::Config(format!("{ENV_BATCH_MIN_PARALLEL_ROWS}: '{val}': {e}"))
            })?;
            applied.push((
                "batch.min_parallel_rows",
                serde_json::Value::Number(config.batch.min_parallel_rows.into()),
            ));
        }

        if let Some(val) = lookup(ENV_LOG_LEVEL) {
            config.logging.level = val;
            applied.push((
                "logging.level",
                serde_json::Value::String(config.logging.level.clone()),
            ));
        }

        if let Some(val) = lookup(ENV_LOG_FORMAT) {
            config.logging.format = val.parse()?;
            applied.push((
                "logging.format",
                serde_json::to_value(config.logging.format)?,
            ));
        }

        self.update_config(config);
        let mut overrides = self
            .overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for (key, value) in applied {
            overrides.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Get current configuration
    pub fn get_config(&self) -> ApplyConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current configuration
    pub fn update_config(&self, config: ApplyConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        info!("Configuration updated successfully");
    }

    /// Value recorded for an override key, e.g. `batch.parallel`
    pub fn get_override(&self, key: &str) -> Option<serde_json::Value> {
        self.overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Clear recorded overrides
    pub fn clear_overrides(&self) {
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Validate the current configuration
    pub fn validate(&self) -> Vec<String> {
        let warnings = self.get_config().validate();
        if warnings.is_empty() {
            info!("Configuration validation passed");
        } else {
            warn!("Configuration validation warnings: {:?}", warnings);
        }
        warnings
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.get_config().to_toml_string()?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Get configuration summary
    pub fn get_summary(&self) -> HashMap<String, serde_json::Value> {
        let config = self.get_config();
        let mut summary = HashMap::new();

        summary.insert(
            "strategy".to_string(),
            serde_json::Value::String(config.strategy.to_string()),
        );
        summary.insert(
            "resolved_strategy".to_string(),
            serde_json::Value::String(config.strategy.resolve().to_string()),
        );
        summary.insert(
            "batch_parallel".to_string(),
            serde_json::Value::Bool(config.batch.parallel),
        );
        summary.insert(
            "log_level".to_string(),
            serde_json::Value::String(config.logging.level),
        );

        summary
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
