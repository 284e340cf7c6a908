//! Configuration loading from files and the environment

use anyhow::Result;
use cbm_apply_core::config::{
    ConfigManager, LogFormat, ENV_BATCH_MIN_PARALLEL_ROWS, ENV_BATCH_PARALLEL, ENV_LOG_FORMAT,
    ENV_STRATEGY,
};
use cbm_apply_core::{fixtures, log, Predictor, StrategyKind};
use tempfile::tempdir;

struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvVarGuard {
    fn new(key: &'static str, value: &str) -> Self {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self { key, previous }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        if let Some(prev) = &self.previous {
            std::env::set_var(self.key, prev);
        } else {
            std::env::remove_var(self.key);
        }
    }
}

#[test]
fn test_file_then_env_layering() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("apply.toml");
    std::fs::write(
        &path,
        "strategy = \"vectorized\"\n\n[batch]\nparallel = true\nmin_parallel_rows = 512\n\n[logging]\nlevel = \"warn\"\n",
    )?;

    let manager = ConfigManager::new();
    manager.load_from_file(&path)?;
    assert_eq!(manager.get_config().strategy, StrategyKind::Vectorized);
    assert_eq!(manager.get_config().batch.min_parallel_rows, 512);

    {
        let _strategy = EnvVarGuard::new(ENV_STRATEGY, "pooled");
        let _parallel = EnvVarGuard::new(ENV_BATCH_PARALLEL, "false");
        let _rows = EnvVarGuard::new(ENV_BATCH_MIN_PARALLEL_ROWS, "8");
        let _format = EnvVarGuard::new(ENV_LOG_FORMAT, "pretty");
        manager.load_from_env()?;
    }

    let config = manager.get_config();
    assert_eq!(config.strategy, StrategyKind::Pooled);
    assert!(!config.batch.parallel);
    assert_eq!(config.batch.min_parallel_rows, 8);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Pretty);

    let predictor = Predictor::from_config(fixtures::depth_two_model(1.0, 0.0), &config)?;
    assert_eq!(predictor.strategy_kind(), StrategyKind::Pooled);
    assert_eq!(predictor.predict(&[0.9, 0.1])?, 20.0);

    let saved = dir.path().join("saved.toml");
    manager.save_to_file(&saved)?;
    let reloaded = ConfigManager::new();
    reloaded.load_from_file(&saved)?;
    assert_eq!(reloaded.get_config(), config);
    Ok(())
}

#[test]
fn test_malformed_file_is_config_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "strategy = [\n")?;
    let manager = ConfigManager::new();
    assert!(matches!(
        manager.load_from_file(&path),
        Err(cbm_apply_core::ApplyError::Config(_))
    ));
    Ok(())
}

#[test]
fn test_logging_init_is_repeatable() -> Result<()> {
    let config = ConfigManager::new().get_config();
    log::init_logging(&config.logging)?;
    assert!(!log::init_logging(&config.logging)?);
    Predictor::new(fixtures::diamonds_model())?;
    Ok(())
}
