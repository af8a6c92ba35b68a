use super::{best_subsets::BestSubsetsConfig, garp::GarpConfig, traits::ConfigSection};
use crate::error::GarpError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment variables overriding file values, e.g.
/// `NICHEGARP_GARP__MAX_GENERATIONS=200`.
pub const ENV_PREFIX: &str = "NICHEGARP";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub garp: GarpConfig,
    pub best_subsets: BestSubsetsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), GarpError> {
        self.garp.validate()?;
        self.best_subsets.validate()?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AppConfig) -> Result<Self, GarpError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Loads the file at `path` and layers `NICHEGARP_*` environment
    /// variables on top. The result replaces the current configuration only
    /// if it validates.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GarpError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GarpError::Configuration(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| GarpError::Configuration(format!("Failed to load config: {}", e)))?;

        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());

        let mut current = self.config.write().unwrap_or_else(|p| p.into_inner());
        *current = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GarpError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| GarpError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| GarpError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    /// Applies `f` and keeps the change only if the result validates.
    pub fn update<F>(&self, f: F) -> Result<(), GarpError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(|p| p.into_inner());
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}
