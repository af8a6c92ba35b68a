use anyhow::Result;
use nichegarp::config::{AppConfig, BestSubsetsConfig, ConfigManager, ConfigSection, GarpConfig};
use nichegarp::GarpError;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("nichegarp-{}-{}.toml", name, std::process::id()))
}

#[test]
fn test_save_then_load_round_trip() -> Result<()> {
    let path = temp_path("round-trip");
    let config = AppConfig {
        garp: GarpConfig::default().with_max_generations(250).with_seed(9),
        best_subsets: BestSubsetsConfig::default().with_total_runs(40).with_max_threads(4),
    };

    let manager = ConfigManager::with_config(config.clone())?;
    manager.save_to_file(&path)?;

    let loaded = ConfigManager::new();
    loaded.load_from_file(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(loaded.get(), config);
    Ok(())
}

#[test]
fn test_partial_file_falls_back_to_defaults() -> Result<()> {
    let path = temp_path("partial");
    std::fs::write(&path, "[garp]\npopulation_size = 80\n")?;

    let manager = ConfigManager::new();
    manager.load_from_file(&path)?;
    std::fs::remove_file(&path)?;

    let config = manager.get();
    assert_eq!(config.garp.population_size, 80);
    assert_eq!(config.garp.max_generations, 100);
    assert_eq!(config.best_subsets, BestSubsetsConfig::default());
    Ok(())
}

#[test]
fn test_invalid_file_keeps_previous_config() -> Result<()> {
    let path = temp_path("invalid");
    std::fs::write(&path, "[garp]\npopulation_size = 900\n")?;

    let manager = ConfigManager::new();
    let result = manager.load_from_file(&path);
    std::fs::remove_file(&path)?;

    assert!(matches!(result, Err(GarpError::Configuration(_))));
    assert_eq!(manager.get(), AppConfig::default());
    Ok(())
}

#[test]
fn test_missing_file_is_configuration_error() {
    let manager = ConfigManager::new();
    let result = manager.load_from_file(temp_path("does-not-exist"));
    assert!(matches!(result, Err(GarpError::Configuration(_))));
}

#[test]
fn test_update_validates_before_applying() -> Result<()> {
    let manager = ConfigManager::new();
    manager.update(|c| c.garp.mutation_rate = 0.4)?;
    assert!((manager.get().garp.mutation_rate - 0.4).abs() < 1e-12);

    let rejected = manager.update(|c| c.best_subsets.training_proportion = 1.5);
    assert!(rejected.is_err());
    assert!((manager.get().best_subsets.training_proportion - 0.5).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_section_names() {
    assert_eq!(GarpConfig::section_name(), "garp");
    assert_eq!(BestSubsetsConfig::section_name(), "best_subsets");
}
