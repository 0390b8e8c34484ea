mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Returns the config directory: <platform config dir>/motion-replay/
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("motion-replay");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the config file path: <config dir>/motion-replay/config.toml
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from the default location, or return defaults if not found.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path()?)
}

/// Load config from an explicit path, or return defaults if it does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = parse_config(&contents)?;
        info!(?path, "Loaded config");
        Ok(config)
    } else {
        info!(?path, "No config found, using defaults");
        Ok(AppConfig::default())
    }
}

/// Parse a TOML config document. Missing tables and keys take their defaults.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    Ok(toml::from_str(contents)?)
}

/// Save config to the default location.
pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &config_path()?)
}

/// Save config to an explicit path, creating parent directories as needed.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(?path, "Saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.policy, PolicySelection::Auto);
        assert_eq!(config.tuning, TuningParameters::default());
        assert_eq!(config.high_pass, PolicyLimits::high_pass());
        assert_eq!(config.deadband, PolicyLimits::deadband());
        assert_eq!(config.playback.trail_length, 500);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = parse_config(
            r#"
            policy = "deadband"

            [tuning]
            damping = 0.999

            [deadband]
            max_dt = 0.25
            rotation_epsilon = 0.0005
            "#,
        )
        .unwrap();

        assert_eq!(config.policy, PolicySelection::Deadband);
        assert!((config.tuning.damping - 0.999).abs() < 1e-12);
        assert!((config.tuning.hp_alpha - 0.9).abs() < 1e-12);
        assert!((config.deadband.max_dt - 0.25).abs() < 1e-12);
        assert_eq!(config.high_pass, PolicyLimits::high_pass());
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let mut config = AppConfig::default();
        config.policy = PolicySelection::HighPass;
        config.tuning.accel_scale = 2.5;
        config.playback.speed = 4.0;

        let text = toml::to_string_pretty(&config).unwrap();
        let back = parse_config(&text).unwrap();

        assert_eq!(back.policy, PolicySelection::HighPass);
        assert_eq!(back.tuning, config.tuning);
        assert_eq!(back.playback, config.playback);
    }

    #[test]
    fn saved_file_loads_back() {
        let name = format!("motion-replay-{}", std::process::id());
        let dir = std::env::temp_dir().join(name);
        let path = dir.join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.policy = PolicySelection::Deadband;
        config.tuning.damping = 0.97;
        config.deadband.max_dt = 0.3;
        save_config_to(&config, &path).unwrap();

        let back = load_config_from(&path).unwrap();
        assert_eq!(back.policy, PolicySelection::Deadband);
        assert_eq!(back.tuning, config.tuning);
        assert_eq!(back.deadband, config.deadband);
        assert_eq!(back.high_pass, PolicyLimits::high_pass());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join("motion-replay-does-not-exist.toml");
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.tuning, TuningParameters::default());
    }
}
