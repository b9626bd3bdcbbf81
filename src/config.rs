use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Settings file name
pub const SETTINGS_FILE: &str = "scrollreel.json";
/// Default log file name (`--log` without a path)
pub const LOG_FILE: &str = "scrollreel.log";

/// Environment override for the config directory
const CONFIG_DIR_ENV: &str = "SCROLLREEL_CONFIG_DIR";
const APP_DIR: &str = "scrollreel";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Create PathConfig from CLI arguments and environment variables
    ///
    /// Priority: CLI args → ENV var (SCROLLREEL_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));

        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. SCROLLREEL_CONFIG_DIR environment variable
/// 3. Local folder IF any config files exist (scrollreel.json, scrollreel.log)
/// 4. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/scrollreel/{name}
/// - macOS: ~/Library/Application Support/scrollreel/{name}
/// - Windows: %APPDATA%\scrollreel\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Get path to a data file (logs, render output)
///
/// Same priority as [`config_file`], falling back to the platform data directory
/// (`~/.local/share/scrollreel` on Linux).
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Ensure that configuration and data directories exist
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }

    Ok(())
}

/// Check if any config files exist in the given directory
fn has_local_config_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn local_dir() -> Option<PathBuf> {
    std::env::current_dir().ok().filter(|dir| has_local_config_files(dir))
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join(APP_DIR);
    }
    PathBuf::from(".")
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    if let Some(dir) = dirs_next::data_dir() {
        return dir.join(APP_DIR);
    }
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file("render", &config), PathBuf::from("/custom/render"));
    }

    #[test]
    fn test_cli_dir_wins_over_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_local_config_detection() {
        let dir = std::env::temp_dir().join(format!("scrollreel-local-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(!has_local_config_files(&dir));

        std::fs::write(dir.join(SETTINGS_FILE), "{}").unwrap();
        assert!(has_local_config_files(&dir));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_ensure_dirs_creates_custom_dir() {
        let dir = std::env::temp_dir()
            .join(format!("scrollreel-cfg-{}", uuid::Uuid::new_v4()))
            .join("nested");
        let config = PathConfig {
            config_dir: Some(dir.clone()),
        };
        ensure_dirs(&config).unwrap();
        assert!(dir.is_dir());
        std::fs::remove_dir_all(dir.parent().unwrap()).ok();
    }
}
