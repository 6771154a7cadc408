//! Configuration file management for `muster`.
//!
//! Provides a TOML-based config file at `~/.config/muster/config.toml` and
//! a resolution chain: CLI flag > env var > config file > compiled default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use muster_core::config::Config;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: muster_db::config::DbConfig::DEFAULT_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SchedulerSection {
    pub repo_mode: Option<String>,
    pub default_lease_duration_minutes: Option<i64>,
    pub sweeper_grace_ms: Option<i64>,
    pub heartbeat_interval_ms: Option<i64>,
    pub global_retry_budget: Option<i32>,
    pub judge_poll_interval_ms: Option<i64>,
    pub direct_mode_auto_approve: Option<bool>,
}

/// Return the muster config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/muster` or `~/.config/muster`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("muster");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("muster")
}

/// Return the path to the muster config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Resolve the full scheduling [`Config`] using the chain: CLI flag (the
/// single `--database-url` override available today) > environment
/// variable > config file > compiled default.
pub fn resolve(cli_database_url: Option<&str>) -> Config {
    let env_config = Config::from_env();
    let file_config = load_config().ok();

    let database_url = cli_database_url
        .map(str::to_string)
        .or_else(|| std::env::var("MUSTER_DATABASE_URL").ok())
        .or_else(|| file_config.as_ref().map(|f| f.database.url.clone()))
        .unwrap_or(env_config.database_url);

    let scheduler = file_config.map(|f| f.scheduler).unwrap_or_default();

    Config {
        database_url,
        repo_mode: scheduler
            .repo_mode
            .and_then(|v| v.parse().ok())
            .unwrap_or(env_config.repo_mode),
        default_lease_duration_minutes: scheduler
            .default_lease_duration_minutes
            .unwrap_or(env_config.default_lease_duration_minutes),
        sweeper_grace_ms: scheduler
            .sweeper_grace_ms
            .unwrap_or(env_config.sweeper_grace_ms),
        heartbeat_interval_ms: scheduler
            .heartbeat_interval_ms
            .unwrap_or(env_config.heartbeat_interval_ms),
        global_retry_budget: scheduler
            .global_retry_budget
            .unwrap_or(env_config.global_retry_budget),
        judge_poll_interval_ms: scheduler
            .judge_poll_interval_ms
            .unwrap_or(env_config.judge_poll_interval_ms),
        direct_mode_auto_approve: scheduler
            .direct_mode_auto_approve
            .unwrap_or(env_config.direct_mode_auto_approve),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("muster/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_string(),
            },
            scheduler: SchedulerSection {
                repo_mode: Some("local-git".to_string()),
                ..Default::default()
            },
        };

        let contents = toml::to_string_pretty(&original).unwrap();
        std::fs::write(&path, &contents).unwrap();

        let loaded_contents = std::fs::read_to_string(&path).unwrap();
        let loaded: ConfigFile = toml::from_str(&loaded_contents).unwrap();

        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.scheduler.repo_mode, original.scheduler.repo_mode);
    }
}
