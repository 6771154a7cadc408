//! Scheduling core configuration.
//!
//! A single `Config` value carries every tunable the core needs. Per
//! design note 9, core functions never read environment or globals
//! themselves -- they take `&Config` as a parameter. `muster-cli` is
//! responsible for resolving the full chain (CLI flag > env var > config
//! file > default) and handing the result down; [`Config::from_env`]
//! here only covers the env-var/default half of that chain, for callers
//! (including `muster-cli`) that want a starting point before layering a
//! CLI flag or config file on top.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Repository access mode for worker agents. The core treats this as
/// opaque data threaded through to external collaborators; it makes no
/// scheduling decisions based on its value except that `direct` is a
/// precondition the CLI checks before enabling auto-approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoMode {
    Github,
    LocalGit,
    Direct,
}

impl std::fmt::Display for RepoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RepoMode::Github => "github",
            RepoMode::LocalGit => "local-git",
            RepoMode::Direct => "direct",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoModeParseError(String);

impl std::fmt::Display for RepoModeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid repo mode: {}", self.0)
    }
}

impl std::error::Error for RepoModeParseError {}

impl FromStr for RepoMode {
    type Err = RepoModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(RepoMode::Github),
            "local-git" => Ok(RepoMode::LocalGit),
            "direct" => Ok(RepoMode::Direct),
            other => Err(RepoModeParseError(other.to_string())),
        }
    }
}

/// Fully resolved scheduling-core configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub repo_mode: RepoMode,
    pub database_url: String,
    pub default_lease_duration_minutes: i64,
    pub sweeper_grace_ms: i64,
    pub heartbeat_interval_ms: i64,
    pub global_retry_budget: i32,
    pub judge_poll_interval_ms: i64,
    pub direct_mode_auto_approve: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_mode: RepoMode::Direct,
            database_url: "postgresql://localhost:5432/muster".to_string(),
            default_lease_duration_minutes: 60,
            sweeper_grace_ms: 120_000,
            heartbeat_interval_ms: 30_000,
            global_retry_budget: -1,
            judge_poll_interval_ms: 5_000,
            direct_mode_auto_approve: false,
        }
    }
}

impl Config {
    /// Build a `Config` from environment variables, falling back to
    /// compiled defaults for anything unset. Does not consult a config
    /// file or CLI flags -- see `muster-cli::config` for the full chain.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let repo_mode = std::env::var("MUSTER_REPO_MODE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.repo_mode);

        let database_url =
            std::env::var("MUSTER_DATABASE_URL").unwrap_or(defaults.database_url);

        let default_lease_duration_minutes = std::env::var("MUSTER_LEASE_DURATION_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_lease_duration_minutes);

        let sweeper_grace_ms = std::env::var("MUSTER_SWEEPER_GRACE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.sweeper_grace_ms);

        let heartbeat_interval_ms = std::env::var("MUSTER_HEARTBEAT_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.heartbeat_interval_ms);

        let global_retry_budget = std::env::var("MUSTER_GLOBAL_RETRY_BUDGET")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.global_retry_budget);

        let judge_poll_interval_ms = std::env::var("MUSTER_JUDGE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.judge_poll_interval_ms);

        let direct_mode_auto_approve = std::env::var("MUSTER_DIRECT_AUTO_APPROVE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.direct_mode_auto_approve);

        Self {
            repo_mode,
            database_url,
            default_lease_duration_minutes,
            sweeper_grace_ms,
            heartbeat_interval_ms,
            global_retry_budget,
            judge_poll_interval_ms,
            direct_mode_auto_approve,
        }
    }
}
