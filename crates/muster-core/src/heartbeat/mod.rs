//! Heartbeat monitor: per-agent liveness tick plus the staleness check
//! the Recovery Sweeper may consult. Purely cooperative -- a stale
//! heartbeat is a signal, not a direct cause of any state transition.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use muster_db::queries::agents;

/// Record a liveness tick for `agent_id`.
pub async fn record_heartbeat(pool: &PgPool, agent_id: &str) -> Result<()> {
    agents::record_heartbeat(pool, agent_id)
        .await
        .with_context(|| format!("failed to record heartbeat for agent {agent_id}"))?;
    Ok(())
}

/// Whether a last-heartbeat timestamp is older than `interval_ms` as of
/// `now`. `None` (never heartbeated) is treated as stale.
pub fn is_stale(last_heartbeat: Option<DateTime<Utc>>, interval_ms: i64, now: DateTime<Utc>) -> bool {
    match last_heartbeat {
        None => true,
        Some(last) => (now - last).num_milliseconds() > interval_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn missing_heartbeat_is_stale() {
        assert!(is_stale(None, 30_000, Utc::now()));
    }

    #[test]
    fn recent_heartbeat_is_not_stale() {
        let now = Utc::now();
        let last = now - Duration::milliseconds(1_000);
        assert!(!is_stale(Some(last), 30_000, now));
    }

    #[test]
    fn heartbeat_older_than_interval_is_stale() {
        let now = Utc::now();
        let last = now - Duration::milliseconds(60_000);
        assert!(is_stale(Some(last), 30_000, now));
    }
}
