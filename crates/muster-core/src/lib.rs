//! Scheduling and lease coordination core: the failure classifier, retry
//! policy, lease manager, heartbeat bookkeeping, recovery sweeper,
//! dispatcher, and task state machine that together keep the agent/task/
//! run/lease data model in `muster-db` consistent under concurrency.

pub mod boundary;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod heartbeat;
pub mod lease;
pub mod retry;
pub mod state;
pub mod sweeper;
