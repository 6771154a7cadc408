//! Storage layer for the scheduling and lease subsystem: connection
//! pooling, migrations, and typed query functions against the
//! `agents`, `tasks`, `runs`, `leases`, and `artifacts` tables.

pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod queries;
