//! Relational store for Waypost.
//!
//! A thin layer over a single SQLite database: schema migrations, and one
//! module per table family (users, catalog, jobs, audit, meta, sessions).
//! Callers hold a `sqlx::SqlitePool` and pass it explicitly to every
//! function here rather than this crate owning global state.

pub mod audit;
pub mod catalog;
pub mod error;
pub mod jobs;
pub mod meta;
pub mod migrations;
pub mod pool;
pub mod sessions;
pub mod types;
pub mod users;

pub use error::{Result, StoreError};
pub use pool::{connect, DbConfig};
