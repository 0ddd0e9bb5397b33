//! `punchbridge` Core Library
//!
//! Shared functionality for `punchbridge` components:
//! - SQLite pool helpers (WAL journal, foreign keys, in-memory variant for tests)
//! - Tracing/logging initialisation
//! - RFC 3339 time helpers used by the store and the HTTP surface

pub mod db;
pub mod time;
pub mod tracing_init;

pub use db::StoreError;
