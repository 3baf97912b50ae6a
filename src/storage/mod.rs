//! SQLite storage layer for parsesync.
//!
//! This module provides the local record store using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - A `(kind, object_id)` uniqueness constraint, so imports upsert
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{KindCounts, SqliteStorage};
