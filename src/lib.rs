//! parsesync - Parse to SQLite synchronization
//!
//! This crate provides the core functionality for the `parsesync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Record kinds, records and typed field values
//! - [`storage`] - SQLite database layer
//! - [`remote`] - Parse REST client and file downloads
//! - [`sync`] - Import/export translation between Parse objects and records
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
