//! Sync status display.
//!
//! Shows, per participating record kind, how many records and attachments
//! are stored locally and how far the last pull got.

use colored::Colorize;
use serde::Serialize;

use crate::model::Registry;
use crate::storage::sqlite::SqliteStorage;
use crate::sync::codec::format_iso;
use crate::sync::types::{SyncError, SyncResult};

/// Local state of one record kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindStatus {
    /// Record kind name.
    pub kind: String,
    /// Parse class name.
    pub class_name: String,
    /// Stored records.
    pub records: usize,
    /// Stored attachments.
    pub attachments: usize,
    /// Cursor of the next incremental pull, if any record is stored.
    pub pull_cursor: Option<String>,
}

/// Get the local status of every kind in the registry.
///
/// # Errors
///
/// Returns an error if database queries fail.
pub fn get_sync_status(storage: &SqliteStorage, registry: &Registry) -> SyncResult<Vec<KindStatus>> {
    registry
        .kinds()
        .iter()
        .map(|kind| {
            let counts = storage
                .kind_counts(&kind.name)
                .map_err(|e| SyncError::Database(e.to_string()))?;
            Ok(KindStatus {
                kind: kind.name.clone(),
                class_name: kind.class_name().to_string(),
                records: counts.records,
                attachments: counts.attachments,
                pull_cursor: counts.latest_updated_at.as_ref().map(format_iso),
            })
        })
        .collect()
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(statuses: &[KindStatus]) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    if statuses.is_empty() {
        println!("{}", "No record kinds configured.".dimmed());
        return;
    }

    for status in statuses {
        let label = if status.class_name == status.kind {
            status.kind.clone()
        } else {
            format!("{} ({})", status.kind, status.class_name)
        };
        println!("{}", label.blue().bold());
        println!("  Records:     {}", status.records);
        if status.attachments > 0 {
            println!("  Attachments: {}", status.attachments);
        }
        match &status.pull_cursor {
            Some(cursor) => println!("  Pulled up to: {cursor}"),
            None => println!("  {}", "Never pulled".yellow()),
        }
        println!();
    }

    let total: usize = statuses.iter().map(|s| s.records).sum();
    println!("  {}: {}", "Total records".bold(), total);
}
