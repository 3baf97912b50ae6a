//! Sync command implementations (import, pull, push, delete).
//!
//! Import and pull only write to the local database. Push and delete talk to
//! the Parse server configured in the config file.

use std::path::Path;

use colored::Colorize;
use tracing::info;

use super::Workspace;
use crate::cli::{ImportArgs, PullArgs, PushArgs};
use crate::error::{Error, Result};
use crate::remote::{HttpFetcher, ParseClient};
use crate::sync::{Exporter, ImportReport, Importer, PushReport};

/// Kind named by a snapshot file: `Book.json` and `Book.2024-03-01.json`
/// both import into `Book`.
fn kind_from_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Import a snapshot file.
pub fn import(
    args: &ImportArgs,
    config: Option<&Path>,
    db: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut ws = Workspace::open(config, db)?;
    let requested = match &args.model {
        Some(model) => model.clone(),
        None => kind_from_file_name(&args.file).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Cannot derive a record kind from {}; pass --model",
                args.file.display()
            ))
        })?,
    };
    let kind = ws.resolve_kind(&requested)?;

    let fetcher = HttpFetcher::new()?;
    let report = Importer::new(&mut ws.storage, &ws.registry, &fetcher)
        .import_snapshot(&kind, &args.file)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "file": args.file.display().to_string(),
            "report": report,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !quiet {
        println!("Imported {} from {}", kind.bold(), args.file.display());
        print_import_report(&report);
    }
    Ok(())
}

/// Pull updated objects from Parse.
pub fn pull(
    args: &PullArgs,
    config: Option<&Path>,
    db: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut ws = Workspace::open(config, db)?;
    let kinds: Vec<String> = match &args.kind {
        Some(kind) => vec![ws.resolve_kind(kind)?],
        None => ws
            .registry
            .import_order()
            .into_iter()
            .map(|k| k.name.clone())
            .collect(),
    };

    let client = ParseClient::new(&ws.config.remote())?;
    let fetcher = HttpFetcher::new()?;

    let mut reports = Vec::with_capacity(kinds.len());
    for kind in &kinds {
        info!(kind = %kind, "Pulling");
        let report = Importer::new(&mut ws.storage, &ws.registry, &fetcher).pull(
            kind,
            &client,
            args.page_size,
        )?;
        reports.push(report);
    }

    if json {
        let output = serde_json::json!({
            "success": true,
            "reports": reports,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !quiet {
        for report in &reports {
            println!("Pulled {}", report.kind.bold());
            print_import_report(report);
        }
    }
    Ok(())
}

/// Push local records to Parse.
pub fn push(
    args: &PushArgs,
    config: Option<&Path>,
    db: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut ws = Workspace::open(config, db)?;
    let kind = ws.resolve_kind(&args.kind)?;
    let client = ParseClient::new(&ws.config.remote())?;

    if let Some(object_id) = &args.id {
        let mut record = ws
            .storage
            .find_record(&kind, object_id)?
            .ok_or_else(|| Error::RecordNotFound {
                kind: kind.clone(),
                object_id: object_id.clone(),
            })?;
        let outcome = Exporter::new(&mut ws.storage, &ws.registry, &client).save(&mut record)?;

        if json {
            let output = serde_json::json!({
                "success": true,
                "kind": kind,
                "outcome": outcome,
            });
            println!("{}", serde_json::to_string(&output)?);
        } else if !quiet {
            let mut report = PushReport::new(&kind);
            report.record(&outcome);
            print_push_report(&report);
        }
        return Ok(());
    }

    let report = Exporter::new(&mut ws.storage, &ws.registry, &client).push_kind(&kind)?;
    if json {
        let output = serde_json::json!({
            "success": report.failed.is_empty(),
            "report": report,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !quiet {
        print_push_report(&report);
    }
    Ok(())
}

/// Delete a record locally and on Parse.
pub fn delete(
    kind: &str,
    object_id: &str,
    config: Option<&Path>,
    db: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut ws = Workspace::open(config, db)?;
    let kind = ws.resolve_kind(kind)?;
    let record = ws
        .storage
        .find_record(&kind, object_id)?
        .ok_or_else(|| Error::RecordNotFound {
            kind: kind.clone(),
            object_id: object_id.to_string(),
        })?;

    let client = ParseClient::new(&ws.config.remote())?;
    let removed = Exporter::new(&mut ws.storage, &ws.registry, &client).delete(&record)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "kind": kind,
            "object_id": object_id,
            "deleted": removed,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !quiet {
        println!("Deleted {kind} {object_id}");
    }
    Ok(())
}

fn print_import_report(report: &ImportReport) {
    println!();
    println!("  Created:     {}", report.created);
    println!("  Updated:     {}", report.updated);
    if report.attachments > 0 {
        println!("  Attachments: {}", report.attachments);
    }
    if report.failed > 0 {
        println!("  {}", format!("Failed:      {}", report.failed).red());
    }

    if !report.issues.is_empty() {
        println!();
        println!("{}", format!("{} issue(s):", report.issues.len()).yellow());
        for issue in &report.issues {
            let id = issue.object_id.as_deref().unwrap_or("-");
            println!(
                "  #{:<4} {:<12} [{}] {}",
                issue.index,
                id,
                issue.kind.as_str(),
                issue.message
            );
        }
    }
}

fn print_push_report(report: &PushReport) {
    println!("Pushed {}", report.kind.bold());
    println!();
    println!("  Created:   {}", report.created);
    println!("  Updated:   {}", report.updated);
    if report.recreated > 0 {
        println!("  Recreated: {}", report.recreated);
    }
    if !report.failed.is_empty() {
        println!("  {}", format!("Failed:    {}", report.failed.len()).red());
        for failure in &report.failed {
            println!("    {} {}", failure.object_id, failure.message.dimmed());
        }
    }
}
