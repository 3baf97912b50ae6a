//! Kinds command implementation.
//!
//! Lists the configured record kinds in import order, with their Parse
//! class and fields. Reads the config only; the database is not opened.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use super::load_config;
use crate::error::Result;
use crate::model::{FieldDef, FieldKind};

#[derive(Serialize)]
struct FieldOutput {
    name: String,
    remote_name: String,
    column: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

#[derive(Serialize)]
struct KindOutput {
    name: String,
    class_name: String,
    fields: Vec<FieldOutput>,
}

const fn type_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Integer => "integer",
        FieldKind::Float => "float",
        FieldKind::Boolean => "boolean",
        FieldKind::Json => "json",
        FieldKind::Date => "date",
        FieldKind::DateTime => "date_time",
        FieldKind::File => "file",
        FieldKind::Image => "image",
        FieldKind::ForeignKey { .. } => "foreign_key",
        FieldKind::OneToOne { .. } => "one_to_one",
    }
}

fn field_output(field: &FieldDef) -> FieldOutput {
    FieldOutput {
        name: field.name.clone(),
        remote_name: field.remote_name(),
        column: field.column(),
        kind: type_name(&field.kind),
        target: field.kind.pointer_target().map(String::from),
    }
}

/// Execute kinds command.
pub fn execute(config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let registry = config.registry()?;

    let kinds: Vec<KindOutput> = registry
        .import_order()
        .into_iter()
        .map(|kind| KindOutput {
            name: kind.name.clone(),
            class_name: kind.class_name().to_string(),
            fields: kind.fields.iter().map(field_output).collect(),
        })
        .collect();

    if json {
        let output = serde_json::json!({
            "count": kinds.len(),
            "kinds": kinds,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if kinds.is_empty() {
        println!("{}", "No record kinds configured.".dimmed());
        return Ok(());
    }

    for kind in &kinds {
        if kind.class_name == kind.name {
            println!("{}", kind.name.blue().bold());
        } else {
            println!("{} ({})", kind.name.blue().bold(), kind.class_name);
        }
        for field in &kind.fields {
            match &field.target {
                Some(target) => println!("  {:<20} {} -> {target}", field.name, field.kind),
                None => println!("  {:<20} {}", field.name, field.kind),
            }
        }
        println!();
    }
    Ok(())
}
