//! Status command implementation.

use std::path::Path;

use super::Workspace;
use crate::error::{Error, Result};
use crate::sync::{get_sync_status, print_status};

/// Execute status command.
pub fn execute(config: Option<&Path>, db: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::open(config, db)?;
    let statuses = get_sync_status(&ws.storage, &ws.registry).map_err(Error::from)?;

    if json {
        let output = serde_json::json!({
            "server_url": ws.config.server_url,
            "kinds": statuses,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Server: {}", ws.config.server_url);
        println!();
        print_status(&statuses);
    }
    Ok(())
}
