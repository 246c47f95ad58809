//! deployments command - List deployment records of the local site

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::paths::SitePaths;
use crate::deploy::{DeploymentManager, FileDeploymentStore};

/// Print deployment records, newest first.
pub fn deployments(ctx: &Context, root: Option<PathBuf>, json: bool) -> Result<()> {
    let paths = match root {
        Some(root) => SitePaths::new(root),
        None => ctx.config.site_paths(),
    };
    let store = FileDeploymentStore::new(paths.deployments_dir());
    let records = store
        .list()
        .with_context(|| format!("Failed to read {}", store.dir().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No deployments");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {:<9}  {}  {}{}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.status,
            record.id,
            record.status_text,
            record
                .deployer
                .as_deref()
                .map(|d| format!(" ({})", d))
                .unwrap_or_default(),
        );
    }
    Ok(())
}
