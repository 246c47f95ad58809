//! autoswap command - Mark, clear or inspect an in-progress slot swap

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tracing::info;

use crate::cli::args::AutoswapAction;
use crate::cli::Context;
use crate::core::ops::{try_lock_operation, DeploymentLock};
use crate::core::paths::SitePaths;
use crate::deploy::{AutoSwapGuard, AutoSwapMarker};

/// Drive the auto-swap marker that makes pushes answer `409`.
pub fn autoswap(ctx: &Context, root: Option<PathBuf>, action: AutoswapAction) -> Result<()> {
    let paths = match root {
        Some(root) => SitePaths::new(root),
        None => ctx.config.site_paths(),
    };
    let marker = AutoSwapMarker::new(
        paths.auto_swap_marker_path(),
        ctx.config.auto_swap_slot().map(str::to_string),
    );

    match action {
        AutoswapAction::Start => {
            let Some(slot) = marker.slot() else {
                bail!("No auto-swap slot configured. Set [site] auto_swap_slot.");
            };

            // The marker only appears while no push is mid-transfer
            let lock = DeploymentLock::new(paths.deployment_lock_path());
            let marked = try_lock_operation(&lock, Duration::ZERO, || marker.mark())
                .context("Failed to take the deployment lock")?;
            match marked {
                Some(result) => result
                    .with_context(|| format!("Failed to write {}", marker.path().display()))?,
                None => bail!("Another deployment operation is in progress"),
            }

            info!(slot, "auto-swap started");
            println!("Auto-swap to '{}' started", slot);
        }
        AutoswapAction::Stop => {
            marker
                .clear()
                .with_context(|| format!("Failed to remove {}", marker.path().display()))?;
            println!("Auto-swap cleared");
        }
        AutoswapAction::Status => {
            if marker.is_auto_swap_ongoing() {
                println!("Auto-swap: running");
            } else {
                println!("Auto-swap: idle");
            }
        }
    }
    Ok(())
}
