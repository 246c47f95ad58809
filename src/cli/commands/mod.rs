//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Async Commands
//!
//! `serve`, `repo` and `operation` involve network I/O. Each builds its own
//! tokio runtime and blocks on it, so dispatch itself stays synchronous.

mod autoswap;
mod deployments;
mod operation;
mod repo;
mod serve;

pub use autoswap::autoswap;
pub use deployments::deployments;
pub use operation::operation;
pub use repo::repo;
pub use serve::serve;

use crate::cli::args::Command;
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Serve { bind, site, root } => serve(ctx, bind, site, root),
        Command::Repo { url, action } => repo(ctx, url, action),
        Command::Operation {
            path,
            data,
            scheme,
        } => operation(ctx, &path, data.as_deref(), &scheme),
        Command::Deployments { root, json } => deployments(ctx, root, json),
        Command::Autoswap { root, action } => autoswap(ctx, root, action),
    }
}
