//! serve command - Host the push endpoint for one site

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use tracing::info;

use crate::cli::Context;
use crate::git::{GitRepository, RepositoryFactory, SiteRepositoryFactory};
use crate::http::{self, AppState};

/// Serve the configured site until interrupted.
///
/// Flags override the configuration file. A site without a repository gets
/// an empty git repository so the first push has somewhere to land.
pub fn serve(
    ctx: &Context,
    bind: Option<SocketAddr>,
    site: Option<String>,
    root: Option<PathBuf>,
) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(bind) = bind {
        config = config.with_bind(bind);
    }
    if let Some(site) = site {
        config = config.with_site_name(site)?;
    }
    if let Some(root) = root {
        config = config.with_site_root(root);
    }

    let paths = config.site_paths();
    let repository_dir = paths.repository_dir();
    if SiteRepositoryFactory::new(&repository_dir).repository_type().is_none() {
        GitRepository::new(&repository_dir)
            .init()
            .with_context(|| format!("Failed to initialize {}", repository_dir.display()))?;
    }

    let state = AppState::for_site(
        config.site_name(),
        &paths,
        config.git_binary(),
        config.auto_swap_slot().map(str::to_string),
    );
    let addr = config.bind();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(
            addr = %listener.local_addr()?,
            site = state.site(),
            root = %paths.root().display(),
            "serving"
        );
        axum::serve(listener, http::router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
