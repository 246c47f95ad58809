//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this configuration file
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// pushgate - Git push-to-deploy gateway
#[derive(Parser, Debug)]
#[command(name = "pushgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (overrides discovery)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the push endpoint and repository API for a site
    #[command(after_help = "\
EXAMPLES:
    # Serve the configured site
    pushgate serve

    # Serve a site from an explicit directory
    pushgate serve --site storefront --root /srv/storefront --bind 0.0.0.0:8080

    # Then push to it
    git push http://localhost:8080/storefront master")]
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Site name (first URL path segment)
        #[arg(long)]
        site: Option<String>,

        /// Site root directory
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,
    },

    /// Query or modify a remote site repository
    Repo {
        /// Repository API base URL (e.g. http://host:8080/site/scm/)
        #[arg(long)]
        url: Option<String>,

        #[command(subcommand)]
        action: RepoAction,
    },

    /// POST to a sibling service using HTTP_HOST and SITE_RESTRICTED_TOKEN
    Operation {
        /// Request path (e.g. /api/swap)
        path: String,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,

        /// URL scheme
        #[arg(long, default_value = "https")]
        scheme: String,
    },

    /// List deployment records of the local site
    Deployments {
        /// Site root directory
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark or clear an auto-swap; pushes are refused while one runs
    #[command(after_help = "\
EXAMPLES:
    # Refuse pushes while the slot swap runs
    pushgate autoswap start
    pushgate autoswap stop")]
    Autoswap {
        /// Site root directory
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,

        #[command(subcommand)]
        action: AutoswapAction,
    },
}

/// Auto-swap marker actions.
#[derive(Subcommand, Debug)]
pub enum AutoswapAction {
    /// Mark an auto-swap as running
    Start,
    /// Clear the auto-swap marker
    Stop,
    /// Show whether an auto-swap is running
    Status,
}

/// Repository API actions.
#[derive(Subcommand, Debug)]
pub enum RepoAction {
    /// Print the current revision id
    Id,
    /// Create the repository if missing
    Init,
    /// List branches
    Branches,
    /// Show working tree status
    Status,
    /// Show history, newest first
    Log {
        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Maximum entries to show
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a revision with its diff
    Details {
        /// Revision id
        id: String,
    },
    /// Show uncommitted changes
    Working,
    /// Stage a file
    Add {
        path: String,
    },
    /// Discard changes to a file
    Revert {
        path: String,
    },
    /// Commit all pending changes
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Author name
        #[arg(long, default_value = "pushgate")]
        author: String,
    },
    /// Push the current branch to origin
    Push,
    /// Check out a branch or revision
    Update {
        /// Branch name or revision id
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "pushgate",
            "--debug",
            "serve",
            "--bind",
            "0.0.0.0:9000",
            "--site",
            "blog",
        ])
        .unwrap();
        assert!(cli.debug);
        match cli.command {
            Command::Serve { bind, site, root } => {
                assert_eq!(bind.unwrap().port(), 9000);
                assert_eq!(site.as_deref(), Some("blog"));
                assert!(root.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_repo_log() {
        let cli = Cli::try_parse_from([
            "pushgate",
            "repo",
            "--url",
            "http://localhost/site/scm/",
            "log",
            "--limit",
            "5",
        ])
        .unwrap();
        match cli.command {
            Command::Repo {
                url,
                action: RepoAction::Log { index, limit },
            } => {
                assert_eq!(url.as_deref(), Some("http://localhost/site/scm/"));
                assert_eq!(index, 0);
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_autoswap_start() {
        let cli = Cli::try_parse_from(["pushgate", "autoswap", "--root", "/srv/site", "start"])
            .unwrap();
        match cli.command {
            Command::Autoswap {
                root,
                action: AutoswapAction::Start,
            } => assert_eq!(root, Some(PathBuf::from("/srv/site"))),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_bind_rejected() {
        assert!(Cli::try_parse_from(["pushgate", "serve", "--bind", "nope"]).is_err());
    }
}
