//! git
//!
//! Git access for a site's repository.
//!
//! # Responsibilities
//!
//! - Repository detection ([`RepositoryFactory`])
//! - History, diff and working-tree operations via git2 ([`GitRepository`])
//! - Push reception through the git binary ([`GitServer`], [`GitCli`])
//!
//! Pack processing never happens in-process: `git receive-pack` owns the
//! object database while a push is being received.

mod factory;
mod interface;
mod receive;

pub use factory::{RepositoryFactory, SiteRepositoryFactory};
pub use interface::{GitError, GitRepository};
pub use receive::{GitCli, GitServer, ReceiveError, DEPLOYER_ENV_VAR};
