//! Pushgate - Git push-to-deploy gateway
//!
//! Pushgate accepts `git push` over smart HTTP and turns each push into a
//! serialized deployment operation: one push (or repository mutation) at a
//! time per site, refused while an auto-swap is in progress, and listed as a
//! temporary deployment while the pack is being received.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates)
//! - [`http`] - axum router hosting one site
//! - [`gateway`] - Receive-pack state machine (lock, auto-swap, tracking)
//! - [`git`] - Local repositories (git2) and the `git receive-pack` bridge
//! - [`deploy`] - Deployment records, temporary deployments, auto-swap marker
//! - [`repository`] - `Repository` trait and its HTTP client
//! - [`operation`] - Authenticated calls to the sibling service
//! - [`core`] - Configuration, paths, environment, locking and shared types
//!
//! # Correctness Invariants
//!
//! 1. At most one deployment-affecting operation runs per site
//! 2. Lock contention fails immediately, it never queues
//! 3. A temporary deployment is removed before the lock is released
//! 4. Every push response suppresses caching

pub mod cli;
pub mod core;
pub mod deploy;
pub mod gateway;
pub mod git;
pub mod http;
pub mod operation;
pub mod repository;
