//! core
//!
//! Core domain types, configuration, and operations for pushgate.
//!
//! # Modules
//!
//! - [`types`] - Source-control data model: ChangeSet, Branch, FileStatus, etc.
//! - [`ops`] - Deployment lock
//! - [`config`] - Configuration schema and loading
//! - [`env`] - Ambient process configuration lookups
//! - [`paths`] - Centralized path routing for site storage
//!
//! # Design Principles
//!
//! - Collaborators are traits passed by handle, never hidden globals
//! - Schemas are strict and self-describing

pub mod config;
pub mod env;
pub mod ops;
pub mod paths;
pub mod types;
