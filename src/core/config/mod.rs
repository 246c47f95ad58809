//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! The configuration file is searched in order:
//! 1. An explicit path (the `--config` flag)
//! 2. `$PUSHGATE_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/pushgate/config.toml`
//! 4. `~/.pushgate/config.toml`
//!
//! A missing file is not an error: defaults are used.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Configuration file
//! 3. CLI flags (applied by the caller through the `with_*` setters)
//!
//! # Example
//!
//! ```no_run
//! use pushgate::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("serving {} on {}", config.site_name(), config.bind());
//! ```

pub mod schema;

pub use schema::{ConfigFile, RemoteConfig, ServerConfig, SiteConfig};

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::env::{Environment, ProcessEnvironment};
use crate::core::paths::SitePaths;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "PUSHGATE_CONFIG";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_SITE_NAME: &str = "site";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

/// Resolved configuration.
///
/// Accessors apply defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    file: ConfigFile,
    /// Path the file was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path does not exist, or if a config
    /// file exists but cannot be read, parsed, or validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit, &ProcessEnvironment)
    }

    /// Load configuration, resolving search locations through `env`.
    pub fn load_with_env(
        explicit: Option<&Path>,
        env: &dyn Environment,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_path(path);
        }

        match Self::discover(env) {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Find the first existing config file in the standard locations.
    fn discover(env: &dyn Environment) -> Option<PathBuf> {
        let candidates = [
            env.var(CONFIG_ENV_VAR).map(PathBuf::from),
            env.var("XDG_CONFIG_HOME")
                .map(|xdg| PathBuf::from(xdg).join("pushgate/config.toml")),
            dirs::home_dir().map(|home| home.join(".pushgate/config.toml")),
        ];
        candidates.into_iter().flatten().find(|p| p.exists())
    }

    /// Read, parse, and validate a config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        Ok(Self {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    // =========================================================================
    // CLI overrides
    // =========================================================================

    /// Override the bind address.
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.file.server.get_or_insert_with(Default::default).bind = Some(bind.to_string());
        self
    }

    /// Override the site root directory.
    pub fn with_site_root(mut self, root: PathBuf) -> Self {
        self.file.site.get_or_insert_with(Default::default).root = Some(root);
        self
    }

    /// Override the site name.
    pub fn with_site_name(mut self, name: String) -> Result<Self, ConfigError> {
        schema::validate_site_name(&name)?;
        self.file.site.get_or_insert_with(Default::default).name = Some(name);
        Ok(self)
    }

    /// Override the remote repository URL.
    pub fn with_remote_url(mut self, url: String) -> Result<Self, ConfigError> {
        reqwest::Url::parse(&url)
            .map_err(|e| ConfigError::InvalidValue(format!("invalid remote url '{}': {}", url, e)))?;
        self.file.remote.get_or_insert_with(Default::default).url = Some(url);
        Ok(self)
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    /// Socket address the server listens on.
    ///
    /// Defaults to `127.0.0.1:8080`.
    pub fn bind(&self) -> SocketAddr {
        self.file
            .server
            .as_ref()
            .and_then(|s| s.bind.as_deref())
            .and_then(|b| b.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
    }

    /// Site name.
    ///
    /// Defaults to `site`.
    pub fn site_name(&self) -> &str {
        self.site().and_then(|s| s.name.as_deref()).unwrap_or(DEFAULT_SITE_NAME)
    }

    /// Site root directory.
    ///
    /// Defaults to `<data dir>/pushgate/<site name>`, or `./<site name>` if
    /// the platform has no data directory.
    pub fn site_root(&self) -> PathBuf {
        if let Some(root) = self.site().and_then(|s| s.root.clone()) {
            return root;
        }
        match dirs::data_local_dir() {
            Some(data) => data.join("pushgate").join(self.site_name()),
            None => PathBuf::from(self.site_name()),
        }
    }

    /// Path routing for the configured site.
    pub fn site_paths(&self) -> SitePaths {
        SitePaths::new(self.site_root())
    }

    /// Slot promoted by auto-swap, if auto-swap is enabled.
    pub fn auto_swap_slot(&self) -> Option<&str> {
        self.site().and_then(|s| s.auto_swap_slot.as_deref())
    }

    /// Path to the git executable.
    ///
    /// Defaults to `git`, resolved through `PATH`.
    pub fn git_binary(&self) -> PathBuf {
        self.site()
            .and_then(|s| s.git.clone())
            .unwrap_or_else(|| PathBuf::from("git"))
    }

    /// Remote repository API settings, if configured.
    pub fn remote(&self) -> Option<&RemoteConfig> {
        self.file.remote.as_ref()
    }

    fn site(&self) -> Option<&SiteConfig> {
        self.file.site.as_ref()
    }
}

/// The default bind address as text, for CLI help.
pub fn default_bind() -> &'static str {
    DEFAULT_BIND
}
