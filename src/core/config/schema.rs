//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [site]
//! name = "storefront"
//! root = "/srv/pushgate/storefront"
//! auto_swap_slot = "production"
//!
//! [remote]
//! url = "http://deploy.internal:8080/storefront/scm/"
//! username = "admin"
//! password = "secret"
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: the bind address must be a socket
//! address, the site name must be usable as a URL path segment, and the
//! remote URL must be absolute.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// HTTP server settings
    pub server: Option<ServerConfig>,

    /// The site this gateway deploys to
    pub site: Option<SiteConfig>,

    /// Remote repository API used by `pushgate repo`
    pub remote: Option<RemoteConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(server) = &self.server {
            server.validate()?;
        }
        if let Some(site) = &self.site {
            site.validate()?;
        }
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: Option<String>,
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bind) = &self.bind {
            bind.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue(format!("invalid server.bind '{}': {}", bind, e))
            })?;
        }
        Ok(())
    }
}

/// Site settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site name, used as the first URL path segment
    pub name: Option<String>,

    /// Root directory for the site's repository, deployments and locks
    pub root: Option<PathBuf>,

    /// Slot promoted by auto-swap; auto-swap checks are off when unset
    pub auto_swap_slot: Option<String>,

    /// Path to the git executable
    pub git: Option<PathBuf>,
}

impl SiteConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            validate_site_name(name)?;
        }
        if let Some(slot) = &self.auto_swap_slot {
            if slot.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "site.auto_swap_slot cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Remote repository API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Base URL of the repository API (for example `http://host/site/scm/`)
    pub url: Option<String>,

    /// Basic-auth user name
    pub username: Option<String>,

    /// Basic-auth password
    pub password: Option<String>,
}

impl RemoteConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.url {
            reqwest::Url::parse(url).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid remote.url '{}': {}", url, e))
            })?;
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::InvalidValue(
                "remote.password requires remote.username".into(),
            ));
        }
        Ok(())
    }
}

/// Check that a site name is a single, plain URL path segment.
pub fn validate_site_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "invalid site name '{}': use letters, digits, '-', '_' or '.'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:9000"

            [site]
            name = "storefront"
            root = "/srv/storefront"
            auto_swap_slot = "production"

            [remote]
            url = "http://localhost:9000/storefront/scm/"
            username = "admin"
            password = "secret"
            "#,
        )
        .unwrap();

        file.validate().unwrap();
        let site = file.site.unwrap();
        assert_eq!(site.name.as_deref(), Some("storefront"));
        assert_eq!(site.auto_swap_slot.as_deref(), Some("production"));
    }

    #[test]
    fn empty_file_is_valid() {
        let file: ConfigFile = toml::from_str("").unwrap();
        file.validate().unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<ConfigFile, _> = toml::from_str(
            r#"
            [site]
            name = "a"
            colour = "blue"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn invalid_bind_rejected() {
        let file = ConfigFile {
            server: Some(ServerConfig {
                bind: Some("localhost".into()),
            }),
            ..Default::default()
        };
        assert!(file.validate().is_err());
    }

    #[test]
    fn password_without_username_rejected() {
        let file = ConfigFile {
            remote: Some(RemoteConfig {
                url: Some("http://localhost/scm/".into()),
                username: None,
                password: Some("x".into()),
            }),
            ..Default::default()
        };
        assert!(file.validate().is_err());
    }

    #[test]
    fn site_names() {
        assert!(validate_site_name("storefront").is_ok());
        assert!(validate_site_name("my-site_2.git").is_ok());
        assert!(validate_site_name("").is_err());
        assert!(validate_site_name("..").is_err());
        assert!(validate_site_name("a/b").is_err());
        assert!(validate_site_name("has space").is_err());
    }
}
