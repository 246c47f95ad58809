//! core::env
//!
//! Ambient process configuration.
//!
//! Values such as the sibling-service host and its bearer token are read
//! through [`Environment`] at call time rather than captured at startup, so a
//! rotated credential takes effect without a restart. Tests substitute a map.

use std::collections::HashMap;

/// Environment variable holding the sibling service host name.
pub const HTTP_HOST_VAR: &str = "HTTP_HOST";

/// Environment variable holding the site-restricted bearer token.
pub const SITE_TOKEN_VAR: &str = "SITE_RESTRICTED_TOKEN";

/// Source of named configuration values.
pub trait Environment: Send + Sync {
    /// Look up a value. Unset and empty values are both `None`.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_environment_treats_empty_as_unset() {
        let mut env = HashMap::new();
        env.insert(HTTP_HOST_VAR.to_string(), String::new());
        env.insert(SITE_TOKEN_VAR.to_string(), "abc".to_string());

        assert_eq!(env.var(HTTP_HOST_VAR), None);
        assert_eq!(env.var(SITE_TOKEN_VAR), Some("abc".to_string()));
        assert_eq!(env.var("MISSING"), None);
    }

    #[test]
    fn process_environment_reads_path() {
        // PATH is set in every test environment we run in.
        assert!(ProcessEnvironment.var("PATH").is_some());
    }
}
