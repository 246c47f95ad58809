//! Property-based tests for header parsing and name validation.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use base64::Engine;
use proptest::prelude::*;

use pushgate::core::config::schema::validate_site_name;
use pushgate::deploy::DeploymentRecord;
use pushgate::gateway::basic_auth_user;

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
}

fn encode(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text)
}

proptest! {
    /// Any user name without a colon survives the round trip, whatever the
    /// password.
    #[test]
    fn basic_auth_extracts_user(
        user in "[^:\\x00]{1,40}",
        password in "[^\\x00]{0,40}",
        scheme in prop_oneof![Just("Basic"), Just("basic"), Just("BASIC")],
    ) {
        let headers = headers_with(&format!("{} {}", scheme, encode(&format!("{}:{}", user, password))));
        prop_assert_eq!(basic_auth_user(&headers), Some(user));
    }

    /// An empty user name is never reported as a deployer.
    #[test]
    fn basic_auth_empty_user_is_none(password in "[^\\x00]{0,40}") {
        let headers = headers_with(&format!("Basic {}", encode(&format!(":{}", password))));
        prop_assert_eq!(basic_auth_user(&headers), None);
    }

    /// Non-basic schemes never yield a user.
    #[test]
    fn other_schemes_ignored(token in "[A-Za-z0-9]{1,40}") {
        let headers = headers_with(&format!("Bearer {}", token));
        prop_assert_eq!(basic_auth_user(&headers), None);
    }

    /// Names built from the allowed alphabet validate.
    #[test]
    fn plain_site_names_valid(name in "[A-Za-z0-9_-][A-Za-z0-9._-]{0,30}") {
        prop_assert!(validate_site_name(&name).is_ok());
    }

    /// A path separator anywhere makes a name invalid.
    #[test]
    fn site_names_with_separators_invalid(
        prefix in "[a-z]{0,10}",
        sep in prop_oneof![Just('/'), Just('\\'), Just(' '), Just('?')],
        suffix in "[a-z]{0,10}",
    ) {
        let name = format!("{}{}{}", prefix, sep, suffix);
        prop_assert!(validate_site_name(&name).is_err());
    }

    /// Temporary deployments always carry the temporary marker and prefix.
    #[test]
    fn temporary_records_are_marked(text in ".{0,40}", deployer in proptest::option::of("[a-z]{1,10}")) {
        let record = DeploymentRecord::temporary(&text, deployer.as_deref());
        prop_assert!(record.is_temporary);
        prop_assert!(record.id.starts_with("temp-"));
        prop_assert_eq!(record.status_text, text);
        prop_assert_eq!(record.deployer, deployer);
    }
}
