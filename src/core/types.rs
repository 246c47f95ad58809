//! core::types
//!
//! Source-control data model shared by the local repository, the HTTP
//! repository API, and the remote repository proxy.
//!
//! # Types
//!
//! - [`RepositoryType`] - Kind of repository found at a site
//! - [`ChangeSet`] - One revision
//! - [`ChangeSetDetail`] - A revision (or the working tree) with its diff
//! - [`Branch`] - A local branch and its tip
//! - [`FileStatus`] - One uncommitted change
//!
//! # Wire Format
//!
//! All types serialize with snake_case field names and RFC 3339 timestamps.
//! They are query projections: nothing here owns repository state.
//!
//! # Example
//!
//! ```
//! use pushgate::core::types::{ChangeType, FileStatus};
//!
//! let status: FileStatus =
//!     serde_json::from_str(r#"{"path":"index.html","status":"modified"}"#).unwrap();
//! assert_eq!(status.status, ChangeType::Modified);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of repository present at a site's repository path.
///
/// The absence of any repository is expressed as `Option::None` by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// A git repository (the only type that accepts receive-pack).
    Git,
    /// A Mercurial repository.
    Mercurial,
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryType::Git => write!(f, "git"),
            RepositoryType::Mercurial => write!(f, "mercurial"),
        }
    }
}

/// One repository revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Full revision identifier.
    pub id: String,
    /// Author name.
    pub author_name: String,
    /// Author email (may be empty).
    #[serde(default)]
    pub author_email: String,
    /// Full commit message.
    pub message: String,
    /// Author timestamp.
    pub timestamp: DateTime<Utc>,
}

impl ChangeSet {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Kind of change applied to a file or a diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Unchanged (diff context lines).
    #[default]
    None,
    Added,
    Deleted,
    Modified,
    Renamed,
    /// Present in the working tree but not tracked.
    Untracked,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::None => "none",
            ChangeType::Added => "added",
            ChangeType::Deleted => "deleted",
            ChangeType::Modified => "modified",
            ChangeType::Renamed => "renamed",
            ChangeType::Untracked => "untracked",
        };
        f.write_str(s)
    }
}

/// One line of a file diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    /// `Added`, `Deleted` or `None` for context.
    #[serde(rename = "type")]
    pub kind: ChangeType,
    /// Line number in the old file, if the line exists there.
    pub left_line: Option<u32>,
    /// Line number in the new file, if the line exists there.
    pub right_line: Option<u32>,
    /// Line content without the trailing newline.
    pub text: String,
}

/// Diff information for a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub status: ChangeType,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub diff: Vec<LineDiff>,
}

/// A revision (or the working tree) together with its diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetDetail {
    /// The revision; `None` when describing uncommitted working changes.
    pub change_set: Option<ChangeSet>,
    /// Per-file diff, keyed by path.
    #[serde(default)]
    pub files: BTreeMap<String, FileInfo>,
    #[serde(default)]
    pub files_changed: usize,
    #[serde(default)]
    pub insertions: usize,
    #[serde(default)]
    pub deletions: usize,
}

/// A local branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Revision the branch points at.
    pub id: String,
}

/// One uncommitted change in the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub status: ChangeType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_set_round_trips_snake_case() {
        let json = r#"{
            "id": "5c3b6f0",
            "author_name": "Ada",
            "author_email": "ada@example.com",
            "message": "Add landing page\n\nDetails",
            "timestamp": "2024-03-01T10:00:00Z"
        }"#;
        let change_set: ChangeSet = serde_json::from_str(json).unwrap();
        assert_eq!(change_set.author_name, "Ada");
        assert_eq!(change_set.summary(), "Add landing page");

        let value = serde_json::to_value(&change_set).unwrap();
        assert_eq!(value["author_email"], "ada@example.com");
    }

    #[test]
    fn author_email_defaults_to_empty() {
        let json = r#"{"id":"a","author_name":"b","message":"c","timestamp":"2024-03-01T10:00:00Z"}"#;
        let change_set: ChangeSet = serde_json::from_str(json).unwrap();
        assert!(change_set.author_email.is_empty());
    }

    #[test]
    fn line_diff_uses_type_key() {
        let line = LineDiff {
            kind: ChangeType::Added,
            left_line: None,
            right_line: Some(3),
            text: "hello".into(),
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["type"], "added");
        assert!(value["left_line"].is_null());
    }

    #[test]
    fn repository_type_display() {
        assert_eq!(RepositoryType::Git.to_string(), "git");
        assert_eq!(RepositoryType::Mercurial.to_string(), "mercurial");
    }

    #[test]
    fn detail_tolerates_missing_collections() {
        let detail: ChangeSetDetail = serde_json::from_str(r#"{"change_set":null}"#).unwrap();
        assert!(detail.files.is_empty());
        assert_eq!(detail.files_changed, 0);
    }
}
