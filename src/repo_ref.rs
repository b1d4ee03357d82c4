//! Repository references.
//!
//! Repositories arrive in different shapes depending on which side produced
//! them: the directory stores clone URLs (`https://git.example.com/org/svc.git`),
//! Gitea reports `owner/name` pairs. Both normalize to the same [`RepoRef`]
//! so a diff never sees one repository twice. Equality and ordering are
//! case-insensitive on both components.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoRefError {
    #[error("unparseable repository reference: {0:?}")]
    Unparseable(String),
}

/// Normalized `(owner, name)` identity of a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse a repository reference from any of the accepted shapes:
    ///
    /// - `https://host/owner/name` or `https://host/owner/name.git`
    /// - `git@host:owner/name.git` (scp-style)
    /// - bare `owner/name`
    pub fn parse(raw: &str) -> Result<Self, RepoRefError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RepoRefError::Unparseable(raw.to_string()));
        }

        let path = if let Some((_, rest)) = trimmed.split_once("://") {
            // URL form: first segment is the host, the rest is the repo path.
            match rest.split_once('/') {
                Some((_host, path)) => path,
                None => return Err(RepoRefError::Unparseable(raw.to_string())),
            }
        } else if let Some((prefix, path)) = trimmed.split_once(':') {
            // scp-style only when an auth part is present (git@host:owner/name).
            if prefix.contains('@') {
                path
            } else {
                return Err(RepoRefError::Unparseable(raw.to_string()));
            }
        } else {
            trimmed
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(RepoRefError::Unparseable(raw.to_string()));
        }

        let owner = segments[segments.len() - 2];
        let name = segments[segments.len() - 1]
            .strip_suffix(".git")
            .unwrap_or(segments[segments.len() - 1]);
        if owner.is_empty() || name.is_empty() {
            return Err(RepoRefError::Unparseable(raw.to_string()));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// `owner/name` as Gitea renders it.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    fn key(&self) -> (String, String) {
        (self.owner.to_lowercase(), self.name.to_lowercase())
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl PartialEq for RepoRef {
    fn eq(&self, other: &Self) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for RepoRef {}

impl Hash for RepoRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Ord for RepoRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for RepoRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn url_bare_and_git_suffix_normalize_identically() {
        let a = RepoRef::parse("https://git.example.com/org/svc-a").unwrap();
        let b = RepoRef::parse("org/svc-a").unwrap();
        let c = RepoRef::parse("https://git.example.com/org/svc-a.git").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.owner, "org");
        assert_eq!(a.name, "svc-a");
    }

    #[test]
    fn scp_style_is_accepted() {
        let r = RepoRef::parse("git@git.example.com:org/svc-a.git").unwrap();
        assert_eq!(r.full_name(), "org/svc-a");
    }

    #[test]
    fn equality_is_case_insensitive() {
        let a = RepoRef::parse("Org/Svc-A").unwrap();
        let b = RepoRef::parse("org/svc-a").unwrap();
        assert_eq!(a, b);

        let mut set = BTreeSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn deep_url_paths_take_the_last_two_segments() {
        let r = RepoRef::parse("https://host/git/org/svc-a.git").unwrap();
        assert_eq!(r.owner, "org");
        assert_eq!(r.name, "svc-a");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(RepoRef::parse("").is_err());
        assert!(RepoRef::parse("   ").is_err());
        assert!(RepoRef::parse("justaname").is_err());
        assert!(RepoRef::parse("https://host/").is_err());
        assert!(RepoRef::parse("host:owner/name").is_err());
    }
}
