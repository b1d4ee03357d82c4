//! Directory service model and API seam.
//!
//! The directory (users, groups, departments) is the system of record for
//! identity. It is reached through its HTTP CRUD wrapper; [`DirectoryApi`]
//! is the seam so sync logic can run against an in-memory double in tests.

pub mod client;

pub use client::DirectoryClient;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token acquisition failed: {0}")]
    Auth(#[from] AuthError),
    #[error("directory returned {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },
}

/// A directory principal. The `uid` is the opaque key every other system
/// refers to; it doubles as the Gitea login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirUser {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Repository references as stored (URLs or `owner/name`).
    #[serde(default)]
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Department {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// UID of the department manager, when one is set.
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub members: BTreeSet<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
}

#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn get_user(&self, uid: &str) -> Result<DirUser, DirectoryError>;
    async fn get_group(&self, name: &str) -> Result<DirGroup, DirectoryError>;
    async fn get_department(&self, name: &str) -> Result<Department, DirectoryError>;

    async fn list_users(&self) -> Result<Vec<DirUser>, DirectoryError>;
    async fn list_groups(&self) -> Result<Vec<DirGroup>, DirectoryError>;
    async fn list_departments(&self) -> Result<Vec<Department>, DirectoryError>;

    async fn create_group(&self, name: &str, description: &str) -> Result<(), DirectoryError>;
    async fn delete_group(&self, name: &str) -> Result<(), DirectoryError>;

    async fn add_user_to_group(&self, group: &str, uid: &str) -> Result<(), DirectoryError>;
    async fn remove_user_from_group(&self, group: &str, uid: &str) -> Result<(), DirectoryError>;

    /// Replace the repository attribute on a user record.
    async fn assign_repos_to_user(&self, uid: &str, repos: &[String])
        -> Result<(), DirectoryError>;
    async fn assign_repos_to_group(
        &self,
        group: &str,
        repos: &[String],
    ) -> Result<(), DirectoryError>;
    async fn assign_repos_to_department(
        &self,
        department: &str,
        repos: &[String],
    ) -> Result<(), DirectoryError>;

    async fn health_check(&self) -> Result<(), DirectoryError>;
}
