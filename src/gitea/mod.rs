//! Gitea model and API seam.
//!
//! Gitea is the reconciliation target, never a system of record: teams are
//! created-or-found by name, team IDs are treated as ephemeral, and nothing
//! here assumes a previous run's view of the platform is still accurate.

pub mod client;

pub use client::GiteaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GiteaError {
    #[error("gitea unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gitea returned {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub permission: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: UserRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    pub url: String,
    #[serde(default)]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub id: i64,
    pub config: HookConfig,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub active: bool,
}

#[async_trait]
pub trait GiteaApi: Send + Sync {
    /// `None` when no user with this login exists.
    async fn get_user(&self, login: &str) -> Result<Option<GiteaUser>, GiteaError>;
    async fn create_user(
        &self,
        login: &str,
        email: &str,
        password: &str,
    ) -> Result<GiteaUser, GiteaError>;
    async fn list_user_repos(&self, login: &str) -> Result<Vec<Repository>, GiteaError>;

    /// Exact (case-insensitive) team lookup within an organization.
    async fn find_team(&self, org: &str, name: &str) -> Result<Option<Team>, GiteaError>;
    async fn create_team(
        &self,
        org: &str,
        name: &str,
        permission: &str,
    ) -> Result<Team, GiteaError>;

    async fn list_team_members(&self, team_id: i64) -> Result<Vec<String>, GiteaError>;
    async fn add_team_member(&self, team_id: i64, login: &str) -> Result<(), GiteaError>;
    async fn remove_team_member(&self, team_id: i64, login: &str) -> Result<(), GiteaError>;

    async fn list_team_repos(&self, team_id: i64) -> Result<Vec<Repository>, GiteaError>;
    async fn add_team_repo(&self, team_id: i64, owner: &str, repo: &str)
        -> Result<(), GiteaError>;

    /// Grant a collaborator a permission level on one repository.
    async fn add_collaborator(
        &self,
        owner: &str,
        repo: &str,
        login: &str,
        permission: &str,
    ) -> Result<(), GiteaError>;

    async fn list_org_hooks(&self, org: &str) -> Result<Vec<Hook>, GiteaError>;
    async fn create_org_hook(
        &self,
        org: &str,
        url: &str,
        secret: &str,
    ) -> Result<Hook, GiteaError>;
}
