// SPDX-License-Identifier: MIT
//! Sync engines: directory state in, hosting-platform mutations out.
//!
//! [`TeamSyncEngine`] converges one Gitea team on a resolved membership.
//! [`UserSync`] materializes directory principals as Gitea users and mirrors
//! a user's Gitea repositories back into their directory record (the one
//! flow that runs hosting → directory).
//!
//! Partial success is the normal case: individual member or repository
//! failures are counted and collected, siblings keep going, and the caller
//! decides whether the result warrants a retry.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{debug, info, warn};

use crate::directory::DirectoryApi;
use crate::gitea::{GiteaApi, GiteaError, Team};
use crate::resolver::ResolvedMembership;

/// Permission level granted to a manager on department repositories.
const MANAGER_PERMISSION: &str = "admin";

/// Outcome of one team sync. Returned even on partial failure.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub team: Team,
    pub members_added: usize,
    pub members_failed: usize,
    pub repositories_added: usize,
    pub repositories_failed: usize,
    pub manager_granted: bool,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub struct TeamSyncEngine {
    gitea: Arc<dyn GiteaApi>,
}

impl TeamSyncEngine {
    pub fn new(gitea: Arc<dyn GiteaApi>) -> Self {
        Self { gitea }
    }

    /// Converge the team `team_name` in `org` on `resolved`.
    ///
    /// Create-or-find, then diff members both ways, then add missing
    /// repositories (repositories are never removed from a team — access is
    /// not revoked off the back of a possibly-stale read), then grant the
    /// manager admin on every resolved repository.
    ///
    /// Transport-level failures on the lookups abort with `Err`; everything
    /// per-member / per-repository lands in the result instead.
    pub async fn sync_team(
        &self,
        org: &str,
        team_name: &str,
        permission: &str,
        resolved: &ResolvedMembership,
    ) -> Result<SyncResult, GiteaError> {
        let team = match self.gitea.find_team(org, team_name).await? {
            Some(team) => team,
            None => {
                info!(org, team = team_name, permission, "creating team");
                self.gitea.create_team(org, team_name, permission).await?
            }
        };

        let mut result = SyncResult {
            team: team.clone(),
            members_added: 0,
            members_failed: 0,
            repositories_added: 0,
            repositories_failed: 0,
            manager_granted: false,
            errors: Vec::new(),
        };
        for raw in &resolved.skipped_repos {
            result
                .errors
                .push(format!("unparseable repository reference {raw:?}"));
        }

        // Member diff, both directions.
        let current: BTreeSet<String> = self
            .gitea
            .list_team_members(team.id)
            .await?
            .into_iter()
            .collect();

        for uid in resolved.members.difference(&current) {
            match self.gitea.add_team_member(team.id, uid).await {
                Ok(()) => {
                    debug!(team = %team.name, uid = %uid, "member added");
                    result.members_added += 1;
                }
                Err(e) => {
                    warn!(team = %team.name, uid = %uid, err = %e, "adding member failed");
                    result.members_failed += 1;
                    result.errors.push(format!("add member {uid}: {e}"));
                }
            }
        }
        for uid in current.difference(&resolved.members) {
            match self.gitea.remove_team_member(team.id, uid).await {
                Ok(()) => debug!(team = %team.name, uid = %uid, "stale member removed"),
                Err(e) => {
                    warn!(team = %team.name, uid = %uid, err = %e, "removing member failed");
                    result.members_failed += 1;
                    result.errors.push(format!("remove member {uid}: {e}"));
                }
            }
        }

        // Repository diff, add-only.
        let existing: BTreeSet<String> = self
            .gitea
            .list_team_repos(team.id)
            .await?
            .into_iter()
            .map(|r| r.full_name.to_lowercase())
            .collect();

        for repo in &resolved.repositories {
            if existing.contains(&repo.full_name().to_lowercase()) {
                continue;
            }
            match self.gitea.add_team_repo(team.id, &repo.owner, &repo.name).await {
                Ok(()) => {
                    debug!(team = %team.name, repo = %repo, "repository added");
                    result.repositories_added += 1;
                }
                Err(e) => {
                    warn!(team = %team.name, repo = %repo, err = %e, "adding repository failed");
                    result.repositories_failed += 1;
                    result.errors.push(format!("add repository {repo}: {e}"));
                }
            }
        }

        // Manager grant — independent of team membership.
        if let Some(manager) = &resolved.manager {
            for repo in &resolved.repositories {
                match self
                    .gitea
                    .add_collaborator(&repo.owner, &repo.name, manager, MANAGER_PERMISSION)
                    .await
                {
                    Ok(()) => {
                        debug!(manager = %manager, repo = %repo, "manager granted admin");
                        result.manager_granted = true;
                    }
                    Err(e) => {
                        warn!(manager = %manager, repo = %repo, err = %e, "manager grant failed");
                        result.errors.push(format!("grant {manager} on {repo}: {e}"));
                    }
                }
            }
        }

        Ok(result)
    }
}

// ─── User materialization + repository mirroring ─────────────────────────────

pub struct UserSync {
    directory: Arc<dyn DirectoryApi>,
    gitea: Arc<dyn GiteaApi>,
    default_password: String,
    email_domain: String,
}

impl UserSync {
    pub fn new(
        directory: Arc<dyn DirectoryApi>,
        gitea: Arc<dyn GiteaApi>,
        default_password: impl Into<String>,
        email_domain: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            gitea,
            default_password: default_password.into(),
            email_domain: email_domain.into(),
        }
    }

    /// Make sure a directory principal exists as a Gitea user. Returns
    /// `true` when the user had to be created.
    pub async fn ensure_user(&self, uid: &str, mail: Option<&str>) -> Result<bool, GiteaError> {
        if self.gitea.get_user(uid).await?.is_some() {
            return Ok(false);
        }
        let fallback = format!("{uid}@{}", self.email_domain);
        let email = mail.unwrap_or(fallback.as_str());
        info!(uid, "materializing gitea user");
        self.gitea
            .create_user(uid, email, &self.default_password)
            .await?;
        Ok(true)
    }

    /// Mirror a user's Gitea repositories back into their directory record.
    /// This is the targeted sync the webhook and the retry queue replay; it
    /// must stay safely re-runnable.
    pub async fn mirror_user_repos(&self, uid: &str) -> Result<usize> {
        let repos = self
            .gitea
            .list_user_repos(uid)
            .await
            .with_context(|| format!("listing gitea repositories of {uid}"))?;

        let names: Vec<String> = repos.into_iter().map(|r| r.full_name).collect();
        let count = names.len();
        self.directory
            .assign_repos_to_user(uid, &names)
            .await
            .with_context(|| format!("assigning repositories to {uid}"))?;
        debug!(uid, repos = count, "user repositories mirrored");
        Ok(count)
    }
}
