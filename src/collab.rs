//! Collaboration group registry.
//!
//! A collaboration group is a directory group whose membership is never
//! edited directly: it is always the base department's members plus an
//! explicit set of extras. The directory has no way to express that
//! relationship, so this registry is the only record of it — which is why
//! every mutation is pushed to the state store immediately.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Context as _, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::AppContext;

/// What makes a directory group a collaboration group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollabGroupMeta {
    #[serde(rename = "baseDepartment")]
    pub base_department: String,
    #[serde(rename = "extraMembers")]
    pub extra_members: BTreeSet<String>,
}

/// Read-mostly map of group name → collab metadata. Every sync pass reads
/// it; only the explicit create/update/delete operations below write.
#[derive(Default)]
pub struct CollabRegistry {
    groups: RwLock<BTreeMap<String, CollabGroupMeta>>,
}

impl CollabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<CollabGroupMeta> {
        self.groups.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.groups.read().await.contains_key(name)
    }

    pub async fn insert(&self, name: &str, meta: CollabGroupMeta) {
        self.groups.write().await.insert(name.to_string(), meta);
    }

    pub async fn remove(&self, name: &str) -> Option<CollabGroupMeta> {
        self.groups.write().await.remove(name)
    }

    /// Copy of the registry, for persistence.
    pub async fn snapshot(&self) -> BTreeMap<String, CollabGroupMeta> {
        self.groups.read().await.clone()
    }

    /// Replace the registry contents from a persisted snapshot.
    pub async fn restore(&self, groups: BTreeMap<String, CollabGroupMeta>) {
        *self.groups.write().await = groups;
    }
}

// ─── Service operations ───────────────────────────────────────────────────────
//
// The seams called by the operator-facing API layer. Each operation mutates
// the directory and/or the registry, then persists state before returning.
// Team-side convergence is left to the group sync loop.

/// Create a collaboration group: a fresh directory group plus its registry
/// entry. The base department must exist.
pub async fn create_collab_group(
    ctx: &AppContext,
    name: &str,
    base_department: &str,
    description: &str,
) -> Result<()> {
    if ctx.collab.contains(name).await {
        bail!("collab group {name:?} already exists");
    }
    ctx.directory
        .get_department(base_department)
        .await
        .with_context(|| format!("base department {base_department:?} not found"))?;
    ctx.directory
        .create_group(name, description)
        .await
        .context("creating directory group")?;

    ctx.collab
        .insert(
            name,
            CollabGroupMeta {
                base_department: base_department.to_string(),
                extra_members: BTreeSet::new(),
            },
        )
        .await;
    ctx.persist_state().await?;
    info!(group = name, base = base_department, "collab group created");
    Ok(())
}

/// Add an extra member on top of the base department.
pub async fn add_collab_member(ctx: &AppContext, name: &str, uid: &str) -> Result<()> {
    let mut meta = ctx
        .collab
        .get(name)
        .await
        .with_context(|| format!("unknown collab group {name:?}"))?;
    if !meta.extra_members.insert(uid.to_string()) {
        return Ok(());
    }
    ctx.collab.insert(name, meta).await;
    ctx.persist_state().await?;
    info!(group = name, uid, "collab extra member added");
    Ok(())
}

/// Remove an extra member. Members inherited from the base department are
/// not removable here — they follow the department.
pub async fn remove_collab_member(ctx: &AppContext, name: &str, uid: &str) -> Result<()> {
    let mut meta = ctx
        .collab
        .get(name)
        .await
        .with_context(|| format!("unknown collab group {name:?}"))?;
    if !meta.extra_members.remove(uid) {
        return Ok(());
    }
    ctx.collab.insert(name, meta).await;
    ctx.persist_state().await?;
    info!(group = name, uid, "collab extra member removed");
    Ok(())
}

/// Tear a collaboration group down: directory group and registry entry both
/// go away. The Gitea team is left in place (access removal stays a manual,
/// deliberate act).
pub async fn delete_collab_group(ctx: &AppContext, name: &str) -> Result<()> {
    if ctx.collab.get(name).await.is_none() {
        bail!("unknown collab group {name:?}");
    }
    ctx.directory
        .delete_group(name)
        .await
        .context("deleting directory group")?;
    ctx.collab.remove(name).await;
    ctx.persist_state().await?;
    info!(group = name, "collab group deleted");
    Ok(())
}
