//! Durable controller state.
//!
//! Everything the daemon must not forget across a restart lives in one JSON
//! snapshot: the retry queue, the collab group registry, and the timestamp of
//! the last fully successful reconcile pass. The snapshot is the only source
//! of restart truth — startup loads it and the loops replay from there.
//!
//! Written atomically: temp file → rename, so a crash mid-write never
//! corrupts the previous snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::collab::CollabGroupMeta;
use crate::retry::RetryItem;

const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerState {
    #[serde(rename = "retryItems")]
    pub retry_items: Vec<RetryItem>,
    #[serde(rename = "lastReconcileSuccess")]
    pub last_reconcile_success: Option<DateTime<Utc>>,
    #[serde(rename = "collabGroups")]
    pub collab_groups: BTreeMap<String, CollabGroupMeta>,
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(STATE_FILE),
        }
    }

    /// Load the snapshot, or return the default state when no snapshot
    /// exists yet (first start).
    pub async fn load(&self) -> Result<ControllerState> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let state: ControllerState = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", self.path.display()))?;
                info!(
                    path = %self.path.display(),
                    retry_items = state.retry_items.len(),
                    collab_groups = state.collab_groups.len(),
                    "controller state loaded"
                );
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no prior state — starting fresh");
                Ok(ControllerState::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    /// Persist the snapshot. Atomic: write to tmp, then rename.
    pub async fn save(&self, state: &ControllerState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("serializing controller state")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        debug!(path = %self.path.display(), "controller state saved");
        Ok(())
    }
}
