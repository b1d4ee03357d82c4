//! Collab group lifecycle tests: registry mutations, directory side effects,
//! immediate persistence, and the composition law.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use dirsyncd::collab::{
    add_collab_member, create_collab_group, delete_collab_group, remove_collab_member,
    CollabGroupMeta,
};
use dirsyncd::config::DaemonConfig;
use dirsyncd::directory::{Department, DirGroup, DirUser, DirectoryApi, DirectoryError};
use dirsyncd::gitea::{GiteaApi, GiteaError, GiteaUser, Hook, Repository, Team};
use dirsyncd::resolver;
use dirsyncd::AppContext;

// ─── Directory double ────────────────────────────────────────────────────────

#[derive(Default)]
struct StubDirectory {
    departments: Mutex<BTreeMap<String, Department>>,
    groups: Mutex<BTreeMap<String, DirGroup>>,
}

impl StubDirectory {
    fn with_department(name: &str, members: &[&str]) -> Self {
        let stub = Self::default();
        stub.departments.lock().unwrap().insert(
            name.to_string(),
            Department {
                name: name.to_string(),
                description: String::new(),
                manager: None,
                members: members.iter().map(|m| m.to_string()).collect(),
                repositories: Vec::new(),
            },
        );
        stub
    }
}

#[async_trait]
impl DirectoryApi for StubDirectory {
    async fn get_user(&self, uid: &str) -> Result<DirUser, DirectoryError> {
        Ok(DirUser {
            uid: uid.to_string(),
            display_name: None,
            mail: None,
        })
    }

    async fn get_group(&self, name: &str) -> Result<DirGroup, DirectoryError> {
        self.groups
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(DirectoryError::NotFound {
                kind: "group",
                name: name.to_string(),
            })
    }

    async fn get_department(&self, name: &str) -> Result<Department, DirectoryError> {
        self.departments
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(DirectoryError::NotFound {
                kind: "department",
                name: name.to_string(),
            })
    }

    async fn list_users(&self) -> Result<Vec<DirUser>, DirectoryError> {
        Ok(Vec::new())
    }

    async fn list_groups(&self) -> Result<Vec<DirGroup>, DirectoryError> {
        Ok(self.groups.lock().unwrap().values().cloned().collect())
    }

    async fn list_departments(&self) -> Result<Vec<Department>, DirectoryError> {
        Ok(self.departments.lock().unwrap().values().cloned().collect())
    }

    async fn create_group(&self, name: &str, description: &str) -> Result<(), DirectoryError> {
        self.groups.lock().unwrap().insert(
            name.to_string(),
            DirGroup {
                name: name.to_string(),
                description: description.to_string(),
                members: BTreeSet::new(),
                repositories: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), DirectoryError> {
        self.groups.lock().unwrap().remove(name);
        Ok(())
    }

    async fn add_user_to_group(&self, group: &str, uid: &str) -> Result<(), DirectoryError> {
        if let Some(g) = self.groups.lock().unwrap().get_mut(group) {
            g.members.insert(uid.to_string());
        }
        Ok(())
    }

    async fn remove_user_from_group(&self, group: &str, uid: &str) -> Result<(), DirectoryError> {
        if let Some(g) = self.groups.lock().unwrap().get_mut(group) {
            g.members.remove(uid);
        }
        Ok(())
    }

    async fn assign_repos_to_user(
        &self,
        _uid: &str,
        _repos: &[String],
    ) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn assign_repos_to_group(
        &self,
        _group: &str,
        _repos: &[String],
    ) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn assign_repos_to_department(
        &self,
        _department: &str,
        _repos: &[String],
    ) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}

// ─── Gitea double (unused by these flows) ────────────────────────────────────

struct NullGitea;

#[async_trait]
impl GiteaApi for NullGitea {
    async fn get_user(&self, _login: &str) -> Result<Option<GiteaUser>, GiteaError> {
        Ok(None)
    }
    async fn create_user(
        &self,
        login: &str,
        email: &str,
        _password: &str,
    ) -> Result<GiteaUser, GiteaError> {
        Ok(GiteaUser {
            id: 1,
            login: login.to_string(),
            email: email.to_string(),
        })
    }
    async fn list_user_repos(&self, _login: &str) -> Result<Vec<Repository>, GiteaError> {
        Ok(Vec::new())
    }
    async fn find_team(&self, _org: &str, _name: &str) -> Result<Option<Team>, GiteaError> {
        Ok(None)
    }
    async fn create_team(
        &self,
        _org: &str,
        name: &str,
        permission: &str,
    ) -> Result<Team, GiteaError> {
        Ok(Team {
            id: 1,
            name: name.to_string(),
            permission: permission.to_string(),
        })
    }
    async fn list_team_members(&self, _team_id: i64) -> Result<Vec<String>, GiteaError> {
        Ok(Vec::new())
    }
    async fn add_team_member(&self, _team_id: i64, _login: &str) -> Result<(), GiteaError> {
        Ok(())
    }
    async fn remove_team_member(&self, _team_id: i64, _login: &str) -> Result<(), GiteaError> {
        Ok(())
    }
    async fn list_team_repos(&self, _team_id: i64) -> Result<Vec<Repository>, GiteaError> {
        Ok(Vec::new())
    }
    async fn add_team_repo(
        &self,
        _team_id: i64,
        _owner: &str,
        _repo: &str,
    ) -> Result<(), GiteaError> {
        Ok(())
    }
    async fn add_collaborator(
        &self,
        _owner: &str,
        _repo: &str,
        _login: &str,
        _permission: &str,
    ) -> Result<(), GiteaError> {
        Ok(())
    }
    async fn list_org_hooks(&self, _org: &str) -> Result<Vec<Hook>, GiteaError> {
        Ok(Vec::new())
    }
    async fn create_org_hook(
        &self,
        _org: &str,
        _url: &str,
        _secret: &str,
    ) -> Result<Hook, GiteaError> {
        Err(GiteaError::Status {
            status: 500,
            path: "/orgs/hooks".to_string(),
            body: "not under test".to_string(),
        })
    }
}

fn make_ctx(dir: &TempDir, directory: Arc<StubDirectory>) -> Arc<AppContext> {
    let mut config = DaemonConfig::default();
    config.data_dir = dir.path().to_path_buf();
    Arc::new(AppContext::new(config, directory, Arc::new(NullGitea)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_registers_and_persists() {
    let dir = TempDir::new().unwrap();
    let directory = Arc::new(StubDirectory::with_department("eng", &["a", "b"]));
    let ctx = make_ctx(&dir, directory.clone());

    create_collab_group(&ctx, "eng-collab", "eng", "eng + guests")
        .await
        .expect("create");

    let meta = ctx.collab.get("eng-collab").await.expect("registered");
    assert_eq!(meta.base_department, "eng");
    assert!(meta.extra_members.is_empty());
    assert!(directory.groups.lock().unwrap().contains_key("eng-collab"));

    let raw = std::fs::read_to_string(dir.path().join("state.json")).expect("persisted");
    assert!(raw.contains("\"eng-collab\""));
}

#[tokio::test]
async fn create_requires_an_existing_base_department() {
    let dir = TempDir::new().unwrap();
    let directory = Arc::new(StubDirectory::default());
    let ctx = make_ctx(&dir, directory);

    let result = create_collab_group(&ctx, "ghost-collab", "ghost", "").await;
    assert!(result.is_err());
    assert!(ctx.collab.get("ghost-collab").await.is_none());
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let dir = TempDir::new().unwrap();
    let directory = Arc::new(StubDirectory::with_department("eng", &["a"]));
    let ctx = make_ctx(&dir, directory);

    create_collab_group(&ctx, "eng-collab", "eng", "").await.expect("create");
    assert!(create_collab_group(&ctx, "eng-collab", "eng", "").await.is_err());
}

#[tokio::test]
async fn composition_is_order_independent() {
    let dir = TempDir::new().unwrap();
    let directory = Arc::new(StubDirectory::with_department("eng", &["a", "b"]));
    let ctx = make_ctx(&dir, directory.clone());

    create_collab_group(&ctx, "eng-collab", "eng", "").await.expect("create");
    add_collab_member(&ctx, "eng-collab", "c").await.expect("add c");
    add_collab_member(&ctx, "eng-collab", "d").await.expect("add d");
    remove_collab_member(&ctx, "eng-collab", "d").await.expect("remove d");
    // Re-adding an already-present extra is a no-op.
    add_collab_member(&ctx, "eng-collab", "c").await.expect("re-add c");

    let meta = ctx.collab.get("eng-collab").await.unwrap();
    let dept = directory.get_department("eng").await.unwrap();
    let live = directory.get_group("eng-collab").await.unwrap();
    let res = resolver::resolve_collab(&meta, &dept, &live);

    let members: Vec<&str> = res.membership.members.iter().map(String::as_str).collect();
    assert_eq!(members, vec!["a", "b", "c"]);

    // Dropping the extra restores the plain department membership.
    remove_collab_member(&ctx, "eng-collab", "c").await.expect("remove c");
    let meta = ctx.collab.get("eng-collab").await.unwrap();
    let res = resolver::resolve_collab(&meta, &dept, &live);
    let members: Vec<&str> = res.membership.members.iter().map(String::as_str).collect();
    assert_eq!(members, vec!["a", "b"]);
}

#[tokio::test]
async fn delete_removes_group_and_registry_entry() {
    let dir = TempDir::new().unwrap();
    let directory = Arc::new(StubDirectory::with_department("eng", &["a"]));
    let ctx = make_ctx(&dir, directory.clone());

    create_collab_group(&ctx, "eng-collab", "eng", "").await.expect("create");
    delete_collab_group(&ctx, "eng-collab").await.expect("delete");

    assert!(ctx.collab.get("eng-collab").await.is_none());
    assert!(!directory.groups.lock().unwrap().contains_key("eng-collab"));

    let raw = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
    assert!(!raw.contains("eng-collab"));
}

#[tokio::test]
async fn registry_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let directory = Arc::new(StubDirectory::with_department("eng", &["a"]));
    let ctx = make_ctx(&dir, directory.clone());

    create_collab_group(&ctx, "eng-collab", "eng", "").await.expect("create");
    add_collab_member(&ctx, "eng-collab", "zoe").await.expect("add");

    // Fresh context over the same data dir — as after a crash.
    let ctx2 = make_ctx(&dir, directory);
    let state = ctx2.state_store.load().await.expect("load");
    ctx2.restore_state(state).await;

    let meta = ctx2.collab.get("eng-collab").await.expect("restored");
    assert_eq!(
        meta,
        CollabGroupMeta {
            base_department: "eng".to_string(),
            extra_members: ["zoe"].iter().map(|m| m.to_string()).collect(),
        }
    );
}
