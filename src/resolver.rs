//! Membership resolution.
//!
//! Pure functions turning a directory aggregate into the member set, the
//! repository set, and the manager (if any) that the team sync should
//! converge on. No I/O happens here — collab resolution takes the live
//! group record as an argument and returns the correction to apply, so
//! fixtures in tests never need a directory.

use std::collections::BTreeSet;

use crate::collab::CollabGroupMeta;
use crate::directory::{Department, DirGroup};
use crate::repo_ref::RepoRef;

/// The state a team should be brought to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMembership {
    pub members: BTreeSet<String>,
    /// Deduplicated after normalization.
    pub repositories: Vec<RepoRef>,
    pub manager: Option<String>,
    /// Raw references that failed to parse — reported, never fatal.
    pub skipped_repos: Vec<String>,
}

/// Membership correction for a collab group's directory record, which only
/// caches the composed member list and may have drifted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollabResolution {
    pub membership: ResolvedMembership,
    /// UIDs missing from the live group record.
    pub to_add: Vec<String>,
    /// UIDs in the live group record that no longer belong.
    pub to_remove: Vec<String>,
}

fn normalize_repos(raw: &[String]) -> (Vec<RepoRef>, Vec<String>) {
    let mut seen = BTreeSet::new();
    let mut skipped = Vec::new();
    for r in raw {
        match RepoRef::parse(r) {
            Ok(repo) => {
                seen.insert(repo);
            }
            Err(_) => skipped.push(r.clone()),
        }
    }
    (seen.into_iter().collect(), skipped)
}

/// A plain group maps one-to-one: its members, its repositories, no manager.
pub fn resolve_group(group: &DirGroup) -> ResolvedMembership {
    let (repositories, skipped_repos) = normalize_repos(&group.repositories);
    ResolvedMembership {
        members: group.members.clone(),
        repositories,
        manager: None,
        skipped_repos,
    }
}

/// A department adds the manager, who is granted admin on every department
/// repository even when not a regular member.
pub fn resolve_department(dept: &Department) -> ResolvedMembership {
    let (repositories, skipped_repos) = normalize_repos(&dept.repositories);
    ResolvedMembership {
        members: dept.members.clone(),
        repositories,
        manager: dept.manager.clone().filter(|m| !m.is_empty()),
        skipped_repos,
    }
}

/// A collab group composes the base department's members with the explicit
/// extras; repositories come from the group record itself. The live group's
/// member list is a cache — the returned correction brings it back in line.
pub fn resolve_collab(
    meta: &CollabGroupMeta,
    dept: &Department,
    live: &DirGroup,
) -> CollabResolution {
    let mut members = dept.members.clone();
    members.extend(meta.extra_members.iter().cloned());

    let (repositories, skipped_repos) = normalize_repos(&live.repositories);

    let to_add = members
        .iter()
        .filter(|m| !live.members.contains(*m))
        .cloned()
        .collect();
    let to_remove = live
        .members
        .iter()
        .filter(|m| !members.contains(*m))
        .cloned()
        .collect();

    CollabResolution {
        membership: ResolvedMembership {
            members,
            repositories,
            manager: dept.manager.clone().filter(|m| !m.is_empty()),
            skipped_repos,
        },
        to_add,
        to_remove,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(members: &[&str], manager: Option<&str>) -> Department {
        Department {
            name: "eng".into(),
            description: String::new(),
            manager: manager.map(String::from),
            members: members.iter().map(|m| m.to_string()).collect(),
            repositories: vec!["org/svc-a".into()],
        }
    }

    #[test]
    fn group_resolution_is_verbatim() {
        let group = DirGroup {
            name: "ops".into(),
            members: ["a", "b"].iter().map(|m| m.to_string()).collect(),
            repositories: vec![
                "https://git.example.com/org/svc-a".into(),
                "org/svc-a".into(),
                "org/svc-b.git".into(),
            ],
            ..Default::default()
        };
        let resolved = resolve_group(&group);
        assert_eq!(resolved.members.len(), 2);
        assert!(resolved.manager.is_none());
        // URL and bare forms of the same repository collapse to one.
        assert_eq!(resolved.repositories.len(), 2);
        assert!(resolved.skipped_repos.is_empty());
    }

    #[test]
    fn department_resolution_carries_the_manager() {
        let resolved = resolve_department(&dept(&["a", "b"], Some("alice")));
        assert_eq!(resolved.manager.as_deref(), Some("alice"));
    }

    #[test]
    fn empty_manager_is_treated_as_unset() {
        let resolved = resolve_department(&dept(&["a"], Some("")));
        assert!(resolved.manager.is_none());
    }

    #[test]
    fn unparseable_repos_are_skipped_not_fatal() {
        let mut d = dept(&["a"], None);
        d.repositories.push("not a repo".into());
        let resolved = resolve_department(&d);
        assert_eq!(resolved.repositories.len(), 1);
        assert_eq!(resolved.skipped_repos, vec!["not a repo".to_string()]);
    }

    #[test]
    fn collab_composes_department_and_extras() {
        let meta = CollabGroupMeta {
            base_department: "eng".into(),
            extra_members: ["c"].iter().map(|m| m.to_string()).collect(),
        };
        let live = DirGroup {
            name: "eng-collab".into(),
            members: ["b", "d"].iter().map(|m| m.to_string()).collect(),
            repositories: vec!["org/svc-x".into()],
            ..Default::default()
        };

        let res = resolve_collab(&meta, &dept(&["a", "b"], Some("alice")), &live);
        let members: Vec<&str> = res.membership.members.iter().map(String::as_str).collect();
        assert_eq!(members, vec!["a", "b", "c"]);
        assert_eq!(res.to_add, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(res.to_remove, vec!["d".to_string()]);
        // Repositories come from the group record, not the department.
        assert_eq!(res.membership.repositories[0].full_name(), "org/svc-x");
        assert_eq!(res.membership.manager.as_deref(), Some("alice"));
    }

    #[test]
    fn removing_an_extra_restores_the_base_membership() {
        let mut meta = CollabGroupMeta {
            base_department: "eng".into(),
            extra_members: ["c"].iter().map(|m| m.to_string()).collect(),
        };
        meta.extra_members.remove("c");

        let live = DirGroup {
            name: "eng-collab".into(),
            members: ["a", "b", "c"].iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        };
        let res = resolve_collab(&meta, &dept(&["a", "b"], None), &live);
        let members: Vec<&str> = res.membership.members.iter().map(String::as_str).collect();
        assert_eq!(members, vec!["a", "b"]);
        assert_eq!(res.to_remove, vec!["c".to_string()]);
    }
}
