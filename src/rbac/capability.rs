//! Coarse capability groups derived from "verb resource" permission pairs.

use serde::Serialize;
use std::collections::BTreeSet;

pub const READ_VERBS: &[&str] = &["get", "list", "watch"];
pub const WRITE_VERBS: &[&str] = &["create", "update", "patch"];
pub const DELETE_VERBS: &[&str] = &["delete"];
pub const EXEC_VERBS: &[&str] = &["create"];
pub const EXEC_RESOURCE: &str = "pods/exec";

const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    Delete,
    Exec,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Read,
        Capability::Write,
        Capability::Delete,
        Capability::Exec,
    ];

    pub fn verbs(&self) -> &'static [&'static str] {
        match self {
            Capability::Read => READ_VERBS,
            Capability::Write => WRITE_VERBS,
            Capability::Delete => DELETE_VERBS,
            Capability::Exec => EXEC_VERBS,
        }
    }

    /// Whether `permissions` grants every verb of this group on a single
    /// resource. Exec is pinned to the `pods/exec` subresource.
    pub fn is_covered_by(&self, permissions: &BTreeSet<String>) -> bool {
        let grants: Vec<(&str, &str)> = permissions
            .iter()
            .filter_map(|p| split_permission(p))
            .collect();
        let granted = |verb: &str, resource: &str| {
            grants.iter().any(|(v, r)| {
                (*v == verb || *v == WILDCARD) && (*r == resource || *r == WILDCARD)
            })
        };

        match self {
            Capability::Exec => self.verbs().iter().all(|verb| granted(*verb, EXEC_RESOURCE)),
            _ => grants
                .iter()
                .map(|(_, resource)| *resource)
                .any(|resource| self.verbs().iter().all(|verb| granted(*verb, resource))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub exec: bool,
}

impl Capabilities {
    pub fn from_permissions(permissions: &BTreeSet<String>) -> Self {
        Self {
            read: Capability::Read.is_covered_by(permissions),
            write: Capability::Write.is_covered_by(permissions),
            delete: Capability::Delete.is_covered_by(permissions),
            exec: Capability::Exec.is_covered_by(permissions),
        }
    }
}

pub fn permission(verb: &str, resource: &str) -> String {
    format!("{} {}", verb, resource)
}

pub fn split_permission(permission: &str) -> Option<(&str, &str)> {
    let (verb, resource) = permission.split_once(' ')?;
    if verb.is_empty() || resource.is_empty() {
        return None;
    }
    Some((verb, resource))
}
