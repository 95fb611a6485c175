// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static mapping from roles to the project actions they are allowed to perform.
use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::access::{ProjectAction, Role};

/// Explicit grants per role. Any pair missing here is denied.
///
/// This table needs to be reviewed whenever a new `ProjectAction` is introduced.
const GRANTS: &[(Role, &[ProjectAction])] = &[
    (
        Role::Owner,
        &[
            ProjectAction::ViewSettings,
            ProjectAction::UpdateOptions,
            ProjectAction::CloseProject,
            ProjectAction::DeleteProject,
        ],
    ),
    (
        Role::Member,
        &[ProjectAction::ViewSettings, ProjectAction::UpdateOptions],
    ),
    (Role::Viewer, &[]),
];

/// Pure, deny-by-default policy over `GRANTS`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyTable;

impl PolicyTable {
    /// Returns `true` only if `action` is granted to `role` explicitly.
    pub fn is_allowed(role: Role, action: ProjectAction) -> bool {
        GRANTS
            .iter()
            .find(|(granted_role, _)| *granted_role == role)
            .is_some_and(|(_, actions)| actions.contains(&action))
    }

    /// Computes the full set of actions granted to `role`.
    pub fn permissions(role: Role) -> PermissionSet {
        let actions = ProjectAction::ALL
            .into_iter()
            .filter(|action| Self::is_allowed(role, *action))
            .collect();

        PermissionSet(actions)
    }
}

/// Set of actions a role is allowed to perform on a project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct PermissionSet(BTreeSet<ProjectAction>);

impl PermissionSet {
    /// Set which allows nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, action: ProjectAction) -> bool {
        self.0.contains(&action)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProjectAction> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ProjectAction> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = ProjectAction>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
