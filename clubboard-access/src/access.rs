// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relationship of a user to a project.
///
/// Exactly one role applies per user and project at any instant. `None` covers every case where
/// no relationship exists, including projects which were deleted or memberships which were
/// revoked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Role {
    /// Created the project or was handed ownership of it.
    Owner,

    /// Regular contributor.
    Member,

    /// Read-only participant.
    Viewer,

    /// No relationship to the project.
    #[default]
    None,
}

impl Role {
    pub fn is_owner(&self) -> bool {
        matches!(self, Role::Owner)
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Role::Member)
    }

    pub fn is_viewer(&self) -> bool {
        matches!(self, Role::Viewer)
    }

    /// Returns `true` if the user has any relationship to the project.
    pub fn is_some(&self) -> bool {
        !matches!(self, Role::None)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Owner => "owner",
            Role::Member => "member",
            Role::Viewer => "viewer",
            Role::None => "none",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            "none" => Ok(Role::None),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role \"{0}\"")]
pub struct ParseRoleError(String);

/// Privileged operations on a project which are gated by an access decision.
///
/// New actions are denied for every role until they are granted explicitly in the policy table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
#[non_exhaustive]
pub enum ProjectAction {
    /// Open the project settings page.
    ViewSettings,

    /// Create or edit the shared custom-field options of a project.
    UpdateOptions,

    /// Close the project, removing it from the list of open projects.
    CloseProject,

    /// Delete the project permanently.
    DeleteProject,
}

impl ProjectAction {
    pub const ALL: [ProjectAction; 4] = [
        ProjectAction::ViewSettings,
        ProjectAction::UpdateOptions,
        ProjectAction::CloseProject,
        ProjectAction::DeleteProject,
    ];

    /// Actions which can not be undone from within the project once performed.
    pub fn is_irreversible(&self) -> bool {
        matches!(self, ProjectAction::CloseProject | ProjectAction::DeleteProject)
    }
}

impl Display for ProjectAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectAction::ViewSettings => "view_settings",
            ProjectAction::UpdateOptions => "update_options",
            ProjectAction::CloseProject => "close_project",
            ProjectAction::DeleteProject => "delete_project",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for ProjectAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.to_string() == s)
            .ok_or_else(|| ParseActionError(s.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown project action \"{0}\"")]
pub struct ParseActionError(String);

#[cfg(test)]
mod tests {
    use super::{ParseRoleError, ProjectAction, Role};

    #[test]
    fn role_names() {
        for role in [Role::Owner, Role::Member, Role::Viewer, Role::None] {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }

        assert_eq!(
            "admin".parse::<Role>(),
            Err(ParseRoleError("admin".to_string()))
        );

        // Names are matched exactly as stored by the membership table.
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn action_names() {
        assert_eq!(
            "delete_project".parse::<ProjectAction>(),
            Ok(ProjectAction::DeleteProject)
        );
        assert!("DELETE_PROJECT".parse::<ProjectAction>().is_err());
        assert_eq!(ProjectAction::UpdateOptions.to_string(), "update_options");
    }

    #[test]
    fn closing_and_deleting_are_irreversible() {
        let irreversible: Vec<ProjectAction> = ProjectAction::ALL
            .into_iter()
            .filter(ProjectAction::is_irreversible)
            .collect();
        assert_eq!(
            irreversible,
            [ProjectAction::CloseProject, ProjectAction::DeleteProject]
        );
    }

    #[test]
    fn only_none_has_no_relationship() {
        assert!(Role::Owner.is_some());
        assert!(Role::Viewer.is_some());
        assert!(!Role::None.is_some());
        assert_eq!(Role::default(), Role::None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_names_match_display() {
        let json = serde_json::to_string(&ProjectAction::CloseProject).unwrap();
        assert_eq!(json, "\"close_project\"");

        let role: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, Role::Viewer);
    }
}
