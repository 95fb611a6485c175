// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory membership store.
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::access::Role;
use crate::traits::MembershipSource;
use crate::types::{ProjectId, UserId};

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashMap<ProjectId, HashMap<UserId, Role>>,
}

/// Membership source keeping all projects and their members in memory.
///
/// Clones share the same underlying state.
#[derive(Clone, Debug, Default)]
pub struct MemoryMembershipStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a project with `owner` as its only member. An existing project with the same id
    /// is replaced.
    pub async fn insert_project(&self, project_id: &ProjectId, owner: &UserId) {
        let mut state = self.state.write().await;
        state.projects.insert(
            project_id.clone(),
            HashMap::from([(owner.clone(), Role::Owner)]),
        );
    }

    /// Remove a project and all its memberships.
    ///
    /// Returns `true` when the project existed.
    pub async fn delete_project(&self, project_id: &ProjectId) -> bool {
        let mut state = self.state.write().await;
        state.projects.remove(project_id).is_some()
    }

    /// Assign `role` to `user_id`. Assigning `Role::None` removes the membership.
    pub async fn set_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        role: Role,
    ) -> Result<(), MemoryStoreError> {
        let mut state = self.state.write().await;
        let Some(members) = state.projects.get_mut(project_id) else {
            return Err(MemoryStoreError::ProjectNotFound(project_id.clone()));
        };

        if role.is_some() {
            members.insert(user_id.clone(), role);
        } else {
            members.remove(user_id);
        }

        Ok(())
    }

    /// Remove the membership of `user_id`.
    ///
    /// Returns `true` when the user was a member.
    pub async fn remove_member(&self, project_id: &ProjectId, user_id: &UserId) -> bool {
        let mut state = self.state.write().await;
        state
            .projects
            .get_mut(project_id)
            .is_some_and(|members| members.remove(user_id).is_some())
    }
}

impl MembershipSource for MemoryMembershipStore {
    type Error = Infallible;

    async fn role(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Option<Role>, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .projects
            .get(project_id)
            .and_then(|members| members.get(user_id))
            .copied())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),
}

#[cfg(test)]
mod tests {
    use crate::access::Role;
    use crate::traits::MembershipSource;
    use crate::types::{ProjectId, UserId};

    use super::{MemoryMembershipStore, MemoryStoreError};

    #[tokio::test]
    async fn membership_lifecycle() {
        let store = MemoryMembershipStore::new();
        let project_id = ProjectId::from("book-club");
        let ada = UserId::from("ada");
        let bob = UserId::from("bob");

        assert_eq!(
            store.set_member(&project_id, &bob, Role::Member).await,
            Err(MemoryStoreError::ProjectNotFound(project_id.clone()))
        );

        store.insert_project(&project_id, &ada).await;
        store
            .set_member(&project_id, &bob, Role::Member)
            .await
            .unwrap();
        assert_eq!(
            store.role(&bob, &project_id).await.unwrap(),
            Some(Role::Member)
        );

        // Demote.
        store
            .set_member(&project_id, &bob, Role::Viewer)
            .await
            .unwrap();
        assert_eq!(
            store.role(&bob, &project_id).await.unwrap(),
            Some(Role::Viewer)
        );

        // Assigning no role removes the membership.
        store.set_member(&project_id, &bob, Role::None).await.unwrap();
        assert_eq!(store.role(&bob, &project_id).await.unwrap(), None);
        assert!(!store.remove_member(&project_id, &bob).await);

        assert!(store.delete_project(&project_id).await);
        assert_eq!(store.role(&ada, &project_id).await.unwrap(), None);
        assert!(!store.delete_project(&project_id).await);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryMembershipStore::new();
        let handle = store.clone();
        let project_id = ProjectId::from("chess-club");
        let ada = UserId::from("ada");

        handle.insert_project(&project_id, &ada).await;
        assert_eq!(
            store.role(&ada, &project_id).await.unwrap(),
            Some(Role::Owner)
        );
    }
}
