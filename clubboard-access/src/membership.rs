// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use thiserror::Error;
use tracing::{trace, warn};

use crate::access::Role;
use crate::traits::MembershipSource;
use crate::types::{ProjectId, UserId};

/// Determines the role of a user within a project by asking the external membership source.
#[derive(Debug)]
pub struct MembershipResolver<S> {
    source: S,
}

impl<S> MembershipResolver<S>
where
    S: MembershipSource,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve the role of `user_id` in `project_id`.
    ///
    /// A project which does not exist or a user without any recorded relationship resolves to
    /// `Role::None`. Only failures of the membership source itself are reported as errors.
    pub async fn resolve_role(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Role, LookupFailure> {
        match self.source.role(user_id, project_id).await {
            Ok(role) => {
                let role = role.unwrap_or_default();
                trace!(%user_id, %project_id, %role, "resolved project role");
                Ok(role)
            }
            Err(err) => {
                let failure = LookupFailure::from_source(err);
                warn!(%user_id, %project_id, "membership lookup failed: {failure}");
                Err(failure)
            }
        }
    }
}

/// The membership source could not tell which role a user holds.
#[derive(Debug, Error)]
pub enum LookupFailure {
    /// Source unreachable or failing on the transport level.
    #[error("membership source unavailable: {0}")]
    Unavailable(#[source] Box<dyn Error + Send + Sync + 'static>),

    /// Source answered with data which can not be interpreted as a role.
    #[error("malformed membership data: {0}")]
    Malformed(String),
}

impl LookupFailure {
    /// Wraps an error of a membership source. Sources which already report `LookupFailure` keep
    /// their original variant.
    pub fn from_source<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let boxed: Box<dyn Error + Send + Sync + 'static> = Box::new(err);
        match boxed.downcast::<LookupFailure>() {
            Ok(failure) => *failure,
            Err(other) => LookupFailure::Unavailable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::access::Role;
    use crate::memory::MemoryMembershipStore;
    use crate::test_utils::{MockError, MockMembershipSource};
    use crate::traits::MembershipSource;
    use crate::types::{ProjectId, UserId};

    use super::{LookupFailure, MembershipResolver};

    #[tokio::test]
    async fn missing_project_is_not_an_error() {
        let store = MemoryMembershipStore::new();
        let resolver = MembershipResolver::new(store);

        let role = resolver
            .resolve_role(&UserId::from("ada"), &ProjectId::from("unknown"))
            .await
            .unwrap();
        assert_eq!(role, Role::None);
    }

    #[tokio::test]
    async fn resolves_recorded_roles() {
        let store = MemoryMembershipStore::new();
        let project_id = ProjectId::from("chess-club");
        store.insert_project(&project_id, &UserId::from("ada")).await;
        store
            .set_member(&project_id, &UserId::from("bob"), Role::Viewer)
            .await
            .unwrap();

        let resolver = MembershipResolver::new(store);

        assert_eq!(
            resolver
                .resolve_role(&UserId::from("ada"), &project_id)
                .await
                .unwrap(),
            Role::Owner
        );
        assert_eq!(
            resolver
                .resolve_role(&UserId::from("bob"), &project_id)
                .await
                .unwrap(),
            Role::Viewer
        );
        assert_eq!(
            resolver
                .resolve_role(&UserId::from("eve"), &project_id)
                .await
                .unwrap(),
            Role::None
        );
    }

    /// Source which can never be reached.
    struct Offline;

    impl MembershipSource for Offline {
        type Error = std::io::Error;

        async fn role(
            &self,
            _user_id: &UserId,
            _project_id: &ProjectId,
        ) -> Result<Option<Role>, Self::Error> {
            Err(std::io::Error::other("network is unreachable"))
        }
    }

    #[tokio::test]
    async fn source_errors_become_lookup_failures() {
        let resolver = MembershipResolver::new(Offline);
        let result = resolver
            .resolve_role(&UserId::from("ada"), &ProjectId::from("p"))
            .await;
        assert_matches!(
            result,
            Err(LookupFailure::Unavailable(err)) if err.to_string() == "network is unreachable"
        );
    }

    #[tokio::test]
    async fn lookup_failures_from_sources_are_kept() {
        let source = MockMembershipSource::new();
        source.fail_next(MockError::Malformed("role: 42".to_string()));

        let resolver = MembershipResolver::new(source);
        let result = resolver
            .resolve_role(&UserId::from("ada"), &ProjectId::from("p"))
            .await;
        assert_matches!(result, Err(LookupFailure::Malformed(data)) if data == "role: 42");
    }
}
