// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::cache::{AccessCache, LoadTicket};
use crate::config::Config;
use crate::invalidation::InvalidationChannel;
use crate::membership::MembershipResolver;
use crate::policy::PolicyTable;
use crate::resolver::AccessResolver;
use crate::traits::MembershipSource;
use crate::types::{ProjectId, UserId};

/// The user access decisions are currently made for.
#[derive(Debug, Default)]
pub(crate) struct Session {
    user_id: RwLock<Option<UserId>>,
}

impl Session {
    pub(crate) fn current(&self) -> Option<UserId> {
        self.user_id.read().clone()
    }

    /// Replace the signed-in user, returning the previous one.
    pub(crate) fn replace(&self, user_id: Option<UserId>) -> Option<UserId> {
        std::mem::replace(&mut *self.user_id.write(), user_id)
    }
}

/// Shared access-control context of the application.
///
/// Owns the process-wide access cache, the membership resolver and the signed-in session. Only
/// one instance should exist per application; clones are cheap and share all state.
///
/// Lookups are spawned onto the Tokio runtime captured at construction, so facades can be
/// queried from synchronous code.
pub struct AccessControl<S> {
    cache: Arc<AccessCache>,
    session: Arc<Session>,
    membership: Arc<MembershipResolver<S>>,
    runtime: Handle,
}

impl<S> Clone for AccessControl<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            session: self.session.clone(),
            membership: self.membership.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<S> AccessControl<S>
where
    S: MembershipSource,
{
    /// Create the context on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime, use `with_runtime` then.
    pub fn new(source: S, config: Config) -> Self {
        Self::with_runtime(source, config, Handle::current())
    }

    /// Create the context spawning lookups onto the given runtime.
    pub fn with_runtime(source: S, config: Config, runtime: Handle) -> Self {
        Self {
            cache: Arc::new(AccessCache::new(config)),
            session: Arc::new(Session::default()),
            membership: Arc::new(MembershipResolver::new(source)),
            runtime,
        }
    }

    /// Facade answering access questions for `project_id`.
    ///
    /// Creating the facade starts resolving the project if nothing is known about it yet.
    pub fn resolver(&self, project_id: impl Into<ProjectId>) -> AccessResolver<S> {
        AccessResolver::new(self.clone(), project_id.into())
    }

    /// Channel through which mutation and session flows announce changes.
    pub fn invalidation(&self) -> InvalidationChannel {
        InvalidationChannel::new(self.cache.clone(), self.session.clone())
    }

    /// Shorthand for `invalidation().notify_signed_in(user_id)`.
    pub fn sign_in(&self, user_id: impl Into<UserId>) {
        self.invalidation().notify_signed_in(user_id.into());
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.session.current()
    }

    pub fn cache(&self) -> &AccessCache {
        &self.cache
    }

    pub fn membership(&self) -> &MembershipResolver<S> {
        &self.membership
    }

    /// Start resolving `project_id` unless a lookup is already in flight or a fresh decision
    /// exists. Without a signed-in user nothing is resolved.
    pub(crate) fn trigger(&self, project_id: &ProjectId) {
        let Some(user_id) = self.session.current() else {
            return;
        };

        if let Some(ticket) = self.cache.begin_load(project_id, &user_id).into_ticket() {
            let lookup = PendingLookup::new(self.cache.clone(), ticket);
            let control = self.clone();
            self.runtime.spawn(async move {
                control.resolve(lookup).await;
            });
        }
    }

    async fn resolve(&self, mut lookup: PendingLookup) {
        let Some(ticket) = lookup.ticket.as_ref() else {
            return;
        };

        let result = self
            .membership
            .resolve_role(ticket.user_id(), ticket.project_id())
            .await;

        let Some(ticket) = lookup.ticket.take() else {
            return;
        };
        match result {
            Ok(role) => {
                debug!(
                    user_id = %ticket.user_id(),
                    project_id = %ticket.project_id(),
                    %role,
                    "access resolved"
                );
                self.cache.complete(ticket, role, PolicyTable::permissions(role));
            }
            Err(_) => {
                // Logged by the membership resolver. The entry is retried on the next check.
                self.cache.fail(ticket);
            }
        }
    }
}

/// Lookup claimed from the cache and not settled yet.
///
/// Dropping it unsettled fails the entry, this happens when the lookup panics or the runtime
/// shut down before running it.
struct PendingLookup {
    cache: Arc<AccessCache>,
    ticket: Option<LoadTicket>,
}

impl PendingLookup {
    fn new(cache: Arc<AccessCache>, ticket: LoadTicket) -> Self {
        Self {
            cache,
            ticket: Some(ticket),
        }
    }
}

impl Drop for PendingLookup {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            warn!(project_id = %ticket.project_id(), "access lookup aborted");
            self.cache.fail(ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::access::ProjectAction;
    use crate::cache::AccessCache;
    use crate::config::Config;
    use crate::test_utils::MockMembershipSource;
    use crate::types::{ProjectId, UserId};

    use super::{AccessControl, PendingLookup, Session};

    #[test]
    fn session_replace_returns_previous_user() {
        let session = Session::default();
        assert_eq!(session.replace(Some(UserId::from("ada"))), None);
        assert_eq!(
            session.replace(Some(UserId::from("bob"))),
            Some(UserId::from("ada"))
        );
        assert_eq!(session.current(), Some(UserId::from("bob")));
    }

    #[test]
    fn runs_on_an_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let source = MockMembershipSource::new();
        let control =
            AccessControl::with_runtime(source.clone(), Config::new(), runtime.handle().clone());
        control.sign_in("ada");

        // Synchronous caller outside of the runtime.
        let resolver = control.resolver("p1");
        assert!(resolver.is_loading());

        let entry = runtime.block_on(resolver.ready());
        assert!(entry.is_ready());
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn dropped_lookup_fails_its_entry() {
        let cache = Arc::new(AccessCache::default());
        let project_id = ProjectId::from("p1");
        let user_id = UserId::from("ada");

        let ticket = cache.begin_load(&project_id, &user_id).into_ticket().unwrap();
        drop(PendingLookup::new(cache.clone(), ticket));

        assert!(cache.get(&project_id, &user_id).unwrap().is_error());
    }

    #[test]
    fn lookups_on_a_stopped_runtime_do_not_stay_loading() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let handle = runtime.handle().clone();
        drop(runtime);

        let source = MockMembershipSource::new();
        let control = AccessControl::with_runtime(source.clone(), Config::new(), handle);
        control.sign_in("ada");

        let resolver = control.resolver("p1");
        assert!(resolver.entry().is_error());
        assert!(!resolver.is_loading());
        assert!(!resolver.can(ProjectAction::ViewSettings));
        assert_eq!(source.calls(), 0);
    }
}
