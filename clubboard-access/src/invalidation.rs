// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use tracing::debug;

use crate::cache::AccessCache;
use crate::control::Session;
use crate::types::{ProjectId, UserId};

/// Named operations through which mutation and session flows mark access decisions as stale.
///
/// Flows closing or deleting a project, or changing its memberships, call
/// `notify_project_changed` as part of the same operation, before navigating away. Every call is
/// synchronous and infallible.
#[derive(Clone, Debug)]
pub struct InvalidationChannel {
    cache: Arc<AccessCache>,
    session: Arc<Session>,
}

impl InvalidationChannel {
    pub(crate) fn new(cache: Arc<AccessCache>, session: Arc<Session>) -> Self {
        Self { cache, session }
    }

    /// The project was closed, deleted or its memberships or roles changed.
    pub fn notify_project_changed(&self, project_id: &ProjectId) {
        debug!(%project_id, "project changed");
        self.cache.invalidate(project_id);
    }

    /// A user signed in. Switching to another user drops all decisions of the previous one.
    pub fn notify_signed_in(&self, user_id: UserId) {
        let previous = self.session.replace(Some(user_id.clone()));
        if previous.as_ref() != Some(&user_id) {
            debug!(%user_id, "signed in");
            self.cache.reset_all();
        }
    }

    /// The user signed out. No decision survives into the next session.
    pub fn notify_signed_out(&self) {
        self.session.replace(None);
        debug!("signed out");
        self.cache.reset_all();
    }
}
