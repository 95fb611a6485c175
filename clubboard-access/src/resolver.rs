// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::access::{ProjectAction, Role};
use crate::cache::{AccessEntry, Status};
use crate::control::AccessControl;
use crate::traits::MembershipSource;
use crate::types::ProjectId;

/// Access decisions for the signed-in user on one project.
///
/// This is what views talk to: one facade per mounted view which needs decisions for a project.
/// All facades of the same project share one cache entry and at most one membership lookup runs
/// for it at any time.
///
/// `can` never blocks. While the decision is unknown (not resolved yet, loading or failed) every
/// action is denied and `is_loading` tells whether an answer is still on its way. Dropping the
/// facade does not cancel a running lookup, its result still lands in the cache.
pub struct AccessResolver<S> {
    control: AccessControl<S>,
    project_id: ProjectId,
}

impl<S> AccessResolver<S>
where
    S: MembershipSource,
{
    pub(crate) fn new(control: AccessControl<S>, project_id: ProjectId) -> Self {
        control.trigger(&project_id);
        Self {
            control,
            project_id,
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Returns `true` if the signed-in user may perform `action` on the bound project.
    ///
    /// Starts resolving the project when no fresh decision is cached and no lookup is in flight,
    /// this includes retrying after a failed lookup.
    pub fn can(&self, action: ProjectAction) -> bool {
        if self.control.current_user().is_none() {
            return false;
        }

        let entry = self.entry();
        if entry.is_ready() && self.control.cache().is_fresh(&entry) {
            return entry.allows(action);
        }

        self.control.trigger(&self.project_id);
        self.entry().allows(action)
    }

    /// Returns `true` while the membership lookup for the bound project is in flight.
    pub fn is_loading(&self) -> bool {
        self.entry().is_loading()
    }

    /// Resolved role, `Role::None` while the decision is unknown.
    pub fn role(&self) -> Role {
        let entry = self.entry();
        if entry.is_ready() {
            entry.role()
        } else {
            Role::None
        }
    }

    /// Current snapshot of the bound project's entry for the signed-in user.
    pub fn entry(&self) -> AccessEntry {
        self.control
            .current_user()
            .and_then(|user_id| self.control.cache().get(&self.project_id, &user_id))
            .unwrap_or_default()
    }

    /// Bind the facade to another project.
    ///
    /// Decisions of the previous project are never reused, the new project is resolved if
    /// needed.
    pub fn set_project(&mut self, project_id: impl Into<ProjectId>) {
        let project_id = project_id.into();
        if project_id == self.project_id {
            return;
        }

        self.project_id = project_id;
        self.control.trigger(&self.project_id);
    }

    /// Wait until the decision for the bound project is settled.
    ///
    /// Starts a lookup if needed or joins the one already in flight. Returns the `Ready` or
    /// `Error` entry, or the `Idle` entry when no user is signed in.
    pub async fn ready(&self) -> AccessEntry {
        let mut changes = self.control.cache().subscribe();

        loop {
            if self.control.current_user().is_none() {
                return self.entry();
            }

            self.control.trigger(&self.project_id);
            let entry = self.entry();
            match entry.status() {
                Status::Ready | Status::Error => return entry,
                // Invalidated between claiming and reading, claim again.
                Status::Idle => continue,
                Status::Loading => {
                    if changes.changed().await.is_err() {
                        return self.entry();
                    }
                }
            }
        }
    }

    /// Wait until the entry of the bound project differs from what it is now and return the new
    /// snapshot.
    ///
    /// Views use this to re-render when a lookup finishes or the project is invalidated.
    pub async fn changed(&self) -> AccessEntry {
        let mut changes = self.control.cache().subscribe();
        let current = self.entry();

        loop {
            if changes.changed().await.is_err() {
                return self.entry();
            }

            let next = self.entry();
            if next != current {
                return next;
            }
        }
    }
}
