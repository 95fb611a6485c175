// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide store of access decisions per project.
//!
//! Every entry moves through a small state machine:
//!
//! ```text
//! (absent) --begin_load--> Loading --complete--> Ready
//!                             |
//!                             +------fail------> Error --begin_load--> Loading
//! ```
//!
//! `begin_load` is the only place where a lookup is claimed. Whoever receives a `LoadTicket` is
//! the single fetcher for that project until the ticket is settled with `complete` or `fail`.
//! Invalidating an entry or resetting the cache while a lookup is in flight orphans its ticket
//! and the late result is dropped.
//!
//! Entries belong to the user they were claimed for. Reading or claiming a project for another
//! user never sees that entry, a claim replaces it and orphans its ticket.
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::access::{ProjectAction, Role};
use crate::config::Config;
use crate::policy::{PermissionSet, PolicyTable};
use crate::types::{ProjectId, UserId};

/// Lifecycle state of a cached access entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Status {
    /// Nothing known yet.
    Idle,

    /// Membership lookup in flight.
    Loading,

    /// Role and permissions resolved.
    Ready,

    /// Last lookup failed, the next check may retry.
    Error,
}

/// Snapshot of the access decision for one project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessEntry {
    role: Role,
    permissions: PermissionSet,
    status: Status,
    fetched_at: Option<Instant>,
}

impl AccessEntry {
    /// Entry for a project nothing is known about.
    pub fn idle() -> Self {
        Self::with_status(Status::Idle)
    }

    fn with_status(status: Status) -> Self {
        Self {
            role: Role::None,
            permissions: PermissionSet::empty(),
            status,
            fetched_at: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// When the role was resolved. Only set for `Ready` entries.
    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Returns `true` if this entry permits `action`.
    ///
    /// Only `Ready` entries permit anything, and both the policy for the resolved role and the
    /// stored permission set must grant the action.
    pub fn allows(&self, action: ProjectAction) -> bool {
        self.is_ready()
            && PolicyTable::is_allowed(self.role, action)
            && self.permissions.contains(action)
    }
}

impl Default for AccessEntry {
    fn default() -> Self {
        Self::idle()
    }
}

/// Claim on the single in-flight lookup for a project.
#[derive(Debug)]
pub struct LoadTicket {
    project_id: ProjectId,
    user_id: UserId,
    id: u64,
}

impl LoadTicket {
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// User the lookup is performed for.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

/// Outcome of `AccessCache::begin_load`.
#[derive(Debug)]
pub enum BeginLoad {
    /// Entry moved to `Loading`; the holder of the ticket performs the lookup.
    Started(LoadTicket),

    /// Another caller is already looking up this project.
    AlreadyLoading,

    /// Entry is resolved and still fresh.
    Ready,

    /// Last lookup failed too recently to try again.
    RetryLater,
}

impl BeginLoad {
    pub fn already_loading(&self) -> bool {
        matches!(self, BeginLoad::AlreadyLoading)
    }

    pub fn into_ticket(self) -> Option<LoadTicket> {
        match self {
            BeginLoad::Started(ticket) => Some(ticket),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct Slot {
    entry: AccessEntry,
    user_id: UserId,
    ticket: Option<u64>,
    failed_at: Option<Instant>,
}

impl Slot {
    fn loading(ticket: &LoadTicket) -> Self {
        Self {
            entry: AccessEntry::with_status(Status::Loading),
            user_id: ticket.user_id.clone(),
            ticket: Some(ticket.id),
            failed_at: None,
        }
    }
}

/// Concurrent map from project to access entry.
///
/// Each project's entry is replaced as a whole record under the lock of its shard, other
/// projects stay readable while one is updated.
#[derive(Debug)]
pub struct AccessCache {
    entries: DashMap<ProjectId, Slot>,
    next_ticket: AtomicU64,
    version: watch::Sender<u64>,
    config: Config,
}

impl AccessCache {
    pub fn new(config: Config) -> Self {
        Self {
            entries: DashMap::new(),
            next_ticket: AtomicU64::new(0),
            version: watch::Sender::new(0),
            config,
        }
    }

    /// Snapshot of the entry `user_id` has for `project_id`, if any.
    pub fn get(&self, project_id: &ProjectId, user_id: &UserId) -> Option<AccessEntry> {
        self.entries
            .get(project_id)
            .filter(|slot| slot.user_id == *user_id)
            .map(|slot| slot.entry.clone())
    }

    /// Try to claim the lookup of `user_id`'s role in `project_id`.
    ///
    /// Absent, idle and failed entries (once the retry interval passed) as well as expired
    /// ready entries move to `Loading` and a ticket is returned. The dedup check: an entry which
    /// is already `Loading` is left untouched and the caller must not start another lookup.
    /// Entries of another user are always replaced.
    pub fn begin_load(&self, project_id: &ProjectId, user_id: &UserId) -> BeginLoad {
        let now = Instant::now();

        let outcome = match self.entries.entry(project_id.clone()) {
            Entry::Vacant(vacant) => {
                let ticket = self.ticket(project_id, user_id);
                vacant.insert(Slot::loading(&ticket));
                BeginLoad::Started(ticket)
            }
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get();
                let blocked = match slot.entry.status {
                    _ if slot.user_id != *user_id => None,
                    Status::Loading => Some(BeginLoad::AlreadyLoading),
                    Status::Ready if self.is_fresh_at(&slot.entry, now) => Some(BeginLoad::Ready),
                    Status::Error if self.retry_pending(slot, now) => Some(BeginLoad::RetryLater),
                    _ => None,
                };

                match blocked {
                    Some(outcome) => outcome,
                    None => {
                        let ticket = self.ticket(project_id, user_id);
                        occupied.insert(Slot::loading(&ticket));
                        BeginLoad::Started(ticket)
                    }
                }
            }
        };

        if let BeginLoad::Started(ticket) = &outcome {
            trace!(%project_id, ticket = ticket.id, "begin access lookup");
            self.notify();
        }

        outcome
    }

    /// Settle a lookup with its resolved role. Returns `false` if the ticket was orphaned by an
    /// invalidation or reset, in which case nothing is written.
    pub fn complete(&self, ticket: LoadTicket, role: Role, permissions: PermissionSet) -> bool {
        let entry = AccessEntry {
            role,
            permissions,
            status: Status::Ready,
            fetched_at: Some(Instant::now()),
        };

        let user_id = ticket.user_id.clone();
        self.settle(
            ticket,
            Slot {
                entry,
                user_id,
                ticket: None,
                failed_at: None,
            },
        )
    }

    /// Settle a lookup which could not determine the role. Returns `false` if the ticket was
    /// orphaned.
    pub fn fail(&self, ticket: LoadTicket) -> bool {
        let user_id = ticket.user_id.clone();
        self.settle(
            ticket,
            Slot {
                entry: AccessEntry::with_status(Status::Error),
                user_id,
                ticket: None,
                failed_at: Some(Instant::now()),
            },
        )
    }

    /// Remove the entry for `project_id`. Removing an absent entry is a no-op.
    pub fn invalidate(&self, project_id: &ProjectId) {
        if self.entries.remove(project_id).is_some() {
            debug!(%project_id, "invalidated access entry");
            self.notify();
        }
    }

    /// Remove all entries.
    pub fn reset_all(&self) {
        self.entries.clear();
        debug!("reset access cache");
        self.notify();
    }

    /// Receiver which observes a change every time any entry of the cache changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Returns `true` if a `Ready` entry has not yet outlived the configured maximum age.
    pub fn is_fresh(&self, entry: &AccessEntry) -> bool {
        self.is_fresh_at(entry, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn settle(&self, ticket: LoadTicket, next: Slot) -> bool {
        let status = next.entry.status;
        let applied = match self.entries.get_mut(&ticket.project_id) {
            Some(mut slot) if slot.ticket == Some(ticket.id) => {
                *slot = next;
                true
            }
            _ => false,
        };

        let project_id = &ticket.project_id;
        if applied {
            trace!(%project_id, ticket = ticket.id, ?status, "settled access lookup");
            self.notify();
        } else {
            debug!(%project_id, ticket = ticket.id, "discarding orphaned access lookup");
        }

        applied
    }

    fn ticket(&self, project_id: &ProjectId, user_id: &UserId) -> LoadTicket {
        LoadTicket {
            project_id: project_id.clone(),
            user_id: user_id.clone(),
            id: self.next_ticket.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn is_fresh_at(&self, entry: &AccessEntry, now: Instant) -> bool {
        match (self.config.max_age, entry.fetched_at) {
            (Some(max_age), Some(fetched_at)) => now.duration_since(fetched_at) < max_age,
            _ => true,
        }
    }

    fn retry_pending(&self, slot: &Slot, now: Instant) -> bool {
        slot.failed_at
            .is_some_and(|failed_at| now.duration_since(failed_at) < self.config.retry_interval)
    }

    fn notify(&self) {
        self.version.send_modify(|version| *version = version.wrapping_add(1));
    }
}

impl Default for AccessCache {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
