// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for mocking the membership source.
//!
//! The mock counts lookups, can be scripted to fail and can hold lookups in flight until they
//! are released, which allows observing the loading state and concurrent callers.
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::access::Role;
use crate::membership::LookupFailure;
use crate::traits::MembershipSource;
use crate::types::{ProjectId, UserId};

/// Scripted failure of the next lookup.
#[derive(Clone, Debug)]
pub enum MockError {
    /// Transport failure, becomes `LookupFailure::Unavailable`.
    Unreachable,

    /// Undecodable answer, becomes `LookupFailure::Malformed`.
    Malformed(String),
}

impl From<MockError> for LookupFailure {
    fn from(value: MockError) -> Self {
        match value {
            MockError::Unreachable => LookupFailure::Unavailable(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            MockError::Malformed(data) => LookupFailure::Malformed(data),
        }
    }
}

#[derive(Debug)]
struct MockState {
    roles: HashMap<(UserId, ProjectId), Role>,
    failures: VecDeque<MockError>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<MockState>,
    calls: AtomicUsize,
    gate: watch::Sender<bool>,
}

/// Membership source answering from a fixed table. Clones share the same state.
#[derive(Clone, Debug)]
pub struct MockMembershipSource {
    inner: Arc<Inner>,
}

impl MockMembershipSource {
    pub fn new() -> Self {
        let inner = Inner {
            state: Mutex::new(MockState {
                roles: HashMap::new(),
                failures: VecDeque::new(),
            }),
            calls: AtomicUsize::new(0),
            gate: watch::Sender::new(true),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn with_role(self, user_id: &str, project_id: &str, role: Role) -> Self {
        self.set_role(user_id, project_id, role);
        self
    }

    pub fn set_role(&self, user_id: &str, project_id: &str, role: Role) {
        let mut state = self.inner.state.lock();
        state
            .roles
            .insert((UserId::from(user_id), ProjectId::from(project_id)), role);
    }

    pub fn remove_role(&self, user_id: &str, project_id: &str) {
        let mut state = self.inner.state.lock();
        state
            .roles
            .remove(&(UserId::from(user_id), ProjectId::from(project_id)));
    }

    /// Let the next lookup fail with `error`.
    pub fn fail_next(&self, error: MockError) {
        self.inner.state.lock().failures.push_back(error);
    }

    /// Keep all following lookups pending until `release` is called.
    pub fn hold(&self) {
        self.inner.gate.send_replace(false);
    }

    /// Let pending and following lookups finish.
    pub fn release(&self) {
        self.inner.gate.send_replace(true);
    }

    /// Number of lookups started so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockMembershipSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipSource for MockMembershipSource {
    type Error = LookupFailure;

    async fn role(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Option<Role>, Self::Error> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.inner.gate.subscribe();
        // The sender lives as long as `self`.
        let _ = gate.wait_for(|open| *open).await;

        let mut state = self.inner.state.lock();
        if let Some(error) = state.failures.pop_front() {
            return Err(error.into());
        }

        Ok(state
            .roles
            .get(&(user_id.clone(), project_id.clone()))
            .copied())
    }
}

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
