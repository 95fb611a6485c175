// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;
use std::future::Future;

use crate::access::Role;
use crate::types::{ProjectId, UserId};

/// External store holding which users are related to which projects.
///
/// Implementations must keep "no relationship" and "query failed" apart: a missing project or a
/// user without membership is `Ok(None)` (or `Ok(Some(Role::None))`), only transport or
/// infrastructure problems are errors.
pub trait MembershipSource: Send + Sync + 'static {
    type Error: Error + Send + Sync + 'static;

    /// Look up the role of `user_id` in `project_id`.
    fn role(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send;
}
