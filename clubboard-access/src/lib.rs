// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access decisions for club projects.
//!
//! Answers "may the signed-in user perform this action on this project" for many views at once.
//! Roles are looked up asynchronously from an external membership source, mapped through a
//! static policy table and cached per project. Views query an [`AccessResolver`] synchronously
//! and get a conservative "no" until the decision is known. Mutation flows announce changes via
//! the [`InvalidationChannel`] so that stale decisions are dropped.
//!
//! ```ignore
//! let control = AccessControl::new(MemoryMembershipStore::new(), Config::new());
//! control.sign_in("ada");
//!
//! let access = control.resolver("chess-club");
//! if access.is_loading() {
//!     // render pending state
//! } else if access.can(ProjectAction::ViewSettings) {
//!     // render settings link
//! }
//!
//! // After deleting the project:
//! control.invalidation().notify_project_changed(access.project_id());
//! ```
mod access;
pub mod cache;
mod config;
mod control;
mod invalidation;
mod membership;
pub mod memory;
mod policy;
mod resolver;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;
mod types;

pub use access::{ParseActionError, ParseRoleError, ProjectAction, Role};
pub use cache::{AccessCache, AccessEntry, BeginLoad, LoadTicket, Status};
pub use config::Config;
pub use control::AccessControl;
pub use invalidation::InvalidationChannel;
pub use membership::{LookupFailure, MembershipResolver};
pub use memory::{MemoryMembershipStore, MemoryStoreError};
pub use policy::{PermissionSet, PolicyTable};
pub use resolver::AccessResolver;
pub use types::{ProjectId, UserId};
