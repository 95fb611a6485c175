// SPDX-License-Identifier: MIT OR Apache-2.0

mod membership;

pub use membership::MembershipSource;
