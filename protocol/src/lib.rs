//! # Beacon Protocol
//!
//! Transport-agnostic core of the Beacon crowdfunding coordination service.
//! Contributors submit signed partial-transaction *pledges* toward a
//! project's funding target; once the target is reached the project owner
//! combines every open pledge into one claim transaction that collects all
//! funds atomically. This crate owns the pieces that must stay consistent
//! under concurrent untrusted input:
//!
//! | Concern          | Module     |
//! |------------------|------------|
//! | Pledge state     | [`store`]  |
//! | Owner signatures | [`auth`]   |
//! | Status + privacy | [`status`] |
//! | Shared types     | [`types`]  |
//! | Error taxonomy   | [`errors`] |
//!
//! The HTTP surface, pledge intake, persistence, and chain collaborators
//! live in the `beacon-server` binary crate.

pub mod auth;
pub mod errors;
pub mod status;
pub mod store;
pub mod types;

#[cfg(test)]
mod invariants;

pub use errors::{AuthError, PledgeError, StatusError, StoreError};
pub use status::build_status;
pub use store::{Admission, PledgeSnapshot, PledgeStore};
pub use types::{ClaimInfo, Pledge, Project, ProjectStatus};
