//! Protocol error types, one enum per concern.

use thiserror::Error;

/// Structural problems with a submitted pledge, detectable without any
/// collaborator. Always a client error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PledgeError {
    #[error("pledge carries no transaction fragments")]
    EmptyTransactions,

    #[error("pledge has zero input value")]
    ZeroValue,

    #[error("transaction fragment {0} is not valid base64")]
    BadFragmentEncoding(usize),
}

/// Pledge store failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store was asked about a project it was never loaded with. The
    /// router resolves projects before touching the store, so this indicates
    /// a bug, not bad input.
    #[error("project {0} is not registered in the pledge store")]
    UnknownProject(String),

    #[error("pledge {0} is in neither the open nor the claimed set")]
    UnknownPledge(String),

    /// The project's pledges have already been claimed; admitting a new
    /// pledge would recreate a non-empty open set alongside the claimed one.
    #[error("project {0} is already claimed and accepts no new pledges")]
    ProjectClaimed(String),

    /// Claiming the named pledges would leave both the open and claimed sets
    /// non-empty. The store refuses and mutates nothing.
    #[error("claim of project {project} would leave {open_left} pledges open")]
    InvariantViolation { project: String, open_left: usize },
}

/// Owner authentication failures. A signature that simply does not verify is
/// not an error (the caller degrades to the unauthenticated view); these are
/// the cases that cannot even be checked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("signature is not decodable: {0}")]
    BadEncoding(String),

    /// The project's stored receiving address is not a valid verifying key.
    /// Project files are validated at load, so hitting this is a bug.
    #[error("project address is not a valid verifying key")]
    BadAddress,
}

/// Status assembly failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    /// Both the open and claimed sets were non-empty in one snapshot. The
    /// store enforces this; seeing it here means internal state is corrupt.
    #[error("project {project} snapshot has {open} open and {claimed} claimed pledges")]
    OpenClaimedOverlap {
        project: String,
        open: usize,
        claimed: usize,
    },
}
