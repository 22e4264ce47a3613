//! # Types
//!
//! Shared data structures used across the Beacon protocol core.
//!
//! ## Design decisions
//!
//! ### Pledge identity
//!
//! A pledge is identified by a SHA-256 digest over its decoded transaction
//! fragments (each fragment hashed with a length prefix so fragment
//! boundaries are unambiguous). The digest is computed once, at admission,
//! and stored on the pledge as [`Pledge::orig_hash`]; it is never recomputed.
//!
//! ### Scrubbing
//!
//! An unauthenticated observer may learn *that* a pledge exists and how much
//! it is worth, but must not obtain the transaction fragments needed to
//! finalize the project. [`Pledge::scrubbed`] produces the redacted copy:
//! fragments cleared, identity hash and value retained.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::PledgeError;

// ─────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────

/// A funding project as loaded from its project file.
///
/// Immutable after load; the core never mutates project metadata, only the
/// pledges associated with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Stable identifier derived from `(address, title)`. Filled in at load
    /// time; absent from the on-disk project file.
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// Hex-encoded Ed25519 verifying key that receives the funds and proves
    /// ownership.
    pub address: String,
    /// Funding target in the smallest currency unit.
    pub goal: u64,
    /// Minimum accepted pledge value.
    pub min_pledge: u64,
    #[serde(default)]
    pub memo: String,
    /// Optional base64 cover image. Carried for the owner tooling; not part
    /// of any status response.
    #[serde(default)]
    pub cover_image: Option<String>,
}

impl Project {
    /// Derive the stable project ID from the receiving address and title.
    pub fn derive_id(address: &str, title: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update([0u8]);
        hasher.update(title.as_bytes());
        hex::encode(hasher.finalize())
    }
}

// ─────────────────────────────────────────────────────────
// Pledge
// ─────────────────────────────────────────────────────────

/// A contributor's signed partial transaction committing value toward a
/// project's goal.
///
/// This is both the wire format accepted on submission (where `orig_hash` is
/// absent) and the stored/served form (where it is always set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pledge {
    /// Base64-encoded raw transaction fragments, in contribution order.
    /// Empty on a scrubbed copy.
    #[serde(default)]
    pub transactions: Vec<String>,
    /// Total input value across all fragments, smallest currency unit.
    pub total_input_value: u64,
    /// Submission timestamp, unix seconds.
    pub timestamp: i64,
    /// Hex SHA-256 identity of the original pledge. Set by the server at
    /// admission; the only pledge data a scrubbed copy retains besides value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_hash: Option<String>,
}

impl Pledge {
    /// Structural checks that need no collaborator: at least one fragment,
    /// a positive value, and decodable fragment encodings.
    pub fn check_shape(&self) -> Result<(), PledgeError> {
        if self.transactions.is_empty() {
            return Err(PledgeError::EmptyTransactions);
        }
        if self.total_input_value == 0 {
            return Err(PledgeError::ZeroValue);
        }
        for (i, tx) in self.transactions.iter().enumerate() {
            decode_fragment(tx, i)?;
        }
        Ok(())
    }

    /// Compute the pledge's content hash over its decoded fragments.
    ///
    /// Each fragment is folded in with a little-endian length prefix so that
    /// refragmented byte streams cannot collide.
    pub fn content_hash(&self) -> Result<String, PledgeError> {
        if self.transactions.is_empty() {
            return Err(PledgeError::EmptyTransactions);
        }
        let mut hasher = Sha256::new();
        for (i, tx) in self.transactions.iter().enumerate() {
            let bytes = decode_fragment(tx, i)?;
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Redacted copy for unauthenticated observers: transaction fragments
    /// stripped, identity hash and value retained.
    pub fn scrubbed(&self) -> Pledge {
        Pledge {
            transactions: Vec::new(),
            ..self.clone()
        }
    }
}

fn decode_fragment(tx: &str, index: usize) -> Result<Vec<u8>, PledgeError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD
        .decode(tx)
        .map_err(|_| PledgeError::BadFragmentEncoding(index))
}

// ─────────────────────────────────────────────────────────
// Derived views
// ─────────────────────────────────────────────────────────

/// Point-in-time projection of a project's pledge state. Recomputed on every
/// status request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub id: String,
    /// Snapshot timestamp, unix seconds.
    pub timestamp: i64,
    /// Sum of input values across exactly the pledges listed below.
    pub value_pledged: u64,
    pub pledges: Vec<Pledge>,
    /// Hex hash of the claiming transaction, once the project is claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
}

/// Claim state observed on the ledger. Owned by the claim watcher and
/// consulted read-only during status assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInfo {
    /// Hex hash of the claiming transaction.
    pub claimed_by: String,
    /// Chain height at which the claim was observed.
    pub height: u64,
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
