//! # Pledge store
//!
//! Per-project mapping of pledge identity to pledge record, split into the
//! `open` (counted toward the goal, unclaimed) and `claimed` (spent by the
//! finalized claim transaction) subsets.
//!
//! ## Invariants
//!
//! * A pledge identity appears in at most one subset, exactly once.
//! * A pledge moves `open → claimed` at most once, never back.
//! * After a claim, the open set is empty and stays empty: the claim spends
//!   every open pledge atomically, and a claimed project refuses new
//!   admissions, so the two subsets are never both non-empty.
//!
//! ## Locking
//!
//! All state sits behind a single [`parking_lot::RwLock`]. Writers take the
//! lock only for the map mutation itself; readers take it only to clone a
//! snapshot. Nothing async happens under the lock, so slow pledge
//! validation or response formatting never stalls concurrent access.
//! Projects are registered up front at load time; there is no lazy
//! read-check-then-write path.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::StoreError;
use crate::types::Pledge;

/// Outcome of a pledge admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The pledge was new and is now in the open set.
    Recorded,
    /// A pledge with the same identity already exists (in either subset).
    /// Nothing was changed; retransmissions are a safe no-op.
    Duplicate,
}

#[derive(Default)]
struct PledgeGroup {
    open: HashMap<String, Pledge>,
    claimed: HashMap<String, Pledge>,
}

/// Copy-on-read view of one project's pledges. Detached from the store:
/// self-consistent even if writes land after it is taken, and useless for
/// mutating store state.
#[derive(Debug, Clone)]
pub struct PledgeSnapshot {
    pub open: Vec<Pledge>,
    pub claimed: Vec<Pledge>,
}

impl PledgeSnapshot {
    /// Sum of input values across every pledge in this snapshot. Saturates:
    /// values are client-declared, so the sum must not be able to panic.
    pub fn total_value(&self) -> u64 {
        self.open
            .iter()
            .chain(self.claimed.iter())
            .fold(0u64, |acc, p| acc.saturating_add(p.total_input_value))
    }
}

/// Thread-safe owner of all per-project pledge state.
#[derive(Default)]
pub struct PledgeStore {
    groups: RwLock<HashMap<String, PledgeGroup>>,
}

impl PledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate state for a project. Called once per project at load
    /// time, before any request can reference it.
    pub fn register_project(&self, project_id: &str) {
        self.groups
            .write()
            .entry(project_id.to_string())
            .or_default();
    }

    /// Admit a pledge into the project's open set under the given identity
    /// hash. Duplicate identities (in either subset) leave the store
    /// untouched and report [`Admission::Duplicate`]; value is never
    /// double-counted. A claimed project refuses all new pledges: the open
    /// set must stay empty once pledges have been claimed.
    pub fn record(
        &self,
        project_id: &str,
        hash: &str,
        mut pledge: Pledge,
    ) -> Result<Admission, StoreError> {
        let mut groups = self.groups.write();
        let group = groups
            .get_mut(project_id)
            .ok_or_else(|| StoreError::UnknownProject(project_id.to_string()))?;

        if group.open.contains_key(hash) || group.claimed.contains_key(hash) {
            debug!(project = project_id, pledge = hash, "duplicate pledge ignored");
            return Ok(Admission::Duplicate);
        }
        if !group.claimed.is_empty() {
            debug!(project = project_id, pledge = hash, "pledge after claim refused");
            return Err(StoreError::ProjectClaimed(project_id.to_string()));
        }

        pledge.orig_hash = Some(hash.to_string());
        group.open.insert(hash.to_string(), pledge);
        Ok(Admission::Recorded)
    }

    /// Move the named pledges from open to claimed.
    ///
    /// Identities may repeat in the list; identities already claimed are
    /// skipped (re-observing a claim is idempotent); identities in neither
    /// subset are an error. If applying the move would leave both subsets
    /// non-empty the store refuses and mutates nothing.
    pub fn mark_claimed(&self, project_id: &str, hashes: &[String]) -> Result<(), StoreError> {
        let mut groups = self.groups.write();
        let group = groups
            .get_mut(project_id)
            .ok_or_else(|| StoreError::UnknownProject(project_id.to_string()))?;

        let mut moving: HashSet<&str> = HashSet::new();
        for h in hashes {
            if group.open.contains_key(h) {
                moving.insert(h.as_str());
            } else if !group.claimed.contains_key(h) {
                return Err(StoreError::UnknownPledge(h.clone()));
            }
        }

        let open_left = group.open.len() - moving.len();
        if open_left > 0 {
            return Err(StoreError::InvariantViolation {
                project: project_id.to_string(),
                open_left,
            });
        }

        for h in hashes {
            if let Some(p) = group.open.remove(h) {
                group.claimed.insert(h.clone(), p);
            }
        }
        Ok(())
    }

    /// The identity hashes currently in the open set.
    pub fn open_hashes(&self, project_id: &str) -> Result<Vec<String>, StoreError> {
        let groups = self.groups.read();
        let group = groups
            .get(project_id)
            .ok_or_else(|| StoreError::UnknownProject(project_id.to_string()))?;
        Ok(group.open.keys().cloned().collect())
    }

    /// Take an atomic copy-on-read snapshot of the project's pledges,
    /// ordered by submission time (identity hash as tie-breaker).
    pub fn snapshot(&self, project_id: &str) -> Result<PledgeSnapshot, StoreError> {
        let (mut open, mut claimed) = {
            let groups = self.groups.read();
            let group = groups
                .get(project_id)
                .ok_or_else(|| StoreError::UnknownProject(project_id.to_string()))?;
            (
                group.open.values().cloned().collect::<Vec<_>>(),
                group.claimed.values().cloned().collect::<Vec<_>>(),
            )
        };
        // Sort outside the lock.
        let key = |p: &Pledge| (p.timestamp, p.orig_hash.clone());
        open.sort_by_key(key);
        claimed.sort_by_key(key);
        Ok(PledgeSnapshot { open, claimed })
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
