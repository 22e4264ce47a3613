//! Status assembly.
//!
//! Projects a [`PledgeSnapshot`] into the [`ProjectStatus`] served to
//! clients, applying the privacy policy:
//!
//! * open pledges go out verbatim to the verified owner, scrubbed to
//!   everyone else;
//! * claimed pledges always go out in full — the claim transaction is on
//!   the ledger, so withholding their contents protects nothing.
//!
//! The open/claimed exclusivity invariant is re-checked here as defense in
//! depth; a violation is an internal-consistency failure, never blamed on
//! the client.

use tracing::error;

use crate::errors::StatusError;
use crate::store::PledgeSnapshot;
use crate::types::{ClaimInfo, Project, ProjectStatus};

/// Build the status response for one project from an atomic snapshot.
///
/// `authenticated` is the result of the per-request owner check; `now` is
/// the snapshot timestamp stamped onto the response.
pub fn build_status(
    project: &Project,
    snapshot: &PledgeSnapshot,
    claim: Option<&ClaimInfo>,
    authenticated: bool,
    now: i64,
) -> Result<ProjectStatus, StatusError> {
    if !snapshot.claimed.is_empty() && !snapshot.open.is_empty() {
        error!(
            project = %project.id,
            open = snapshot.open.len(),
            claimed = snapshot.claimed.len(),
            "open and claimed pledge sets are both non-empty"
        );
        return Err(StatusError::OpenClaimedOverlap {
            project: project.id.clone(),
            open: snapshot.open.len(),
            claimed: snapshot.claimed.len(),
        });
    }

    let mut pledges = Vec::with_capacity(snapshot.open.len() + snapshot.claimed.len());
    let mut total: u64 = 0;

    // Values are client-declared; saturate rather than trust them not to
    // overflow the sum.
    for pledge in &snapshot.open {
        if authenticated {
            pledges.push(pledge.clone());
        } else {
            pledges.push(pledge.scrubbed());
        }
        total = total.saturating_add(pledge.total_input_value);
    }

    for pledge in &snapshot.claimed {
        pledges.push(pledge.clone());
        total = total.saturating_add(pledge.total_input_value);
    }

    Ok(ProjectStatus {
        id: project.id.clone(),
        timestamp: now,
        value_pledged: total,
        pledges,
        claimed_by: claim.map(|c| c.claimed_by.clone()),
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants;
    use crate::store::PledgeStore;
    use crate::types::Pledge;

    const NOW: i64 = 1_700_000_123;

    fn project() -> Project {
        Project {
            id: "p1".to_string(),
            title: "Test".to_string(),
            address: "00".repeat(32),
            goal: 10_000,
            min_pledge: 10,
            memo: String::new(),
            cover_image: None,
        }
    }

    fn loaded_store(values: &[u64]) -> PledgeStore {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        let s = PledgeStore::new();
        s.register_project("p1");
        for (i, v) in values.iter().enumerate() {
            let p = Pledge {
                transactions: vec![STANDARD.encode(format!("tx-{i}"))],
                total_input_value: *v,
                timestamp: 1_700_000_000 + i as i64,
                orig_hash: None,
            };
            let h = p.content_hash().unwrap();
            s.record("p1", &h, p).unwrap();
        }
        s
    }

    #[test]
    fn unauthenticated_view_is_scrubbed_but_counted() {
        let store = loaded_store(&[100, 250, 400]);
        let snap = store.snapshot("p1").unwrap();
        let status = build_status(&project(), &snap, None, false, NOW).unwrap();

        assert_eq!(status.pledges.len(), 3);
        for p in &status.pledges {
            invariants::assert_scrubbed(p);
        }
        assert_eq!(status.value_pledged, 750);
        assert_eq!(status.timestamp, NOW);
        assert!(status.claimed_by.is_none());
    }

    #[test]
    fn authenticated_view_discloses_fragments() {
        let store = loaded_store(&[100, 250]);
        let snap = store.snapshot("p1").unwrap();
        let status = build_status(&project(), &snap, None, true, NOW).unwrap();

        assert_eq!(status.pledges.len(), 2);
        for p in &status.pledges {
            invariants::assert_full(p);
        }
        assert_eq!(status.value_pledged, 350);
    }

    #[test]
    fn claimed_pledges_are_always_full() {
        let store = loaded_store(&[100, 250]);
        let hashes = store.open_hashes("p1").unwrap();
        store.mark_claimed("p1", &hashes).unwrap();
        let claim = ClaimInfo {
            claimed_by: "ab".repeat(32),
            height: 42,
        };

        let snap = store.snapshot("p1").unwrap();
        let status = build_status(&project(), &snap, Some(&claim), false, NOW).unwrap();

        assert_eq!(status.pledges.len(), 2);
        for p in &status.pledges {
            invariants::assert_full(p);
        }
        assert_eq!(status.value_pledged, 350);
        assert_eq!(status.claimed_by.as_deref(), Some(claim.claimed_by.as_str()));
    }

    #[test]
    fn mixed_open_and_claimed_is_fatal() {
        use crate::store::PledgeSnapshot;

        let store = loaded_store(&[100, 250]);
        let full = store.snapshot("p1").unwrap();
        // Hand-build a corrupt snapshot; the store itself refuses to produce one.
        let corrupt = PledgeSnapshot {
            open: vec![full.open[0].clone()],
            claimed: vec![full.open[1].clone()],
        };

        let err = build_status(&project(), &corrupt, None, false, NOW).unwrap_err();
        assert!(matches!(err, StatusError::OpenClaimedOverlap { .. }));
    }

    #[test]
    fn value_saturates_instead_of_overflowing() {
        let store = loaded_store(&[u64::MAX, u64::MAX]);
        let snap = store.snapshot("p1").unwrap();
        let status = build_status(&project(), &snap, None, false, NOW).unwrap();
        assert_eq!(status.value_pledged, u64::MAX);
    }

    #[test]
    fn status_serializes_without_empty_fields() {
        let store = loaded_store(&[100]);
        let snap = store.snapshot("p1").unwrap();
        let status = build_status(&project(), &snap, None, false, NOW).unwrap();

        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("claimed_by").is_none());
        let pledge = &json["pledges"][0];
        assert!(pledge["orig_hash"].is_string());
        assert_eq!(pledge["transactions"].as_array().unwrap().len(), 0);
    }
}
