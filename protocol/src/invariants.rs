//! Reusable invariant assertions for tests.

#![allow(dead_code)]

use crate::store::PledgeSnapshot;
use crate::types::Pledge;

/// INV-1: the open and claimed sets are never both non-empty, and no
/// identity hash appears twice across them.
pub fn assert_open_claimed_exclusive(snapshot: &PledgeSnapshot) {
    assert!(
        snapshot.open.is_empty() || snapshot.claimed.is_empty(),
        "INV-1 violated: {} open and {} claimed pledges coexist",
        snapshot.open.len(),
        snapshot.claimed.len()
    );

    let mut seen = std::collections::HashSet::new();
    for p in snapshot.open.iter().chain(snapshot.claimed.iter()) {
        let h = p.orig_hash.as_deref().expect("stored pledge without identity hash");
        assert!(seen.insert(h.to_string()), "INV-1 violated: duplicate identity {h}");
    }
}

/// INV-2: a scrubbed pledge exposes no transaction data but keeps its
/// identity hash and value.
pub fn assert_scrubbed(pledge: &Pledge) {
    assert!(
        pledge.transactions.is_empty(),
        "INV-2 violated: scrubbed pledge still carries {} fragments",
        pledge.transactions.len()
    );
    assert!(
        pledge.orig_hash.as_deref().is_some_and(|h| !h.is_empty()),
        "INV-2 violated: scrubbed pledge lost its identity hash"
    );
    assert!(
        pledge.total_input_value > 0,
        "INV-2 violated: scrubbed pledge lost its value"
    );
}

/// INV-3: a fully disclosed pledge carries its transaction fragments.
pub fn assert_full(pledge: &Pledge) {
    assert!(
        !pledge.transactions.is_empty(),
        "INV-3 violated: disclosed pledge has no transaction fragments"
    );
}
