//! Claim watcher — long-running task that polls the chain backend for claim
//! transactions and finalizes the corresponding pledge sets.
//!
//! When a claim appears every open pledge of the project moves to the
//! claimed set in one store transition, the journal records the claim, and
//! the mirrored claim state gains the claiming transaction's hash. From
//! that point status responses disclose all pledges in full.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use beacon_protocol::{ClaimInfo, PledgeStore, Project};

use crate::chain::ChainBackend;
use crate::db;
use crate::errors::Result;
use crate::registry::{ClaimStates, ProjectRegistry};

const MAX_BACKOFF_SECS: u64 = 60;

pub struct WatcherState {
    pub registry: Arc<ProjectRegistry>,
    pub store: Arc<PledgeStore>,
    pub claims: Arc<ClaimStates>,
    pub chain: Arc<dyn ChainBackend>,
    pub pool: SqlitePool,
    pub poll_interval: Duration,
}

/// Run the watcher loop until `shutdown` fires. Poll failures back off
/// exponentially (capped) and never kill the task.
pub async fn run(state: Arc<WatcherState>, shutdown: CancellationToken) {
    info!(projects = state.registry.count(), "claim watcher starting");

    let mut delay = state.poll_interval;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("claim watcher stopping");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        match poll_once(&state).await {
            Ok(()) => delay = state.poll_interval,
            Err(e) => {
                delay = (delay * 2).min(Duration::from_secs(MAX_BACKOFF_SECS));
                warn!("claim poll failed (next attempt in {delay:?}): {e}");
            }
        }
    }
}

/// One pass over every not-yet-claimed project.
async fn poll_once(state: &WatcherState) -> Result<()> {
    let mut failed = 0usize;
    for project in state.registry.iter() {
        if state.claims.get(&project.id).is_some() {
            continue;
        }
        match state.chain.check_claim(project).await {
            Ok(None) => {}
            Ok(Some(claim)) => apply_claim(state, project, claim).await?,
            Err(e) => {
                // One unreachable project should not starve the rest.
                warn!(project = %project.id, "claim check failed: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(crate::errors::ServerError::ChainUnavailable(format!(
            "{failed} claim checks failed"
        )));
    }
    Ok(())
}

/// Finalize a project whose claim transaction was just observed.
async fn apply_claim(state: &WatcherState, project: &Project, claim: ClaimInfo) -> Result<()> {
    let open = state.store.open_hashes(&project.id)?;
    if let Err(e) = state.store.mark_claimed(&project.id, &open) {
        // Store refused the transition; this is a bug, not chain noise.
        error!(project = %project.id, "claim finalization refused: {e}");
        return Err(e.into());
    }

    // Mirror the claim before the awaited journal writes: a status request
    // in between must not see claimed pledges without their claiming
    // transaction.
    state.claims.set(&project.id, claim.clone());

    db::record_claim(&state.pool, &project.id, &claim).await?;
    db::mark_pledges_claimed(&state.pool, &project.id).await?;

    info!(
        project = %project.id,
        claimed_by = %claim.claimed_by,
        height = claim.height,
        pledges = open.len(),
        "project claimed"
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
