//! Pledge intake — validates and atomically admits a submitted pledge.
//!
//! Order of operations, and why:
//!
//! 1. size bound, before any deserialization (hostile input must not cost
//!    more than a length check);
//! 2. structural checks and identity hashing, still purely local;
//! 3. ledger validation through the chain backend — slow, awaited with no
//!    store lock held;
//! 4. store admission, then the journal write.
//!
//! Admission is authoritative: a refusal (say, a pledge aimed at an
//! already-claimed project) journals nothing, so replay can never
//! resurrect a pledge the store rejected. A crash between admission and
//! the journal write costs only that pledge's durability; resubmitting it
//! heals the gap, both sides being idempotent on the identity hash.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use beacon_protocol::{Admission, Pledge, PledgeStore, Project};

use crate::chain::ChainBackend;
use crate::db;
use crate::errors::{Result, ServerError};

/// Refuse to process request bodies larger than this.
pub const MAX_PLEDGE_BYTES: usize = 1024 * 1024;

/// Accepted-pledge summary handed back to the router for logging.
#[derive(Debug, Clone)]
pub struct AcceptedPledge {
    pub hash: String,
    pub value: u64,
}

pub struct PledgeIntake {
    store: Arc<PledgeStore>,
    chain: Arc<dyn ChainBackend>,
    pool: SqlitePool,
}

impl PledgeIntake {
    pub fn new(store: Arc<PledgeStore>, chain: Arc<dyn ChainBackend>, pool: SqlitePool) -> Self {
        Self { store, chain, pool }
    }

    /// Run a raw submission through the full admission pipeline. On success
    /// the pledge is immediately visible to status queries.
    pub async fn submit(&self, project: &Project, body: &[u8]) -> Result<AcceptedPledge> {
        if body.len() > MAX_PLEDGE_BYTES {
            return Err(ServerError::PayloadTooLarge(body.len()));
        }

        let mut pledge: Pledge = serde_json::from_slice(body)
            .map_err(|e| ServerError::MalformedPledge(e.to_string()))?;
        pledge.check_shape()?;

        let hash = pledge.content_hash()?;
        // Identity is assigned here; whatever the client put in the field is
        // not trusted.
        pledge.orig_hash = Some(hash.clone());

        self.chain.validate_pledge(project, &pledge).await?;

        let admission = self.store.record(&project.id, &hash, pledge.clone())?;
        if db::insert_pledge(&self.pool, &project.id, &hash, &pledge).await? {
            info!(project = %project.id, pledge = %hash, "pledge journaled");
        }
        match admission {
            Admission::Recorded => info!(
                project = %project.id,
                pledge = %hash,
                value = pledge.total_input_value,
                "pledge accepted"
            ),
            Admission::Duplicate => warn!(
                project = %project.id,
                pledge = %hash,
                "duplicate pledge resubmitted; no-op"
            ),
        }

        Ok(AcceptedPledge {
            hash,
            value: pledge.total_input_value,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
