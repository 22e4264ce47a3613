//! Pledge journal — SQLite persistence for accepted pledges and observed
//! claims, plus journal replay at startup.
//!
//! The journal is durability only: the in-memory [`PledgeStore`] stays the
//! source of truth for every request, and the journal rebuilds it after a
//! restart. Writes are idempotent (`INSERT OR IGNORE` on the pledge's
//! identity hash), so replaying an intake or a claim twice is harmless.

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{info, warn};

use beacon_protocol::{ClaimInfo, Pledge, PledgeStore};

use crate::errors::{Result, ServerError};
use crate::registry::{ClaimStates, ProjectRegistry};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    use std::str::FromStr;

    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = sqlx::sqlite::SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    // An in-memory database exists per connection; a pool of them would be
    // a pool of unrelated databases.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Pledge journal migrations applied");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Pledge writes
// ─────────────────────────────────────────────────────────

/// Journal an accepted pledge. Returns `false` when the identity hash was
/// already journaled (idempotent replay or duplicate submission).
pub async fn insert_pledge(
    pool: &SqlitePool,
    project_id: &str,
    hash: &str,
    pledge: &Pledge,
) -> Result<bool> {
    let body = serde_json::to_string(pledge)
        .map_err(|e| ServerError::Inconsistent(format!("pledge not serializable: {e}")))?;

    let rows = sqlx::query(
        r#"
        INSERT OR IGNORE INTO pledges
            (orig_hash, project_id, body, total_input_value, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(hash)
    .bind(project_id)
    .bind(&body)
    .bind(pledge.total_input_value as i64)
    .bind(pledge.timestamp)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows > 0)
}

/// Flag every pledge of a project as claimed.
pub async fn mark_pledges_claimed(pool: &SqlitePool, project_id: &str) -> Result<()> {
    sqlx::query("UPDATE pledges SET claimed = 1 WHERE project_id = ?1")
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Claim writes / reads
// ─────────────────────────────────────────────────────────

pub async fn record_claim(pool: &SqlitePool, project_id: &str, info: &ClaimInfo) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO claims (project_id, claimed_by, height) VALUES (?1, ?2, ?3)",
    )
    .bind(project_id)
    .bind(&info.claimed_by)
    .bind(info.height as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_claim(pool: &SqlitePool, project_id: &str) -> Result<Option<ClaimInfo>> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT claimed_by, height FROM claims WHERE project_id = ?1")
            .bind(project_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(claimed_by, height)| ClaimInfo {
        claimed_by,
        height: height as u64,
    }))
}

// ─────────────────────────────────────────────────────────
// Pledge reads
// ─────────────────────────────────────────────────────────

/// All journaled pledge bodies for a project, submission order.
pub async fn load_project_pledges(pool: &SqlitePool, project_id: &str) -> Result<Vec<Pledge>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT orig_hash, body
        FROM   pledges
        WHERE  project_id = ?1
        ORDER  BY timestamp ASC, orig_hash ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let mut pledges = Vec::with_capacity(rows.len());
    for (hash, body) in rows {
        match serde_json::from_str::<Pledge>(&body) {
            Ok(p) => pledges.push(p),
            Err(e) => warn!(pledge = %hash, "unreadable journal row skipped: {e}"),
        }
    }
    Ok(pledges)
}

/// Sum of unclaimed journaled value for a project.
pub async fn pledged_value(pool: &SqlitePool, project_id: &str) -> Result<u64> {
    let (value,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_input_value), 0) FROM pledges WHERE project_id = ?1 AND claimed = 0",
    )
    .bind(project_id)
    .fetch_one(pool)
    .await?;
    Ok(value as u64)
}

// ─────────────────────────────────────────────────────────
// Journal replay
// ─────────────────────────────────────────────────────────

/// Rebuild the pledge store and claim mirror from the journal. Called once
/// at startup, after the registry is loaded and before requests are served.
pub async fn restore_state(
    pool: &SqlitePool,
    registry: &ProjectRegistry,
    store: &PledgeStore,
    claims: &ClaimStates,
) -> Result<()> {
    for project in registry.iter() {
        store.register_project(&project.id);

        let pledges = load_project_pledges(pool, &project.id).await?;
        let restored = pledges.len();
        for pledge in pledges {
            let Some(hash) = pledge.orig_hash.clone() else {
                warn!(project = %project.id, "journal row without identity hash skipped");
                continue;
            };
            store.record(&project.id, &hash, pledge)?;
        }

        if let Some(claim) = load_claim(pool, &project.id).await? {
            let open = store.open_hashes(&project.id)?;
            store.mark_claimed(&project.id, &open)?;
            claims.set(&project.id, claim);
        }

        let unclaimed = pledged_value(pool, &project.id).await?;
        info!(
            project = %project.id,
            restored,
            value_pledged = unclaimed,
            "journal replayed"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
