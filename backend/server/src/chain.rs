//! Chain backend — the ledger-facing collaborator.
//!
//! Pledge validation (do the fragments pay the project's address, are the
//! inputs unspent, is the embedded signature good) and claim detection both
//! need a chain node. They sit behind the [`ChainBackend`] trait so the
//! intake and watcher paths can be exercised against an in-process fake.
//!
//! The HTTP implementation speaks plain JSON-RPC. Validation is a single
//! shot — a submitter is waiting on the answer — while the claim watcher
//! supplies its own retry cadence.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use beacon_protocol::{ClaimInfo, Pledge, Project};

#[derive(Debug, Error)]
pub enum ChainError {
    /// The node refused the pledge. The reason stays server-side.
    #[error("pledge rejected by chain backend")]
    Rejected,

    #[error("chain rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("chain transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected chain response: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Validate a structurally sound pledge against the ledger. `Ok(())`
    /// means the pledge may be admitted.
    async fn validate_pledge(&self, project: &Project, pledge: &Pledge)
        -> Result<(), ChainError>;

    /// Check whether a claim transaction spending the project's pledges has
    /// appeared on the chain.
    async fn check_claim(&self, project: &Project) -> Result<Option<ClaimInfo>, ChainError>;
}

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResult {
    valid: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaimResult {
    #[serde(default)]
    claimed_by: Option<String>,
    #[serde(default)]
    height: u64,
}

// ─────────────────────────────────────────────────────────
// HTTP implementation
// ─────────────────────────────────────────────────────────

pub struct HttpChainClient {
    client: Client,
    rpc_url: String,
}

impl HttpChainClient {
    pub fn new(client: Client, rpc_url: String) -> Self {
        Self { client, rpc_url }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| ChainError::BadResponse(format!("empty result from {method}")))
    }
}

#[async_trait]
impl ChainBackend for HttpChainClient {
    async fn validate_pledge(
        &self,
        project: &Project,
        pledge: &Pledge,
    ) -> Result<(), ChainError> {
        // Policy checks the node cannot know about happen here.
        if pledge.total_input_value < project.min_pledge {
            debug!(
                project = %project.id,
                value = pledge.total_input_value,
                min = project.min_pledge,
                "pledge below project minimum"
            );
            return Err(ChainError::Rejected);
        }

        let result = self
            .call(
                "verifypledge",
                json!({
                    "address": project.address,
                    "transactions": pledge.transactions,
                    "total_input_value": pledge.total_input_value,
                }),
            )
            .await?;
        let verdict: VerifyResult = serde_json::from_value(result)
            .map_err(|e| ChainError::BadResponse(e.to_string()))?;

        if !verdict.valid {
            debug!(
                project = %project.id,
                reason = verdict.reason.as_deref().unwrap_or("unspecified"),
                "chain backend rejected pledge"
            );
            return Err(ChainError::Rejected);
        }
        Ok(())
    }

    async fn check_claim(&self, project: &Project) -> Result<Option<ClaimInfo>, ChainError> {
        let result = self
            .call("getclaim", json!({ "address": project.address }))
            .await?;
        let claim: ClaimResult = serde_json::from_value(result)
            .map_err(|e| ChainError::BadResponse(e.to_string()))?;

        Ok(claim.claimed_by.map(|claimed_by| ClaimInfo {
            claimed_by,
            height: claim.height,
        }))
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
