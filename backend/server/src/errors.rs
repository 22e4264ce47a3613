//! Application-wide error type and its HTTP mapping.
//!
//! The taxonomy follows one rule: client mistakes (bad pledge bytes,
//! oversized bodies, undecodable signatures) come back as 4xx and are logged
//! at warn at most; internal-consistency failures and infrastructure errors
//! come back as a detail-free 5xx and are logged loudly where they occur.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use beacon_protocol::{AuthError, PledgeError, StatusError, StoreError};

use crate::chain::ChainError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Body exceeded the intake bound; rejected before deserialization.
    #[error("pledge payload of {0} bytes exceeds the limit")]
    PayloadTooLarge(usize),

    #[error("malformed pledge: {0}")]
    MalformedPledge(String),

    /// The chain backend refused the pledge. Deliberately carries no detail:
    /// validation internals must not help an attacker craft a
    /// borderline-valid pledge.
    #[error("pledge rejected")]
    PledgeRejected,

    #[error("bad signature encoding: {0}")]
    BadSignature(String),

    /// Unknown project. Serialized identically to an unmatched route so the
    /// two cases cannot be told apart.
    #[error("not found")]
    NotFound,

    /// A protocol invariant broke. This is a bug, never bad input.
    #[error("internal consistency violation: {0}")]
    Inconsistent(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("chain backend unavailable: {0}")]
    ChainUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("project file error: {0}")]
    ProjectFile(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl From<PledgeError> for ServerError {
    fn from(e: PledgeError) -> Self {
        ServerError::MalformedPledge(e.to_string())
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            // A pledge aimed at an already-claimed project is a client
            // mistake, not an internal failure.
            StoreError::ProjectClaimed(_) => ServerError::PledgeRejected,
            other => ServerError::Inconsistent(other.to_string()),
        }
    }
}

impl From<StatusError> for ServerError {
    fn from(e: StatusError) -> Self {
        ServerError::Inconsistent(e.to_string())
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::BadEncoding(msg) => ServerError::BadSignature(msg),
            AuthError::BadAddress => ServerError::Inconsistent(e.to_string()),
        }
    }
}

impl From<ChainError> for ServerError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Rejected => ServerError::PledgeRejected,
            other => ServerError::ChainUnavailable(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            // 404 stays body-less to match axum's unmatched-route response.
            ServerError::NotFound => StatusCode::NOT_FOUND.into_response(),

            ServerError::PayloadTooLarge(_) => client_error(StatusCode::PAYLOAD_TOO_LARGE, &self),
            ServerError::MalformedPledge(_)
            | ServerError::PledgeRejected
            | ServerError::BadSignature(_) => client_error(StatusCode::BAD_REQUEST, &self),

            ServerError::ChainUnavailable(ref detail) => {
                tracing::error!("chain backend unavailable: {detail}");
                opaque_error(StatusCode::BAD_GATEWAY)
            }

            ServerError::Inconsistent(ref detail) => {
                tracing::error!("internal consistency violation: {detail}");
                opaque_error(StatusCode::INTERNAL_SERVER_ERROR)
            }

            other => {
                tracing::error!("request failed: {other}");
                opaque_error(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn client_error(code: StatusCode, err: &ServerError) -> Response {
    tracing::warn!("rejecting request: {err}");
    (
        code,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn opaque_error(code: StatusCode) -> Response {
    (
        code,
        Json(ErrorBody {
            error: "internal error".to_string(),
        }),
    )
        .into_response()
}
