//! HTTP surface — routes, handlers, and the method/path → outcome mapping.
//!
//! Two resources: `GET /health`, and the project-scoped
//! `/crowdfund/project/:id` where `GET` serves status and `POST` accepts a
//! pledge. An unknown project ID and an unmatched path both produce the
//! same empty 404, so probing cannot distinguish "private" from
//! "nonexistent". Unsupported methods on a recognized path are a 405.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use beacon_protocol::{auth, build_status, AuthError, PledgeStore};

use crate::errors::ServerError;
use crate::intake::{PledgeIntake, MAX_PLEDGE_BYTES};
use crate::registry::{ClaimStates, ProjectRegistry};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<ProjectRegistry>,
    pub store: Arc<PledgeStore>,
    pub claims: Arc<ClaimStates>,
    pub intake: Arc<PledgeIntake>,
}

/// Build the full application router. Factored out of `main` so tests can
/// drive the real routing table.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/crowdfund/project/:id",
            get(project_status).post(submit_pledge),
        )
        .layer(DefaultBodyLimit::max(MAX_PLEDGE_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// `GET /health`
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Optional owner-authentication parameters. Both must be present to
/// attempt authentication; anything less means an unauthenticated request,
/// not an error.
#[derive(Debug, Default, Deserialize)]
struct StatusQuery {
    sig: Option<String>,
    msg: Option<String>,
}

/// `GET /crowdfund/project/:id`
///
/// Serves the project status snapshot: scrubbed open pledges for anonymous
/// callers, full transaction data for the verified owner, claimed pledges
/// in full for everyone.
async fn project_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let project = state.registry.resolve(&id).ok_or(ServerError::NotFound)?;

    let authenticated = match (&query.msg, &query.sig) {
        (Some(msg), Some(sig)) => match auth::verify_owner(project, msg, sig) {
            Ok(true) => {
                info!(project = %project.id, "project owner authenticated");
                true
            }
            Ok(false) => {
                // A wrong signature degrades to the anonymous view.
                warn!(project = %project.id, "owner signature did not verify");
                false
            }
            Err(e @ AuthError::BadEncoding(_)) => return Err(e.into()),
            Err(AuthError::BadAddress) => {
                return Err(ServerError::Inconsistent(format!(
                    "project {} has an unparseable address",
                    project.id
                )))
            }
        },
        _ => false,
    };

    // Snapshot first, then format outside any lock.
    let snapshot = state.store.snapshot(&project.id)?;
    let claim = state.claims.get(&project.id);
    let status = build_status(
        project,
        &snapshot,
        claim.as_ref(),
        authenticated,
        Utc::now().timestamp(),
    )?;

    Ok(Json(status))
}

/// `POST /crowdfund/project/:id`
///
/// Accepts a serialized pledge. Success is an empty 200; every rejection is
/// mapped by [`ServerError`].
async fn submit_pledge(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    let project = state.registry.resolve(&id).ok_or(ServerError::NotFound)?;
    let accepted = state.intake.submit(project, &body).await?;
    info!(
        project = %project.id,
        pledge = %accepted.hash,
        value = accepted.value,
        "pledge upload complete"
    );
    Ok(StatusCode::OK)
}

// ─────────────────────────────────────────────────────────
// Router-level tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine as _;
    use ed25519_dalek::{Signer, SigningKey};
    use tower::ServiceExt;

    use beacon_protocol::{ClaimInfo, Pledge, Project, ProjectStatus};

    use crate::chain::{ChainBackend, ChainError};
    use crate::db;

    struct FakeChain {
        reject: bool,
    }

    #[async_trait]
    impl ChainBackend for FakeChain {
        async fn validate_pledge(
            &self,
            _project: &Project,
            _pledge: &Pledge,
        ) -> std::result::Result<(), ChainError> {
            if self.reject {
                Err(ChainError::Rejected)
            } else {
                Ok(())
            }
        }

        async fn check_claim(
            &self,
            _project: &Project,
        ) -> std::result::Result<Option<ClaimInfo>, ChainError> {
            Ok(None)
        }
    }

    struct TestApp {
        router: Router,
        store: Arc<PledgeStore>,
        claims: Arc<ClaimStates>,
        project_id: String,
        owner: SigningKey,
    }

    async fn test_app(reject: bool) -> TestApp {
        let owner = SigningKey::generate(&mut rand::thread_rng());
        let address = hex::encode(owner.verifying_key().to_bytes());
        let project = Project {
            id: String::new(),
            title: "Window restoration".to_string(),
            address,
            goal: 100_000,
            min_pledge: 10,
            memo: "Fix the church windows".to_string(),
            cover_image: None,
        };

        let registry = Arc::new(ProjectRegistry::from_projects(vec![project]));
        let project_id = registry.iter().next().unwrap().id.clone();

        let store = Arc::new(PledgeStore::new());
        store.register_project(&project_id);
        let claims = Arc::new(ClaimStates::default());
        let pool = db::init_pool("sqlite::memory:").await.unwrap();
        let intake = Arc::new(PledgeIntake::new(
            Arc::clone(&store),
            Arc::new(FakeChain { reject }),
            pool,
        ));

        let router = router(ApiState {
            registry,
            store: Arc::clone(&store),
            claims: Arc::clone(&claims),
            intake,
        });

        TestApp {
            router,
            store,
            claims,
            project_id,
            owner,
        }
    }

    fn pledge_body(tag: &str, value: u64) -> Vec<u8> {
        serde_json::to_vec(&Pledge {
            transactions: vec![STANDARD.encode(tag)],
            total_input_value: value,
            timestamp: 1_700_000_000,
            orig_hash: None,
        })
        .unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_req(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    fn status_of(body: &[u8]) -> ProjectStatus {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_app(false).await;
        let (status, body) = send(&app.router, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_project_and_unknown_path_are_indistinguishable() {
        let app = test_app(false).await;
        let missing_project =
            send(&app.router, get_req("/crowdfund/project/0000000000")).await;
        let missing_path = send(&app.router, get_req("/somewhere/else")).await;

        assert_eq!(missing_project.0, StatusCode::NOT_FOUND);
        assert_eq!(missing_path.0, StatusCode::NOT_FOUND);
        assert_eq!(missing_project.1, missing_path.1);
    }

    #[tokio::test]
    async fn unsupported_method_is_405() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        let req = Request::builder()
            .method("PUT")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app.router, req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn submit_then_anonymous_status_is_scrubbed() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);

        let (status, body) = send(&app.router, post_req(&uri, pledge_body("tx-a", 500))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let (status, body) = send(&app.router, get_req(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let status_body = status_of(&body);
        assert_eq!(status_body.id, app.project_id);
        assert_eq!(status_body.value_pledged, 500);
        assert_eq!(status_body.pledges.len(), 1);
        assert!(status_body.pledges[0].transactions.is_empty());
        assert!(status_body.pledges[0]
            .orig_hash
            .as_deref()
            .is_some_and(|h| !h.is_empty()));
        assert!(status_body.claimed_by.is_none());
    }

    #[tokio::test]
    async fn owner_signature_discloses_full_pledges() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);

        let submitted = pledge_body("tx-a", 500);
        send(&app.router, post_req(&uri, submitted.clone())).await;

        let msg = "status-probe";
        let sig = URL_SAFE_NO_PAD.encode(app.owner.sign(msg.as_bytes()).to_bytes());
        let (status, body) =
            send(&app.router, get_req(&format!("{uri}?msg={msg}&sig={sig}"))).await;
        assert_eq!(status, StatusCode::OK);

        let status_body = status_of(&body);
        assert_eq!(status_body.pledges.len(), 1);
        let original: Pledge = serde_json::from_slice(&submitted).unwrap();
        assert_eq!(status_body.pledges[0].transactions, original.transactions);
    }

    #[tokio::test]
    async fn wrong_signature_degrades_to_anonymous_view() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        send(&app.router, post_req(&uri, pledge_body("tx-a", 500))).await;

        let sig = URL_SAFE_NO_PAD.encode(app.owner.sign(b"something else").to_bytes());
        let (status, body) =
            send(&app.router, get_req(&format!("{uri}?msg=probe&sig={sig}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(status_of(&body).pledges[0].transactions.is_empty());
    }

    #[tokio::test]
    async fn undecodable_signature_is_a_bad_request() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        let (status, _) =
            send(&app.router, get_req(&format!("{uri}?msg=probe&sig=*bad*"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signature_without_message_is_ignored() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        send(&app.router, post_req(&uri, pledge_body("tx-a", 500))).await;

        let sig = URL_SAFE_NO_PAD.encode(app.owner.sign(b"probe").to_bytes());
        let (status, body) = send(&app.router, get_req(&format!("{uri}?sig={sig}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(status_of(&body).pledges[0].transactions.is_empty());
    }

    #[tokio::test]
    async fn oversized_pledge_is_rejected_and_not_stored() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);

        let body = vec![b'x'; MAX_PLEDGE_BYTES + 1];
        let (status, _) = send(&app.router, post_req(&uri, body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.store.snapshot(&app.project_id).unwrap().open.is_empty());
    }

    #[tokio::test]
    async fn malformed_pledge_is_a_bad_request() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        let (status, _) = send(&app.router, post_req(&uri, b"not json".to_vec())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chain_rejection_is_a_bad_request_without_detail() {
        let app = test_app(true).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        let (status, body) = send(&app.router, post_req(&uri, pledge_body("tx-a", 500))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"], "pledge rejected");
        assert!(app.store.snapshot(&app.project_id).unwrap().open.is_empty());
    }

    #[tokio::test]
    async fn duplicate_submission_is_a_noop_success() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        let body = pledge_body("tx-a", 500);

        let (first, _) = send(&app.router, post_req(&uri, body.clone())).await;
        let (second, _) = send(&app.router, post_req(&uri, body)).await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);

        let snap = app.store.snapshot(&app.project_id).unwrap();
        assert_eq!(snap.open.len(), 1);
        assert_eq!(snap.total_value(), 500);
    }

    #[tokio::test]
    async fn pledge_after_claim_is_rejected_and_status_survives() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        send(&app.router, post_req(&uri, pledge_body("tx-a", 500))).await;

        let open = app.store.open_hashes(&app.project_id).unwrap();
        app.store.mark_claimed(&app.project_id, &open).unwrap();
        app.claims.set(
            &app.project_id,
            ClaimInfo {
                claimed_by: "bb".repeat(32),
                height: 10,
            },
        );

        let (status, body) = send(&app.router, post_req(&uri, pledge_body("tx-b", 700))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"], "pledge rejected");

        // The refused pledge must not poison later status requests.
        let (status, body) = send(&app.router, get_req(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let status_body = status_of(&body);
        assert_eq!(status_body.pledges.len(), 1);
        assert_eq!(status_body.value_pledged, 500);
        assert!(status_body.claimed_by.is_some());
    }

    #[tokio::test]
    async fn claimed_project_serves_full_pledges_to_everyone() {
        let app = test_app(false).await;
        let uri = format!("/crowdfund/project/{}", app.project_id);
        send(&app.router, post_req(&uri, pledge_body("tx-a", 500))).await;
        send(&app.router, post_req(&uri, pledge_body("tx-b", 700))).await;

        let open = app.store.open_hashes(&app.project_id).unwrap();
        app.store.mark_claimed(&app.project_id, &open).unwrap();
        let info = ClaimInfo {
            claimed_by: "aa".repeat(32),
            height: 88,
        };
        app.claims.set(&app.project_id, info.clone());

        let (status, body) = send(&app.router, get_req(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let status_body = status_of(&body);
        assert_eq!(status_body.pledges.len(), 2);
        for p in &status_body.pledges {
            assert!(!p.transactions.is_empty());
        }
        assert_eq!(status_body.value_pledged, 1_200);
        assert_eq!(status_body.claimed_by.as_deref(), Some(info.claimed_by.as_str()));
    }
}
