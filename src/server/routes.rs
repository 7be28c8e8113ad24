//! HTTP routes for batches, the ledger and wallet sign-in

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::auth::{ChallengeGrant, Session, SessionGrant};
use crate::core::paths::routes;
use crate::disburse::BatchResult;
use crate::error::AuthError;
use crate::ledger::{self, TransactionRecord};
use crate::Node;

/// Largest accepted payroll upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState { pub node: Arc<Node>, pub app_name: String }

impl AppState {
    pub fn new(node: Arc<Node>) -> Self {
        let app_name = node.app_name().to_string();
        Self { node, app_name }
    }
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    prefix: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ListResponse { records: Vec<TransactionRecord>, count: usize }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest { wallet_address: String }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    wallet_address: String,
    signature: String,
    #[serde(default)]
    challenge: Option<String>,
}

pub fn create_router(node: Arc<Node>) -> Router {
    Router::new()
        .route(routes::HEALTH, get(health))
        .route(routes::BATCHES, post(upload_batch))
        .route(routes::TRANSACTIONS, get(list_transactions))
        .route(routes::TRANSACTION, get(get_transaction))
        .route(routes::AUTH_CHALLENGE, post(request_challenge))
        .route(routes::AUTH_VERIFY, post(verify_signature))
        .route(routes::AUTH_SESSION, get(current_session))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(node))
}

async fn health(State(s): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": s.app_name}))
}

async fn upload_batch(State(s): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<BatchResult>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart: {e}")))?
    {
        if field.name() != Some(routes::UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("multipart: {e}")))?;
        let result = s.node.engine().process_batch(&bytes, &file_name).await?;
        info!(
            batch_id = %result.batch_id,
            success = result.success_count,
            failed = result.failed_count,
            "batch processed"
        );
        return Ok(Json(result));
    }
    Err(ApiError::BadRequest(format!("missing multipart field '{}'", routes::UPLOAD_FIELD)))
}

async fn list_transactions(
    State(s): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListResponse>> {
    let Query(q) = query?;
    let mut records = s
        .node
        .ledger()
        .list(&q.prefix, ledger::clamp_limit(q.limit))
        .await
        .map_err(crate::Error::from)?;
    ledger::sort_chronologically(&mut records);
    Ok(Json(ListResponse { count: records.len(), records }))
}

async fn get_transaction(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<TransactionRecord>> {
    let record_id = Uuid::parse_str(&id).map_err(|_| ApiError::BadRequest(format!("invalid record id: {id}")))?;
    match s.node.ledger().get(record_id).await.map_err(crate::Error::from)? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::NotFound(format!("record {record_id}"))),
    }
}

async fn request_challenge(
    State(s): State<AppState>,
    payload: Result<Json<ChallengeRequest>, JsonRejection>,
) -> ApiResult<Json<ChallengeGrant>> {
    let Json(payload) = payload?;
    Ok(Json(s.node.auth().request_challenge(&payload.wallet_address)?))
}

async fn verify_signature(
    State(s): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<SessionGrant>> {
    let Json(payload) = payload?;
    let grant = s
        .node
        .auth()
        .verify(&payload.wallet_address, &payload.signature, payload.challenge.as_deref())
        .await?;
    Ok(Json(grant))
}

async fn current_session(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Session>> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken)?;
    Ok(Json(s.node.auth().validate_session(token).await?))
}
