use axum::{
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use onlystars_core::types::{
    AccessReason, AuthOutcome, CheckQuery, CheckResponse, GateErrorBody, GateErrorCode, GateMode,
    GateRequest, GateResponse, HealthResponse, NonceRequest, NonceResponse, ProofFailure,
};
use onlystars_services_common::{timeout_layer, trace_layer};
use utoipa::OpenApi;

use crate::{api_error::ErrorResponse, types::AppState};

mod gate;
mod health;
mod middleware;
mod nonce;

pub(crate) fn build_router(state: AppState, request_timeout_secs: u64) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/gate/nonce",
            get(nonce::issue_nonce_query).post(nonce::issue_nonce),
        )
        .route("/gate", get(gate::cheap_check).post(gate::submit_proof))
        .route("/openapi.json", get(openapi))
        .fallback(|| async { ErrorResponse::not_found() })
        .with_state(state)
        .layer(trace_layer())
        .layer(timeout_layer(request_timeout_secs))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        nonce::issue_nonce,
        nonce::issue_nonce_query,
        gate::submit_proof,
        gate::cheap_check
    ),
    components(schemas(
        GateErrorBody,
        GateErrorCode,
        HealthResponse,
        GateMode,
        NonceRequest,
        NonceResponse,
        GateRequest,
        GateResponse,
        AuthOutcome,
        ProofFailure,
        AccessReason,
        CheckQuery,
        CheckResponse
    )),
    tags((name = "Gate", description = "Nonce issuance, proof submission and ledger checks"))
)]
struct ApiDoc;

async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
