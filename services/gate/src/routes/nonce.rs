use axum::{extract::State, Json};
use onlystars_core::types::{GateErrorBody, NonceRequest, NonceResponse};

use crate::{
    api_error::ErrorResponse,
    metrics::{METRICS_NONCE_ISSUED, METRICS_NONCE_RATE_LIMITED},
    routes::middleware::{ClientIp, ValidatedJson, ValidatedQuery},
    types::{AppState, NONCE_OPERATION},
};

#[utoipa::path(
    post,
    path = "/gate/nonce",
    request_body = NonceRequest,
    responses(
        (status = 200, description = "Nonce issued", body = NonceResponse),
        (status = 400, description = "Malformed account or scope", body = GateErrorBody),
        (status = 429, description = "Too many nonce requests for this IP and account", body = GateErrorBody),
        (status = 500, description = "Nonce storage unavailable", body = GateErrorBody)
    ),
    tag = "Gate"
)]
pub(crate) async fn issue_nonce(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<NonceRequest>,
) -> Result<Json<NonceResponse>, ErrorResponse> {
    issue(&state, ip, req).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/gate/nonce",
    params(
        ("account" = String, Query, description = "Account that will sign the challenge"),
        ("mode" = Option<String>, Query, description = "`post` or `subscription`; unscoped when absent"),
        ("postId" = Option<String>, Query, description = "Post to scope the nonce to"),
        ("creatorAddress" = Option<String>, Query, description = "Creator to scope the nonce to")
    ),
    responses(
        (status = 200, description = "Nonce issued", body = NonceResponse),
        (status = 400, description = "Malformed account or scope", body = GateErrorBody),
        (status = 429, description = "Too many nonce requests for this IP and account", body = GateErrorBody),
        (status = 500, description = "Nonce storage unavailable", body = GateErrorBody)
    ),
    tag = "Gate"
)]
pub(crate) async fn issue_nonce_query(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidatedQuery(req): ValidatedQuery<NonceRequest>,
) -> Result<Json<NonceResponse>, ErrorResponse> {
    issue(&state, ip, req).await.map(Json)
}

async fn issue(
    state: &AppState,
    ip: std::net::IpAddr,
    req: NonceRequest,
) -> Result<NonceResponse, ErrorResponse> {
    req.validate()
        .map_err(|e| ErrorResponse::bad_request(e.to_string()))?;

    if !state
        .rate_limiter
        .check(NONCE_OPERATION, ip, &req.account)
        .await
    {
        ::metrics::counter!(METRICS_NONCE_RATE_LIMITED).increment(1);
        return Err(ErrorResponse::rate_limited());
    }

    let scope = req.scope();
    let scoped = scope.is_some();
    let nonce = state
        .nonces
        .issue(req.account, scope)
        .await
        .map_err(|e| {
            tracing::error!(account = %req.account, error = %e, "failed to issue nonce");
            ErrorResponse::storage_unavailable()
        })?;
    ::metrics::counter!(METRICS_NONCE_ISSUED, "scoped" => if scoped { "true" } else { "false" })
        .increment(1);

    Ok(NonceResponse {
        ok: true,
        nonce,
        expires_in_seconds: state.nonces.ttl().as_secs(),
        scoped,
    })
}
