use axum::{extract::State, Json};
use onlystars_core::types::{
    AccessReason, AuthOutcome, CheckQuery, CheckResponse, GateErrorBody, GateRequest, GateResponse,
};

use crate::{
    api_error::ErrorResponse,
    metrics::record_proof_outcome,
    routes::middleware::{ValidatedJson, ValidatedQuery},
    types::AppState,
};

/// Proof submission. The decision always comes from a fresh ledger read; the
/// proof outcome is reported alongside it.
#[utoipa::path(
    post,
    path = "/gate",
    request_body = GateRequest,
    responses(
        (status = 200, description = "Access decision with the signature outcome", body = GateResponse),
        (status = 400, description = "Malformed address, post id or missing target", body = GateErrorBody)
    ),
    tag = "Gate"
)]
pub(crate) async fn submit_proof(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<GateRequest>,
) -> Result<Json<GateResponse>, ErrorResponse> {
    let target = req
        .target()
        .map_err(|e| ErrorResponse::bad_request(e.to_string()))?;

    let outcome = state.verifier.verify(&req).await;
    record_proof_outcome(outcome);
    let auth = match outcome {
        Ok(()) => AuthOutcome {
            signature: true,
            signature_reason: None,
        },
        Err(reason) => {
            tracing::debug!(account = %req.account, %reason, "proof rejected");
            AuthOutcome {
                signature: false,
                signature_reason: Some(reason),
            }
        }
    };

    let (allowed, reason) = match state.ledger.check(req.account, &target).await {
        Ok(allowed) => (allowed, AccessReason::from_ledger(&target, allowed)),
        Err(e) => {
            tracing::error!(account = %req.account, mode = %req.mode, error = %e, "ledger read failed, denying");
            (false, AccessReason::LedgerUnavailable)
        }
    };

    Ok(Json(GateResponse {
        ok: true,
        allowed,
        reason,
        auth,
    }))
}

/// Unauthenticated ledger read; each answer is `null` unless its input was given.
#[utoipa::path(
    get,
    path = "/gate",
    params(
        ("account" = String, Query, description = "Account to check"),
        ("creatorAddress" = Option<String>, Query, description = "Creator for the subscription check"),
        ("postId" = Option<String>, Query, description = "Post for the access check")
    ),
    responses(
        (status = 200, description = "Ledger answers", body = CheckResponse),
        (status = 400, description = "Malformed address or post id", body = GateErrorBody),
        (status = 503, description = "Creator hub unavailable", body = GateErrorBody)
    ),
    tag = "Gate"
)]
pub(crate) async fn cheap_check(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<CheckQuery>,
) -> Result<Json<CheckResponse>, ErrorResponse> {
    let ledger = state.ledger.as_ref();

    let sub_active = async {
        match query.creator_address {
            Some(creator) => ledger
                .is_subscription_active(query.account, creator)
                .await
                .map(Some),
            None => Ok(None),
        }
    };
    let has_access = async {
        match query.post_id {
            Some(post_id) => ledger.has_post_access(query.account, post_id).await.map(Some),
            None => Ok(None),
        }
    };

    let (sub_active, has_access) = tokio::try_join!(sub_active, has_access).map_err(|e| {
        tracing::error!(account = %query.account, error = %e, "cheap check ledger read failed");
        ErrorResponse::ledger_unavailable()
    })?;

    Ok(Json(CheckResponse {
        ok: true,
        sub_active,
        has_access,
    }))
}
