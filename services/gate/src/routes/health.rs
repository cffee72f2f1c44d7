use axum::Json;
use onlystars_core::types::HealthResponse;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "General status check for the server", body = HealthResponse)
    ),
    tag = "Gate"
)]
pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { success: true })
}
