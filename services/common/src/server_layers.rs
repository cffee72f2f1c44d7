use std::time::Duration;

use http::{Request, Response, StatusCode};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer},
};
use tracing::Span;

/// Span maker that records method and path, and skips `/health` probes.
#[derive(Clone, Debug)]
pub struct MakeRequestSpan;

impl<B> MakeSpan<B> for MakeRequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        if request.uri().path() == "/health" {
            return Span::none();
        }

        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// Logs server errors at `error`, throttled clients at `warn` and
/// everything else at `debug`.
#[derive(Clone, Debug)]
pub struct StatusAwareOnResponse;

impl<B> OnResponse<B> for StatusAwareOnResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        let latency_ms = latency.as_millis() as u64;

        if status.is_server_error() {
            tracing::error!(%status, latency_ms, "request failed");
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(%status, latency_ms, "request rate limited");
        } else if !span.is_disabled() && status != StatusCode::NOT_FOUND {
            tracing::debug!(%status, latency_ms, "request completed");
        }
    }
}

/// Creates a [`TraceLayer`] with method and path on every request span.
pub fn trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    MakeRequestSpan,
    DefaultOnRequest,
    StatusAwareOnResponse,
> {
    TraceLayer::new_for_http()
        .make_span_with(MakeRequestSpan)
        .on_response(StatusAwareOnResponse)
}

/// Creates a [`TimeoutLayer`] that responds with `504 Gateway Timeout` when a
/// request exceeds `timeout_secs`.
pub fn timeout_layer(timeout_secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::GATEWAY_TIMEOUT, Duration::from_secs(timeout_secs))
}
