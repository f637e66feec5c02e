//! Request spans.
//!
//! # Responsibilities
//! - Create one span per request carrying the correlation ID
//! - Record the match outcome on that span
//!
//! # Design Decisions
//! - The request ID is assigned before the span is created, so every log
//!   line of a request carries it
//! - Fields are declared empty up front and filled once known

use axum::http::Request;
use tracing::Span;

use crate::http::request::RequestIdExt;

/// `make_span_with` callback for `tower_http::trace::TraceLayer`.
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request.request_id().unwrap_or("unknown"),
        method = %request.method(),
        path = %request.uri().path(),
        outcome = tracing::field::Empty,
        endpoint = tracing::field::Empty,
    )
}

/// Fills the `outcome` and `endpoint` fields of the current request span.
pub fn record_outcome(outcome: &'static str, endpoint: Option<&str>) {
    let span = Span::current();
    span.record("outcome", outcome);
    if let Some(endpoint) = endpoint {
        span.record("endpoint", endpoint);
    }
}
