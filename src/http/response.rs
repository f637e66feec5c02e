//! Responses for match outcomes.
//!
//! # Responsibilities
//! - Render the selected endpoint and its route values as JSON
//! - Map unmatched outcomes to status codes
//!
//! # Design Decisions
//! - 404 when nothing matched, 405 with `Allow` when only the method was
//!   wrong, 500 when the table is ambiguous for this request
//! - Bodies are JSON so clients and tests can inspect them

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::routing::selector::{EndpointMatch, MatchOutcome};
use crate::routing::values::RouteValues;

/// Body returned for a matched endpoint.
#[derive(Debug, Serialize)]
pub struct MatchedEndpoint<'a> {
    pub endpoint: &'a str,
    pub pattern: &'a str,
    pub order: i32,
    pub values: &'a RouteValues,
}

impl<'a> From<&'a EndpointMatch> for MatchedEndpoint<'a> {
    fn from(found: &'a EndpointMatch) -> Self {
        Self {
            endpoint: found.endpoint().display_name(),
            pattern: found.endpoint().pattern().raw(),
            order: found.endpoint().order(),
            values: found.values(),
        }
    }
}

pub fn matched(found: &EndpointMatch) -> Response {
    (StatusCode::OK, Json(MatchedEndpoint::from(found))).into_response()
}

/// Response for any outcome.
pub fn outcome_response(outcome: &MatchOutcome) -> Response {
    match outcome {
        MatchOutcome::Matched(found) => matched(found),
        MatchOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no endpoint matches the request" })),
        )
            .into_response(),
        MatchOutcome::MethodNotAllowed { allow } => {
            let allow = allow
                .iter()
                .map(|method| method.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut response = (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": "method not allowed", "allow": allow })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            response
        }
        MatchOutcome::Ambiguous { endpoints } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "request matched multiple endpoints", "endpoints": endpoints })),
        )
            .into_response(),
    }
}
