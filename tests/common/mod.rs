//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router as App;
use serde_json::Value;
use tower::ServiceExt;

use endpoint_router::routing::{DefaultEndpointDataSource, Endpoint, EndpointBuilder, RequestContext, Router};

pub fn endpoint(template: &str) -> EndpointBuilder {
    Endpoint::parse(template).unwrap_or_else(|e| panic!("{}: {}", template, e))
}

/// A source and router over `endpoints`, in registration order.
pub fn router(endpoints: Vec<Arc<Endpoint>>) -> (Arc<DefaultEndpointDataSource>, Arc<Router>) {
    let source = Arc::new(DefaultEndpointDataSource::new(endpoints));
    let router = Arc::new(Router::new(source.clone()).unwrap());
    (source, router)
}

/// A router with one endpoint per template, named after the template.
pub fn router_for(templates: &[&str]) -> Arc<Router> {
    router(templates.iter().map(|t| endpoint(t).build()).collect()).1
}

pub fn get(path: &str) -> RequestContext {
    RequestContext::new(Method::GET, path)
}

/// Display name of the selected endpoint, or the outcome label.
pub fn selected(router: &Router, request: &RequestContext) -> String {
    let outcome = router.match_request(request);
    match outcome.matched() {
        Some(found) => found.endpoint().display_name().to_string(),
        None => outcome.label().to_string(),
    }
}

/// Sends one request through `app` and returns status, headers and the
/// body (JSON when it parses, otherwise a JSON string).
pub async fn send(app: App, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, headers, body)
}

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}
