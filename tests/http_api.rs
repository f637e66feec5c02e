//! The HTTP surface, driven in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};

use endpoint_router::admin::{setup_admin_router, AdminState};
use endpoint_router::config::loader::parse_config;
use endpoint_router::http::{HttpServer, X_REQUEST_ID};
use endpoint_router::routing::{DefaultEndpointDataSource, Router};

mod common;
use common::{request, send};

const CONFIG: &str = r#"
[tokens]
area = "api"

[[endpoints]]
name = "users.list"
pattern = "[area]/users"
methods = ["GET"]

[[endpoints]]
name = "users.get"
pattern = "[area]/users/{id:int}"
methods = ["GET"]

[[endpoints]]
name = "upload"
pattern = "upload"
methods = ["POST"]
consumes = ["application/json"]

[[endpoints]]
name = "first"
pattern = "dup/{x}"

[[endpoints]]
name = "second"
pattern = "dup/{y}"
"#;

fn router() -> Arc<Router> {
    let config = parse_config(CONFIG).unwrap();
    let source = Arc::new(DefaultEndpointDataSource::new(config.build_endpoints().unwrap()));
    Arc::new(Router::new(source).unwrap())
}

#[tokio::test]
async fn test_matched_endpoint_json() {
    let app = HttpServer::new(router()).app();
    let (status, headers, body) = send(app, request(Method::GET, "/api/users/42")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoint"], "users.get");
    assert_eq!(body["pattern"], "api/users/{id:int}");
    assert_eq!(body["values"]["id"], "42");
    assert!(headers.contains_key(X_REQUEST_ID));
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let app = HttpServer::new(router()).app();
    let request = Request::builder()
        .uri("/api/users")
        .header(X_REQUEST_ID, "trace-me")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[X_REQUEST_ID], "trace-me");
}

#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let app = HttpServer::new(router()).app();

    let (status, _, _) = send(app.clone(), request(Method::GET, "/api/users/abc")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, headers, body) = send(app.clone(), request(Method::DELETE, "/api/users/1")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[header::ALLOW], "GET");
    assert_eq!(body["allow"], "GET");

    let (status, _, _) = send(app, request(Method::GET, "/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_content_type_filtering() {
    let app = HttpServer::new(router()).app();

    let json = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, body) = send(app.clone(), json).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoint"], "upload");

    let text = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hi"))
        .unwrap();
    let (status, _, _) = send(app, text).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ambiguity_is_a_server_error() {
    let app = HttpServer::new(router()).app();
    let (status, _, body) = send(app, request(Method::GET, "/dup/1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["endpoints"], serde_json::json!(["first", "second"]));
}

fn admin() -> axum::Router {
    setup_admin_router(AdminState {
        router: router(),
        api_key: Arc::from("secret"),
    })
}

fn authorized(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_admin_requires_key() {
    let (status, _, _) = send(admin(), request(Method::GET, "/admin/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/admin/status")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(admin(), wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_status_and_endpoints() {
    let (status, _, body) = send(admin(), authorized("/admin/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"], 1);
    assert_eq!(body["endpoints"], 5);
    assert_eq!(body["policies"], serde_json::json!(["http_method", "consumes"]));

    let (status, _, body) = send(admin(), authorized("/admin/endpoints")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[1]["name"], "users.get");
    assert_eq!(body[1]["pattern"], "api/users/{id:int}");
    assert_eq!(body[1]["methods"], serde_json::json!(["GET"]));
    assert_eq!(body[2]["consumes"], serde_json::json!(["application/json"]));
}

#[tokio::test]
async fn test_admin_graph_is_dot() {
    let (status, headers, body) = send(admin(), authorized("/admin/graph")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/vnd.graphviz"));
    let dot = body.as_str().unwrap();
    assert!(dot.starts_with("digraph DFA {"));
    assert!(dot.contains("users.get"));
}
