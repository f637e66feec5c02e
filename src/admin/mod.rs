//! Admin API.
//!
//! # Routes
//! - `GET /admin/status`: generation, table size, active policies
//! - `GET /admin/endpoints`: the endpoint table with its metadata
//! - `GET /admin/graph`: the matcher automaton as Graphviz DOT
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::routing::router::Router as EndpointRouter;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub router: Arc<EndpointRouter>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/endpoints", get(get_endpoints))
        .route("/admin/graph", get(get_graph))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
