use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::routing::policy::{ConsumesMetadata, HostMetadata, HttpMethodMetadata};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub endpoints: usize,
    pub nodes: usize,
    pub policies: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub name: String,
    pub pattern: String,
    pub order: i32,
    pub methods: Vec<String>,
    pub hosts: Vec<String>,
    pub consumes: Vec<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.router.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        generation: snapshot.generation(),
        built_at: snapshot.built_at(),
        endpoints: snapshot.endpoints().len(),
        nodes: snapshot.matcher().node_count(),
        policies: snapshot.active_policies().into_iter().map(String::from).collect(),
    })
}

pub async fn get_endpoints(State(state): State<AdminState>) -> Json<Vec<EndpointStatus>> {
    let snapshot = state.router.snapshot();
    let endpoints = snapshot
        .endpoints()
        .iter()
        .map(|endpoint| EndpointStatus {
            name: endpoint.display_name().to_string(),
            pattern: endpoint.pattern().raw().to_string(),
            order: endpoint.order(),
            methods: endpoint
                .metadata_of::<HttpMethodMetadata>()
                .map(|m| m.methods().iter().map(|method| method.to_string()).collect())
                .unwrap_or_default(),
            hosts: endpoint
                .metadata_of::<HostMetadata>()
                .map(|m| m.hosts().iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
            consumes: endpoint
                .metadata_of::<ConsumesMetadata>()
                .map(|m| m.content_types().iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
        })
        .collect();
    Json(endpoints)
}

pub async fn get_graph(State(state): State<AdminState>) -> impl IntoResponse {
    let snapshot = state.router.snapshot();
    (
        [(header::CONTENT_TYPE, "text/vnd.graphviz; charset=utf-8")],
        snapshot.matcher().dot().to_string(),
    )
}
