//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app around the endpoint router
//! - Wire up middleware (request ID, tracing, routing)
//! - Serve until the shutdown signal
//!
//! # Data Flow
//! ```text
//! Request
//!     → SetRequestId → TraceLayer span → PropagateRequestId
//!     → route_request (match, EndpointMatch into extensions)
//!     → describe_endpoint (terminal handler)
//! ```

use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::http::{request, response};
use crate::observability::metrics;
use crate::observability::tracing::{make_request_span, record_outcome};
use crate::routing::context::RequestContext;
use crate::routing::router::Router as EndpointRouter;
use crate::routing::selector::{EndpointMatch, MatchOutcome};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<EndpointRouter>,
}

/// HTTP server answering every path through the endpoint router.
pub struct HttpServer {
    app: Router,
}

impl HttpServer {
    pub fn new(router: Arc<EndpointRouter>) -> Self {
        Self {
            app: build_app(AppState { router }),
        }
    }

    /// The app as a service, for in-process use.
    pub fn app(&self) -> Router {
        self.app.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum app with all middleware layers.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .fallback(describe_endpoint)
        .layer(middleware::from_fn_with_state(state, route_request))
        .layer(
            ServiceBuilder::new()
                .layer(request::set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| make_request_span(request)))
                .layer(request::propagate_request_id_layer()),
        )
}

/// Matches the request; only matched requests reach the handler.
async fn route_request(State(state): State<AppState>, mut request: Request<Body>, next: Next) -> Response {
    let context = RequestContext::from_request(&request);
    let method = request.method().clone();

    let response = match state.router.match_request(&context) {
        MatchOutcome::Matched(found) => {
            record_outcome("matched", Some(found.endpoint().display_name()));
            tracing::debug!(
                endpoint = %found.endpoint().display_name(),
                values = found.values().len(),
                "Endpoint selected"
            );
            request.extensions_mut().insert(found);
            next.run(request).await
        }
        unmatched => {
            record_outcome(unmatched.label(), None);
            tracing::debug!(outcome = unmatched.label(), "No endpoint selected");
            response::outcome_response(&unmatched)
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16());
    response
}

async fn describe_endpoint(Extension(found): Extension<EndpointMatch>) -> Response {
    response::matched(&found)
}
