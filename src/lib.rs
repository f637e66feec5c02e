//! Endpoint routing library.
//!
//! A DFA-based matcher that selects one endpoint per request from a table of
//! route templates, with pluggable parameter constraints and matcher
//! policies, plus the Axum hosting layer around it.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Endpoint, MatchOutcome, RequestContext, Router};
