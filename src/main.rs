//! Endpoint router service.
//!
//! Serves an endpoint table loaded from TOML through the DFA matcher and
//! reports which endpoint every request selects.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ──▶ config::loader ──▶ DefaultEndpointDataSource
//!        │                                     │ change version
//!        └── config::watcher (notify) ─────────┤
//!                                              ▼
//!                                   RebuildCoordinator ──▶ Router (ArcSwap<MatcherSnapshot>)
//!                                                              ▲
//!   Client Request ──▶ http::server ──▶ match_request ─────────┘
//!                          │
//!                          ▼
//!                   200 {endpoint, values} | 404 | 405 + Allow | 500 ambiguous
//!
//!   admin (bearer key): /admin/status, /admin/endpoints, /admin/graph
//! ```

use std::path::PathBuf;

use clap::Parser;

use endpoint_router::lifecycle::startup;

#[derive(Parser)]
#[command(name = "endpoint-router", version, about = "DFA endpoint router")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    startup::run(&args.config).await?;
    Ok(())
}
