use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use endpoint_router::config::load_config;
use endpoint_router::routing::{DefaultEndpointDataSource, Router};

#[derive(Parser)]
#[command(name = "route-cli")]
#[command(about = "Management CLI for the endpoint router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show router generation and table size
    Status,
    /// List the endpoint table
    Endpoints,
    /// Print the matcher automaton as Graphviz DOT
    Graph,
    /// Load, validate and build a config file without a running server
    Check {
        config: PathBuf,
        /// Also print the automaton of the checked config
        #[arg(long)]
        graph: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = match &cli.command {
        Commands::Check { config, graph } => return check(config, *graph),
        Commands::Status => "status",
        Commands::Endpoints => "endpoints",
        Commands::Graph => "graph",
    };

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = client
        .get(format!("{}/admin/{}", cli.url, path))
        .headers(headers)
        .send()
        .await?;

    if path == "graph" {
        print_text(res).await
    } else {
        print_response(res).await
    }
}

fn check(path: &Path, graph: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let source = Arc::new(DefaultEndpointDataSource::new(config.build_endpoints()?));
    let router = Router::new(source)?;
    let snapshot = router.snapshot();

    println!(
        "{}: {} endpoints, {} nodes, policies {:?}",
        path.display(),
        snapshot.endpoints().len(),
        snapshot.matcher().node_count(),
        snapshot.active_policies()
    );
    if graph {
        print!("{}", snapshot.matcher().dot());
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        return Ok(());
    }
    print!("{}", res.text().await?);
    Ok(())
}
