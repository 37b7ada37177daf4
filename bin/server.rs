// Registry Index - Search Server
// REST API with Axum over the SQLite indices

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use registry_index::api::{router, AppState};
use registry_index::logging::configure_logging;

#[derive(Parser)]
#[command(name = "registry-server", version, about = "Serve paginated search over the registry indices")]
struct ServerArgs {
    #[arg(long, env = "REGISTRY_DB", default_value = "registry.db")]
    db: PathBuf,

    #[arg(long, env = "REGISTRY_ADDR", default_value = "0.0.0.0:3000")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let args = ServerArgs::parse();

    if !args.db.exists() {
        anyhow::bail!(
            "Database not found: {:?}. Run `registry-index load` first.",
            args.db
        );
    }

    let app = router(AppState::new(args.db.clone()));

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;

    info!(addr = %args.addr, db = %args.db.display(), "🚀 registry search server listening");
    println!("📡 API endpoints:");
    println!("   GET /api/health");
    println!("   GET /api/search/:index?page=&pageSize=&searchTerm=&sortField=&sortOrder=&cursorToken=");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
