/**
 * tasksync-agent
 *
 * Drains the persisted mutation queue once and reports what happened.
 *
 *   tasksync-agent [config.toml]
 *
 * Exits 0 when everything went through, 2 when entries were left queued.
 */

use std::path::Path;
use std::sync::Arc;
use tasksync::client::{ApiClient, Config, LocalDatabase, Synchronizer, TracingTelemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(Path::new(&path))?,
        None => Config::from_env()?,
    };

    let db_path = config.database_path();
    tracing::info!("Using {} against {}", db_path.display(), config.server_url());

    let db = LocalDatabase::open(&db_path).await?;
    let api = ApiClient::new(config)?;
    let synchronizer = Synchronizer::new(api, db, Arc::new(TracingTelemetry));

    let report = synchronizer.process_queue().await?;

    println!("attempted:  {}", report.attempted);
    println!("succeeded:  {}", report.succeeded.len());
    println!("failed:     {}", report.failed.len());
    println!("blocked:    {}", report.blocked.len());
    for (placeholder, id) in &report.confirmed {
        println!("confirmed:  {} -> {}", placeholder, id);
    }
    for placeholder in &report.unresolved {
        println!("unresolved: {}", placeholder);
    }
    for failed in &report.failed {
        eprintln!("#{}: {}", failed.seq, failed.error);
    }

    if !report.is_complete() {
        std::process::exit(2);
    }
    Ok(())
}
