//! netdecoy - a passive TCP decoy service
//!
//! Accepts unsolicited connections, captures the first payload, classifies
//! it against known attack patterns, enriches the source address with
//! geolocation data, and records every event to a JSON-line journal and a
//! SQLite store. Suspicious peers get a canned shell-looking reply.

mod classifier;
mod config;
mod events;
mod filter;
mod geo;
mod handler;
mod listener;
mod store;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = config::Config::load()?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting netdecoy...");

    let db = store::Database::open(Path::new(&config.storage.db_path)).await?;
    db.run_migrations().await?;
    let journal = store::Journal::open(Path::new(&config.storage.journal_path)).await?;
    let event_store = store::EventStore::new(journal, db);
    info!("Event sinks initialized");

    let classifier = classifier::Classifier::new(&config.classifier.patterns)?;
    let enricher = geo::Enricher::new(&config.geo)?;
    let access = filter::AccessList::from_config(&config.access)?;

    let event_bus = events::EventBus::new(1024);
    events::spawn_log_mirror(&event_bus);

    let ctx = Arc::new(handler::HandlerContext {
        capture: config.capture.clone(),
        classifier,
        enricher,
        store: event_store,
        event_bus,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = listener::Listener::bind(&addr, access, ctx).await?;

    tokio::select! {
        _ = listener.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
