//! Dual-sink event store
//!
//! Every processed connection is appended to a JSON-line journal and
//! inserted into a SQLite table. The two writes are best-effort and
//! independent: a failing sink is logged and never suppresses the other.

mod journal;
mod schema;

pub use journal::Journal;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

use crate::geo::GeoInfo;

/// The unit of record: one processed connection. Built once after capture
/// and enrichment, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub port: u16,
    pub data: String,
    pub geo: GeoInfo,
    pub suspicious: bool,
}

impl ConnectionEvent {
    pub fn new(peer: SocketAddr, data: String, geo: GeoInfo, suspicious: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            ip: peer.ip().to_string(),
            port: peer.port(),
            data,
            geo,
            suspicious,
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path.display())).await?;
        Ok(Self { pool })
    }

    /// Idempotent: safe to run on every startup.
    pub async fn run_migrations(&self) -> Result<()> {
        // WAL for concurrent handler writes
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(schema::CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(schema::CREATE_INDEX_TIMESTAMP)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_IP)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// One event, one insert.
    pub async fn insert_event(&self, event: &ConnectionEvent) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO logs (timestamp, ip, port, data, country, city, org, suspicious)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.timestamp.to_rfc3339())
        .bind(&event.ip)
        .bind(event.port as i32)
        .bind(&event.data)
        .bind(&event.geo.country)
        .bind(&event.geo.city)
        .bind(&event.geo.org)
        .bind(event.suspicious as i32)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

/// Both sinks behind one handle. Handlers hold it only for the persist step.
#[derive(Clone)]
pub struct EventStore {
    journal: Arc<Journal>,
    db: Database,
}

impl EventStore {
    pub fn new(journal: Journal, db: Database) -> Self {
        Self {
            journal: Arc::new(journal),
            db,
        }
    }

    /// Attempt both writes for every event. Errors only when every sink
    /// rejected it, so the caller can report the loss.
    pub async fn record(&self, event: &ConnectionEvent) -> Result<()> {
        let journal_result = self.journal.append(event).await;
        if let Err(e) = &journal_result {
            error!("Journal append failed for {}: {:#}", event.ip, e);
        }

        let db_result = self.db.insert_event(event).await;
        if let Err(e) = &db_result {
            error!("Database insert failed for {}: {:#}", event.ip, e);
        }

        if journal_result.is_err() && db_result.is_err() {
            anyhow::bail!("event from {} lost: no sink accepted it", event.ip);
        }
        Ok(())
    }
}
