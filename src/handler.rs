//! Per-connection capture pipeline
//!
//! Each accepted connection runs filter -> capture -> classify -> enrich ->
//! persist -> reply in its own task. Nothing here may take the process
//! down or stall another connection; every failure is logged and the
//! socket closes on the way out regardless.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::classifier::Classifier;
use crate::config::CaptureConfig;
use crate::events::EventBus;
use crate::geo::Enricher;
use crate::store::{ConnectionEvent, EventStore};

/// Canned reply for suspicious peers. Looks like a shell, does nothing.
const DECOY_REPLY: &[u8] = b"[root@honeypot /]$ command not found\n";

/// Shared collaborators for every connection handler.
pub struct HandlerContext {
    pub capture: CaptureConfig,
    pub classifier: Classifier,
    pub enricher: Enricher,
    pub store: EventStore,
    pub event_bus: EventBus,
}

pub async fn handle_connection(mut socket: TcpStream, peer: SocketAddr, ctx: Arc<HandlerContext>) {
    let payload = read_payload(&mut socket, peer, &ctx.capture).await;
    let data = String::from_utf8_lossy(&payload).trim().to_string();

    let suspicious = ctx.classifier.is_suspicious(&data);
    let geo = ctx.enricher.resolve(peer.ip()).await;

    let event = ConnectionEvent::new(peer, data, geo, suspicious);
    if let Err(e) = ctx.store.record(&event).await {
        warn!("Failed to record event from {}: {:#}", peer, e);
    }
    ctx.event_bus.publish(Arc::new(event));

    if suspicious {
        // The peer may already be gone; nothing to do about it.
        let _ = socket.write_all(DECOY_REPLY).await;
        let _ = socket.flush().await;
    }
    // Socket closes when dropped here, on every path.
}

/// Read up to `max_payload_bytes` under one overall deadline. EOF, reset
/// and timeout all yield whatever arrived before them.
async fn read_payload(socket: &mut TcpStream, peer: SocketAddr, capture: &CaptureConfig) -> Vec<u8> {
    let mut buf = vec![0u8; capture.max_payload_bytes];
    let mut filled = 0usize;
    let deadline = Instant::now() + Duration::from_secs(capture.read_timeout_secs);

    while filled < buf.len() {
        match tokio::time::timeout_at(deadline, socket.read(&mut buf[filled..])).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => filled += n,
            Ok(Err(e)) => {
                debug!("Read error from {}: {}", peer, e);
                break;
            }
            Err(_) => {
                debug!("Read deadline for {}, keeping {} captured bytes", peer, filled);
                break;
            }
        }
    }

    buf.truncate(filled);
    buf
}
