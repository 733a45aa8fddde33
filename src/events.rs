//! Event bus for broadcasting captured connection events

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::store::ConnectionEvent;

/// Fan-out of recorded events. Persistence never depends on subscribers;
/// this is the seam where external presentation attaches.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<ConnectionEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: Arc<ConnectionEvent>) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ConnectionEvent>> {
        self.sender.subscribe()
    }
}

/// Mirror published events onto the tracing log.
pub fn spawn_log_mirror(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.suspicious {
                        warn!(
                            "Suspicious payload from {}:{} ({}, {} / {}): {:?}",
                            event.ip,
                            event.port,
                            event.geo.city,
                            event.geo.country,
                            event.geo.org,
                            event.data
                        );
                    } else {
                        info!(
                            "Connection from {}:{} ({}, {}): {:?}",
                            event.ip, event.port, event.geo.city, event.geo.country, event.data
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event mirror lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoInfo;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        let event = Arc::new(ConnectionEvent::new(
            "203.0.113.1:1234".parse().unwrap(),
            "probe".to_string(),
            GeoInfo::unknown(),
            false,
        ));
        bus.publish(event.clone());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.ip, event.ip);
        assert_eq!(received.data, "probe");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::new(8);
        bus.publish(Arc::new(ConnectionEvent::new(
            "203.0.113.1:1234".parse().unwrap(),
            String::new(),
            GeoInfo::unknown(),
            false,
        )));
    }
}
