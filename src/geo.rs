//! Source-address enrichment via an external IP directory
//!
//! The directory is any HTTP service answering `GET {endpoint}/{ip}` with a
//! JSON body carrying `country`, `city` and `org` fields. Lookups degrade to
//! a sentinel triple on every failure; enrichment never fails the pipeline.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::GeoConfig;

/// Placeholder for fields the directory could not resolve.
pub const UNKNOWN: &str = "N/A";

/// Geographic/organizational attributes of a source address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: String,
    pub city: String,
    pub org: String,
}

impl GeoInfo {
    /// The sentinel triple. No field is ever left empty.
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            org: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("lookup timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(reqwest::Error),
    #[error("directory returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed directory response: {0}")]
    Malformed(reqwest::Error),
}

/// Fields the directory may report; anything absent maps to the sentinel.
#[derive(Debug, Deserialize)]
struct DirectoryRecord {
    country: Option<String>,
    city: Option<String>,
    org: Option<String>,
}

pub struct Enricher {
    client: reqwest::Client,
    endpoint: String,
}

impl Enricher {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build geo lookup client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// One outbound lookup, with the failure mode preserved for inspection.
    pub async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError> {
        let url = format!("{}/{}", self.endpoint, ip);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeoError::Timeout
            } else {
                GeoError::Network(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status()));
        }

        let record: DirectoryRecord = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeoError::Timeout
            } else {
                GeoError::Malformed(e)
            }
        })?;

        Ok(GeoInfo {
            country: record.country.unwrap_or_else(|| UNKNOWN.to_string()),
            city: record.city.unwrap_or_else(|| UNKNOWN.to_string()),
            org: record.org.unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }

    /// Lookup with the sentinel fallback applied. This is what the
    /// connection handler calls.
    pub async fn resolve(&self, ip: IpAddr) -> GeoInfo {
        // The directory has no answer for private/loopback ranges.
        if is_local_ip(&ip) {
            return GeoInfo::unknown();
        }
        match self.lookup(ip).await {
            Ok(geo) => geo,
            Err(e) => {
                warn!("Geo lookup for {} failed: {}", ip, e);
                GeoInfo::unknown()
            }
        }
    }
}

/// Check if an IP address is private/local
fn is_local_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => ipv6.is_loopback() || ipv6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // TEST-NET-3, guaranteed non-local so resolve() actually calls out.
    const PUBLIC_IP: &str = "203.0.113.5";

    fn enricher_for(endpoint: String) -> Enricher {
        Enricher::new(&GeoConfig {
            endpoint,
            timeout_secs: 1,
        })
        .unwrap()
    }

    /// Serve a single canned HTTP response on an ephemeral loopback port.
    async fn serve_once(status: &'static str, body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        addr
    }

    #[tokio::test]
    async fn resolves_directory_answer() {
        let addr = serve_once(
            "200 OK",
            r#"{"country":"Netherlands","city":"Amsterdam","org":"Example B.V."}"#,
        )
        .await;
        let enricher = enricher_for(format!("http://{}", addr));
        let geo = enricher.resolve(PUBLIC_IP.parse().unwrap()).await;
        assert_eq!(geo.country, "Netherlands");
        assert_eq!(geo.city, "Amsterdam");
        assert_eq!(geo.org, "Example B.V.");
    }

    #[tokio::test]
    async fn missing_fields_map_to_sentinel() {
        let addr = serve_once("200 OK", r#"{"country":"Netherlands"}"#).await;
        let enricher = enricher_for(format!("http://{}", addr));
        let geo = enricher.resolve(PUBLIC_IP.parse().unwrap()).await;
        assert_eq!(geo.country, "Netherlands");
        assert_eq!(geo.city, UNKNOWN);
        assert_eq!(geo.org, UNKNOWN);
    }

    #[tokio::test]
    async fn unreachable_directory_yields_sentinel() {
        // Nothing listens on the discard port.
        let enricher = enricher_for("http://127.0.0.1:9".to_string());
        let ip: IpAddr = PUBLIC_IP.parse().unwrap();

        let err = enricher.lookup(ip).await.unwrap_err();
        assert!(matches!(err, GeoError::Network(_) | GeoError::Timeout));

        assert_eq!(enricher.resolve(ip).await, GeoInfo::unknown());
    }

    #[tokio::test]
    async fn non_success_status_yields_sentinel() {
        let addr = serve_once("500 Internal Server Error", "{}").await;
        let enricher = enricher_for(format!("http://{}", addr));
        let ip: IpAddr = PUBLIC_IP.parse().unwrap();

        let err = enricher.lookup(ip).await.unwrap_err();
        assert!(matches!(err, GeoError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn malformed_body_yields_sentinel() {
        let addr = serve_once("200 OK", "not json at all").await;
        let enricher = enricher_for(format!("http://{}", addr));
        let ip: IpAddr = PUBLIC_IP.parse().unwrap();

        let err = enricher.lookup(ip).await.unwrap_err();
        assert!(matches!(err, GeoError::Malformed(_)));
        assert_eq!(enricher.resolve(ip).await, GeoInfo::unknown());
    }

    #[tokio::test]
    async fn local_addresses_skip_the_lookup() {
        let enricher = enricher_for("http://127.0.0.1:9".to_string());
        let geo = enricher.resolve("127.0.0.1".parse().unwrap()).await;
        assert_eq!(geo, GeoInfo::unknown());
    }
}
