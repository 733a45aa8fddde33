//! Source-address access filtering

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::net::IpAddr;

use crate::config::AccessConfig;

/// Decision for an incoming peer, made before any capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Deny-listed: close immediately, note the block.
    Deny,
    /// Allow-listed: close immediately, record nothing.
    Ignore,
    /// Unlisted: run the capture pipeline.
    Process,
}

/// Immutable allow/deny sets, consulted once per connection.
#[derive(Debug, Default)]
pub struct AccessList {
    deny: HashSet<IpAddr>,
    allow: HashSet<IpAddr>,
}

impl AccessList {
    pub fn from_config(config: &AccessConfig) -> Result<Self> {
        Ok(Self {
            deny: parse_entries(&config.deny).context("invalid deny list")?,
            allow: parse_entries(&config.allow).context("invalid allow list")?,
        })
    }

    /// Deny wins if an address was placed in both lists.
    pub fn check(&self, ip: IpAddr) -> Verdict {
        if self.deny.contains(&ip) {
            Verdict::Deny
        } else if self.allow.contains(&ip) {
            Verdict::Ignore
        } else {
            Verdict::Process
        }
    }
}

fn parse_entries(entries: &[String]) -> Result<HashSet<IpAddr>> {
    entries
        .iter()
        .map(|e| {
            e.parse::<IpAddr>()
                .with_context(|| format!("'{}' is not an IP address", e))
        })
        .collect()
}
