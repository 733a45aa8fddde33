//! Decoy listener: accept loop and access gating
//!
//! The accept loop stays free of blocking work. Every accepted connection
//! is gated through the access list and handed to its own task; a peer
//! that connects and stalls cannot starve the next one.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::filter::{AccessList, Verdict};
use crate::handler::{self, HandlerContext};

pub struct Listener {
    listener: TcpListener,
    access: AccessList,
    ctx: Arc<HandlerContext>,
}

impl Listener {
    /// Bind failure is fatal; the caller reports it and exits.
    pub async fn bind(addr: &str, access: AccessList, ctx: Arc<HandlerContext>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind decoy listener to {}", addr))?;
        Ok(Self {
            listener,
            access,
            ctx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Per-connection errors are logged and never end it.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Decoy listening on {}", addr),
            Err(_) => info!("Decoy listening"),
        }

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    match self.access.check(peer.ip()) {
                        Verdict::Deny => {
                            info!("Blocked connection from deny-listed {}", peer.ip());
                            continue;
                        }
                        Verdict::Ignore => {
                            debug!("Ignoring allow-listed {}", peer.ip());
                            continue;
                        }
                        Verdict::Process => {}
                    }

                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        handler::handle_connection(socket, peer, ctx).await;
                    });
                }
                Err(e) => {
                    warn!("Accept error: {}", e);
                }
            }
        }
    }
}
