//! Transport seam used by the controller to (re)establish peer links
//!
//! The controller only dispatches address sets; handshakes complete
//! asynchronously and are reported back as [`PeerEvent`]s.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("transport error: {0}")]
    Other(String),
}

/// Establishes links with peer addresses
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Dispatch link establishment for the full configured address set.
    ///
    /// Returns once the work is handed off, not when handshakes complete.
    async fn connect(&self, addresses: &[String]) -> Result<(), TransportError>;
}

/// Outcome of a link attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    Up { address: String, latency: Duration },
    Down { address: String, reason: String },
}

/// TCP transport that dials each address on a background task
pub struct TcpTransport {
    dials: mpsc::UnboundedSender<Vec<String>>,
}

impl TcpTransport {
    /// Spawn the dialer task. Must be called within a tokio runtime.
    pub fn spawn(dial_timeout: Duration) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (dials, mut batches) = mpsc::unbounded_channel::<Vec<String>>();
        let (events, peer_events) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                for address in batch {
                    let events = events.clone();
                    tokio::spawn(async move {
                        let event = dial(&address, dial_timeout).await;
                        let _ = events.send(event);
                    });
                }
            }
            debug!("TCP dialer stopped");
        });

        (Self { dials }, peer_events)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn connect(&self, addresses: &[String]) -> Result<(), TransportError> {
        self.dials
            .send(addresses.to_vec())
            .map_err(|_| TransportError::Closed)
    }
}

async fn dial(address: &str, timeout: Duration) -> PeerEvent {
    if !has_port(address) {
        warn!("Peer address {} has no port", address);
        return PeerEvent::Down {
            address: address.to_string(),
            reason: "missing port".to_string(),
        };
    }

    let start = Instant::now();
    match time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_)) => {
            debug!("TCP connection to {} succeeded", address);
            PeerEvent::Up {
                address: address.to_string(),
                latency: start.elapsed(),
            }
        }
        Ok(Err(e)) => {
            warn!("TCP connection to {} failed: {}", address, e);
            PeerEvent::Down {
                address: address.to_string(),
                reason: e.to_string(),
            }
        }
        Err(_) => {
            warn!("TCP connection to {} timed out", address);
            PeerEvent::Down {
                address: address.to_string(),
                reason: "timeout".to_string(),
            }
        }
    }
}

fn has_port(address: &str) -> bool {
    address
        .rsplit_once(':')
        .map_or(false, |(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}
