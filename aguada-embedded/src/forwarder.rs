use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use aguada_api::{Distance, TelemetryPacket, UplinkRequest};
use embassy_time::{Duration, with_timeout};

use crate::error::{Error, Result};
use crate::ingest::IngestQueue;
use crate::stats::GatewayStats;

pub const UPLINK_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP-style request/response uplink.
#[allow(async_fn_in_trait)]
pub trait UplinkClient {
    type Error: core::fmt::Debug;

    /// POST a JSON body and return the response status code.
    async fn post_json(&mut self, url: &str, body: &[u8]) -> core::result::Result<u16, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Backend answered with a 2xx status
    Delivered { status: u16 },
    /// Backend answered with any other status
    Rejected { status: u16 },
    /// Request never completed (connection refused, DNS, reset)
    TransportFailed,
    /// No response within the uplink timeout
    TimedOut,
    /// Packet could not be serialized
    EncodingFailed,
}

impl ForwardOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ForwardOutcome::Delivered { .. })
    }
}

/// Relays queued packets to the backend, one request per packet.
///
/// Delivery is at-most-once: a failed or timed-out packet is counted and dropped. When more
/// than one backend URL is configured a failure moves the next packet on to the next URL.
pub struct BackendForwarder<U: UplinkClient> {
    client: U,
    urls: Vec<String>,
    preferred: usize,
    timeout: Duration,
    stats: Arc<GatewayStats>,
}

impl<U: UplinkClient> BackendForwarder<U> {
    pub fn new(client: U, urls: Vec<String>, stats: Arc<GatewayStats>) -> Result<Self> {
        if urls.is_empty() {
            log::error!("No backend URL configured");
            return Err(Error::InvalidConfig);
        }

        Ok(Self {
            client,
            urls,
            preferred: 0,
            timeout: UPLINK_TIMEOUT,
            stats,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL the next packet will be sent to.
    pub fn backend_url(&self) -> &str {
        &self.urls[self.preferred]
    }

    pub fn client(&self) -> &U {
        &self.client
    }

    /// Sends one packet, whatever the last known backend availability was.
    pub async fn forward(&mut self, packet: &TelemetryPacket) -> ForwardOutcome {
        if packet.distance() == Distance::SensorFailure {
            log::warn!(
                "Node {} channel {} reported a sensor failure",
                packet.source,
                packet.channel
            );
        }

        let body = match UplinkRequest::from(packet).to_json() {
            Ok(body) => body,
            Err(e) => {
                log::error!("Failed to encode uplink request: {}", e);
                self.stats.record_error();
                return ForwardOutcome::EncodingFailed;
            }
        };

        let url = &self.urls[self.preferred];
        let result = with_timeout(self.timeout, self.client.post_json(url, &body)).await;

        let outcome = match result {
            Ok(Ok(status)) if (200..300).contains(&status) => ForwardOutcome::Delivered { status },
            Ok(Ok(status)) => ForwardOutcome::Rejected { status },
            Ok(Err(e)) => {
                log::warn!("POST {} failed: {:?}", url, e);
                ForwardOutcome::TransportFailed
            }
            Err(_) => ForwardOutcome::TimedOut,
        };

        if outcome.is_delivered() {
            log::debug!(
                "Forwarded {} channel {} seq {} ({:?})",
                packet.source,
                packet.channel,
                packet.sequence,
                outcome
            );
            self.stats.set_backend_available(true);
            self.stats.record_forwarded();
        } else {
            log::warn!(
                "Dropping {} channel {} seq {}: {:?}",
                packet.source,
                packet.channel,
                packet.sequence,
                outcome
            );
            self.stats.set_backend_available(false);
            self.stats.record_error();
            self.rotate_backend();
        }

        outcome
    }

    /// Drains the queue forever, forwarding packets in arrival order.
    pub async fn run<const N: usize>(&mut self, queue: &IngestQueue<N>) -> ! {
        log::info!("Forwarding to {}", self.backend_url());

        loop {
            let packet = queue.next().await;
            self.forward(&packet).await;
        }
    }

    fn rotate_backend(&mut self) {
        if self.urls.len() > 1 {
            self.preferred = (self.preferred + 1) % self.urls.len();
            log::info!("Switching backend to {}", self.urls[self.preferred]);
        }
    }
}
