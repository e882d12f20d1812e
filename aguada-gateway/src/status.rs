use std::sync::Arc;
use std::time::{Duration, Instant};

use aguada_embedded::{GatewayStats, NetworkCandidate, StatsSnapshot};

/// Periodically logs the gateway counters and link flags.
pub struct StatusReporter {
    stats: Arc<GatewayStats>,
    networks: Vec<String>,
    interval: Duration,
    started: Instant,
}

impl StatusReporter {
    pub fn new(stats: Arc<GatewayStats>, candidates: &[NetworkCandidate], interval: Duration) -> Self {
        Self {
            stats,
            networks: candidates.iter().map(|c| c.ssid.clone()).collect(),
            interval,
            started: Instant::now(),
        }
    }

    pub fn summary(&self, snapshot: &StatsSnapshot) -> String {
        let network = snapshot
            .active_network
            .and_then(|index| self.networks.get(index))
            .map(String::as_str)
            .unwrap_or("-");

        format!(
            "link={} backend={} network={} rx={} tx={} errors={} overflows={}",
            if snapshot.link_ready { "up" } else { "down" },
            if snapshot.backend_available { "up" } else { "down" },
            network,
            snapshot.packets_rx,
            snapshot.packets_tx,
            snapshot.errors,
            snapshot.overflows,
        )
    }

    pub fn report(&self) {
        let snapshot = self.stats.snapshot();
        let uptime_secs = self.started.elapsed().as_secs();

        tracing::info!(uptime_secs, "Status: {}", self.summary(&snapshot));
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let stats = Arc::new(GatewayStats::new());
        let reporter = StatusReporter::new(
            stats.clone(),
            &[
                NetworkCandidate::new("TP-LINK_BE3344", ""),
                NetworkCandidate::new("luciano", "19852012"),
            ],
            Duration::from_secs(30),
        );

        assert_eq!(
            reporter.summary(&stats.snapshot()),
            "link=down backend=down network=- rx=0 tx=0 errors=0 overflows=0"
        );

        stats.set_connected(1);
        stats.set_backend_available(true);
        stats.record_received();
        stats.record_received();
        stats.record_forwarded();
        stats.record_overflow();

        assert_eq!(
            reporter.summary(&stats.snapshot()),
            "link=up backend=up network=luciano rx=2 tx=1 errors=0 overflows=1"
        );
    }
}
