use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use serde::Serialize;

/// Gateway counters and link flags, shared by the receive path, the forwarding worker,
/// the network supervisor and the status reporter.
///
/// Every field is an independent atomic; readers may observe a snapshot that is a few
/// events stale but never a torn value.
#[derive(Debug)]
pub struct GatewayStats {
    link_ready: AtomicBool,
    backend_available: AtomicBool,
    packets_rx: AtomicU32,
    packets_tx: AtomicU32,
    errors: AtomicU32,
    overflows: AtomicU32,
    active_network: AtomicUsize,
}

const NO_NETWORK: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub link_ready: bool,
    pub backend_available: bool,
    pub packets_rx: u32,
    pub packets_tx: u32,
    pub errors: u32,
    pub overflows: u32,
    /// Index of the candidate network in use
    pub active_network: Option<usize>,
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self {
            link_ready: AtomicBool::new(false),
            backend_available: AtomicBool::new(false),
            packets_rx: AtomicU32::new(0),
            packets_tx: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            overflows: AtomicU32::new(0),
            active_network: AtomicUsize::new(NO_NETWORK),
        }
    }
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the upstream link up on the candidate at `index`.
    pub fn set_connected(&self, index: usize) {
        self.active_network.store(index, Ordering::Relaxed);
        self.set_link_ready(true);
    }

    pub fn set_link_ready(&self, ready: bool) {
        self.link_ready.store(ready, Ordering::Relaxed);
    }

    pub fn set_backend_available(&self, available: bool) {
        self.backend_available.store(available, Ordering::Relaxed);
    }

    /// Clears both connectivity flags after the upstream link went away.
    pub fn mark_offline(&self) {
        self.active_network.store(NO_NETWORK, Ordering::Relaxed);
        self.set_link_ready(false);
        self.set_backend_available(false);
    }

    pub fn is_link_ready(&self) -> bool {
        self.link_ready.load(Ordering::Relaxed)
    }

    pub fn is_backend_available(&self) -> bool {
        self.backend_available.load(Ordering::Relaxed)
    }

    pub fn record_received(&self) {
        self.packets_rx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.packets_tx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            link_ready: self.is_link_ready(),
            backend_available: self.is_backend_available(),
            packets_rx: self.packets_rx.load(Ordering::Relaxed),
            packets_tx: self.packets_tx.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            active_network: match self.active_network.load(Ordering::Relaxed) {
                NO_NETWORK => None,
                index => Some(index),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_flags() {
        let stats = GatewayStats::new();

        stats.record_received();
        stats.record_received();
        stats.record_forwarded();
        stats.record_error();
        stats.record_overflow();
        stats.set_connected(1);
        stats.set_backend_available(true);

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                link_ready: true,
                backend_available: true,
                packets_rx: 2,
                packets_tx: 1,
                errors: 1,
                overflows: 1,
                active_network: Some(1),
            }
        );

        stats.mark_offline();
        let snapshot = stats.snapshot();
        assert!(!snapshot.link_ready);
        assert!(!snapshot.backend_available);
        assert_eq!(snapshot.active_network, None);
        assert_eq!(snapshot.packets_rx, 2);
    }
}
