use core::fmt;

use alloc::sync::Arc;

use aguada_api::{PacketError, TelemetryPacket};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::radio::{FrameSink, RxMetadata};
use crate::stats::GatewayStats;

pub const INGEST_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
    /// Frame was not exactly one telemetry packet
    Malformed { len: usize },
    /// Queue full; the incoming packet was dropped
    Overflow,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { len } => write!(f, "Malformed frame ({} bytes)", len),
            Self::Overflow => write!(f, "Ingest queue full"),
        }
    }
}

/// Bounded FIFO between the radio receive path and the forwarding worker.
///
/// Pushing never blocks: when the queue is full the newest packet is dropped and counted.
/// Popping waits until a packet is available.
pub struct IngestQueue<const N: usize = INGEST_QUEUE_CAPACITY> {
    channel: Channel<CriticalSectionRawMutex, TelemetryPacket, N>,
    stats: Arc<GatewayStats>,
}

impl<const N: usize> IngestQueue<N> {
    pub fn new(stats: Arc<GatewayStats>) -> Self {
        Self {
            channel: Channel::new(),
            stats,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Validates a received frame, stamps it with the link RSSI and enqueues it.
    pub fn push_frame(&self, frame: &[u8], meta: RxMetadata) -> Result<(), IngestError> {
        let packet = match TelemetryPacket::decode(frame) {
            Ok(packet) => packet.with_signal_strength(meta.rssi),
            Err(PacketError::InvalidLength { actual, .. }) => {
                log::warn!("Dropping frame with invalid length {}", actual);
                self.stats.record_error();
                return Err(IngestError::Malformed { len: actual });
            }
            Err(e) => {
                log::warn!("Dropping undecodable frame: {}", e);
                self.stats.record_error();
                return Err(IngestError::Malformed { len: frame.len() });
            }
        };

        if let Some(source) = meta.source {
            if source != packet.source {
                log::debug!("Frame from {} carries node address {}", source, packet.source);
            }
        }

        match self.channel.try_send(packet) {
            Ok(()) => {
                self.stats.record_received();
                log::debug!(
                    "Queued packet from {} channel {} seq {} rssi {}",
                    packet.source,
                    packet.channel,
                    packet.sequence,
                    packet.signal_strength
                );
                Ok(())
            }
            Err(TrySendError::Full(dropped)) => {
                self.stats.record_overflow();
                log::warn!(
                    "Ingest queue full, dropping packet from {} seq {}",
                    dropped.source,
                    dropped.sequence
                );
                Err(IngestError::Overflow)
            }
        }
    }

    /// Waits for the oldest queued packet.
    pub async fn next(&self) -> TelemetryPacket {
        self.channel.receive().await
    }

    pub fn try_next(&self) -> Option<TelemetryPacket> {
        self.channel.try_receive().ok()
    }
}

impl<const N: usize> FrameSink for IngestQueue<N> {
    fn on_receive(&self, frame: &[u8], meta: RxMetadata) {
        let _ = self.push_frame(frame, meta);
    }
}

#[cfg(test)]
mod tests {
    use aguada_api::{Distance, MacAddress};

    use super::*;

    const NODE: MacAddress = MacAddress([0x20, 0x6E, 0xF1, 0x6B, 0x77, 0x58]);

    fn frame(sequence: u16) -> [u8; 12] {
        TelemetryPacket::new(NODE, 1, Distance::Centimeters(150), sequence).encode()
    }

    fn meta(rssi: i8) -> RxMetadata {
        RxMetadata::new(Some(NODE), rssi)
    }

    #[test]
    fn test_fifo_order_and_rssi_stamp() {
        let queue: IngestQueue = IngestQueue::new(Arc::new(GatewayStats::new()));

        for seq in 0..3 {
            queue.push_frame(&frame(seq), meta(-60 - seq as i8)).unwrap();
        }

        for seq in 0..3u16 {
            let packet = queue.try_next().unwrap();
            assert_eq!(packet.sequence, seq);
            assert_eq!(packet.signal_strength, -60 - seq as i8);
            assert_eq!(packet.distance(), Distance::Centimeters(150));
        }
        assert!(queue.try_next().is_none());
        assert_eq!(queue.stats().snapshot().packets_rx, 3);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let stats = Arc::new(GatewayStats::new());
        let queue: IngestQueue = IngestQueue::new(stats.clone());
        assert_eq!(queue.capacity(), 10);

        for seq in 0..10 {
            queue.push_frame(&frame(seq), meta(-70)).unwrap();
        }
        assert_eq!(
            queue.push_frame(&frame(10), meta(-70)),
            Err(IngestError::Overflow)
        );

        for seq in 0..10 {
            assert_eq!(queue.try_next().unwrap().sequence, seq);
        }
        assert!(queue.try_next().is_none());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_rx, 10);
        assert_eq!(snapshot.overflows, 1);
    }

    #[test]
    fn test_malformed_frames_are_counted_and_dropped() {
        let stats = Arc::new(GatewayStats::new());
        let queue: IngestQueue<4> = IngestQueue::new(stats.clone());

        let valid = frame(1);
        let mut long = [0u8; 13];
        long[..12].copy_from_slice(&valid);

        assert_eq!(
            queue.push_frame(&valid[..11], meta(-40)),
            Err(IngestError::Malformed { len: 11 })
        );
        assert_eq!(
            queue.push_frame(&long, meta(-40)),
            Err(IngestError::Malformed { len: 13 })
        );
        queue.on_receive(&[], meta(-40));

        assert!(queue.try_next().is_none());
        assert_eq!(stats.snapshot().errors, 3);
        assert_eq!(stats.snapshot().packets_rx, 0);
    }

    #[tokio::test]
    async fn test_next_waits_for_producer() {
        let queue: Arc<IngestQueue> = Arc::new(IngestQueue::new(Arc::new(GatewayStats::new())));

        let producer = queue.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
            producer.on_receive(&frame(42), meta(-55));
        });

        let packet = queue.next().await;
        assert_eq!(packet.sequence, 42);
        assert_eq!(packet.signal_strength, -55);

        handle.await.unwrap();
    }
}
