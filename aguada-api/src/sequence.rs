use alloc::collections::BTreeMap;

use crate::packet::{MacAddress, TelemetryPacket};

/// Largest forward jump still read as loss rather than a node restart.
pub const MAX_GAP: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// First packet seen from this source and channel
    First,
    InOrder,
    /// `missing` packets were lost between the previous and this one
    Gap { missing: u16 },
    Duplicate,
    /// Counter jumped backwards, usually a node reboot
    Restarted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub last_sequence: u16,
    pub received: u32,
    pub missing: u32,
}

/// Loss detection for the per-(source, channel) sequence counters, modulo 65536.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    streams: BTreeMap<(MacAddress, u8), StreamStats>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, packet: &TelemetryPacket) -> SequenceStatus {
        let key = (packet.source, packet.channel);

        let Some(stream) = self.streams.get_mut(&key) else {
            self.streams.insert(
                key,
                StreamStats {
                    last_sequence: packet.sequence,
                    received: 1,
                    missing: 0,
                },
            );
            return SequenceStatus::First;
        };

        let delta = packet.sequence.wrapping_sub(stream.last_sequence);
        let status = match delta {
            0 => SequenceStatus::Duplicate,
            1 => SequenceStatus::InOrder,
            d if d <= MAX_GAP => SequenceStatus::Gap { missing: d - 1 },
            _ => SequenceStatus::Restarted,
        };

        if status != SequenceStatus::Duplicate {
            stream.last_sequence = packet.sequence;
            stream.received += 1;
        }
        if let SequenceStatus::Gap { missing } = status {
            stream.missing += missing as u32;
        }

        status
    }

    pub fn stream(&self, source: MacAddress, channel: u8) -> Option<&StreamStats> {
        self.streams.get(&(source, channel))
    }

    pub fn missing_total(&self) -> u32 {
        self.streams.values().map(|s| s.missing).sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::packet::Distance;

    use super::*;

    const NODE: MacAddress = MacAddress([0xDC, 0x06, 0x75, 0x67, 0x6A, 0xCC]);

    fn packet(channel: u8, sequence: u16) -> TelemetryPacket {
        TelemetryPacket::new(NODE, channel, Distance::Centimeters(100), sequence)
    }

    #[test]
    fn test_in_order_and_gap() {
        let mut tracker = SequenceTracker::new();

        assert_eq!(tracker.observe(&packet(1, 10)), SequenceStatus::First);
        assert_eq!(tracker.observe(&packet(1, 11)), SequenceStatus::InOrder);
        assert_eq!(
            tracker.observe(&packet(1, 14)),
            SequenceStatus::Gap { missing: 2 }
        );
        assert_eq!(tracker.observe(&packet(1, 14)), SequenceStatus::Duplicate);

        let stream = tracker.stream(NODE, 1).unwrap();
        assert_eq!(stream.received, 3);
        assert_eq!(stream.missing, 2);
    }

    #[test]
    fn test_wraparound_is_in_order() {
        let mut tracker = SequenceTracker::new();

        tracker.observe(&packet(1, u16::MAX - 1));
        assert_eq!(tracker.observe(&packet(1, u16::MAX)), SequenceStatus::InOrder);
        assert_eq!(tracker.observe(&packet(1, 0)), SequenceStatus::InOrder);
        assert_eq!(
            tracker.observe(&packet(1, 3)),
            SequenceStatus::Gap { missing: 2 }
        );
    }

    #[test]
    fn test_channels_are_independent() {
        let mut tracker = SequenceTracker::new();

        tracker.observe(&packet(1, 5));
        assert_eq!(tracker.observe(&packet(2, 0)), SequenceStatus::First);
        assert_eq!(tracker.observe(&packet(2, 1)), SequenceStatus::InOrder);
        assert_eq!(tracker.observe(&packet(1, 6)), SequenceStatus::InOrder);
        assert_eq!(tracker.missing_total(), 0);
    }

    #[test]
    fn test_backwards_jump_is_restart() {
        let mut tracker = SequenceTracker::new();

        tracker.observe(&packet(1, 900));
        assert_eq!(tracker.observe(&packet(1, 0)), SequenceStatus::Restarted);
        assert_eq!(tracker.observe(&packet(1, 1)), SequenceStatus::InOrder);
    }
}
