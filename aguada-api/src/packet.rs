use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{PacketError, Result};

/// Encoded size of a [`TelemetryPacket`]: mac(6) + channel(1) + distance(2) + sequence(2) + rssi(1)
pub const PACKET_SIZE: usize = 12;

/// Distance value sent when the transducer failed or timed out
pub const DISTANCE_SENSOR_FAILURE: u16 = 0xFFFF;

/// Distance value sent when a reading fell outside the configured valid window
pub const DISTANCE_OUT_OF_RANGE: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Link-layer "all nodes" address every agent transmits to.
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for MacAddress {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or(PacketError::InvalidAddress)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(PacketError::InvalidAddress);
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| PacketError::InvalidAddress)?;
        }

        if parts.next().is_some() {
            return Err(PacketError::InvalidAddress);
        }

        Ok(Self(octets))
    }
}

/// Decoded meaning of the wire `distance` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Centimeters(u16),
    SensorFailure,
    OutOfRange,
}

impl Distance {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            DISTANCE_SENSOR_FAILURE => Distance::SensorFailure,
            DISTANCE_OUT_OF_RANGE => Distance::OutOfRange,
            cm => Distance::Centimeters(cm),
        }
    }

    /// Valid readings are clamped below the sentinel space.
    pub fn to_raw(self) -> u16 {
        match self {
            Distance::Centimeters(cm) => cm.min(DISTANCE_OUT_OF_RANGE - 1),
            Distance::SensorFailure => DISTANCE_SENSOR_FAILURE,
            Distance::OutOfRange => DISTANCE_OUT_OF_RANGE,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Distance::Centimeters(_))
    }
}

/// One ranging reading as relayed over the radio link.
///
/// Multi-byte fields are little-endian. There is no framing, checksum or timestamp; the
/// transport's own integrity check and the receiver's clock cover those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryPacket {
    pub source: MacAddress,
    pub channel: u8,
    pub distance: u16,
    pub sequence: u16,
    pub signal_strength: i8,
}

impl TelemetryPacket {
    pub fn new(source: MacAddress, channel: u8, distance: Distance, sequence: u16) -> Self {
        Self {
            source,
            channel,
            distance: distance.to_raw(),
            sequence,
            signal_strength: 0,
        }
    }

    pub fn distance(&self) -> Distance {
        Distance::from_raw(self.distance)
    }

    /// Returns a copy carrying the link quality measured by the receiver.
    pub fn with_signal_strength(mut self, rssi: i8) -> Self {
        self.signal_strength = rssi;
        self
    }

    /// Encodes packet to its fixed wire layout
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buffer = [0u8; PACKET_SIZE];

        buffer[0..6].copy_from_slice(&self.source.0);
        buffer[6] = self.channel;
        buffer[7..9].copy_from_slice(&self.distance.to_le_bytes());
        buffer[9..11].copy_from_slice(&self.sequence.to_le_bytes());
        buffer[11] = self.signal_strength as u8;

        buffer
    }

    /// Decodes a received frame, rejecting anything that is not exactly one packet
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != PACKET_SIZE {
            return Err(PacketError::InvalidLength {
                expected: PACKET_SIZE,
                actual: data.len(),
            });
        }

        let mut source = [0u8; 6];
        source.copy_from_slice(&data[0..6]);

        Ok(Self {
            source: MacAddress(source),
            channel: data[6],
            distance: u16::from_le_bytes([data[7], data[8]]),
            sequence: u16::from_le_bytes([data[9], data[10]]),
            signal_strength: data[11] as i8,
        })
    }
}
