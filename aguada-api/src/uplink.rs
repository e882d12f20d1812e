use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::packet::TelemetryPacket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkReading {
    pub sensor_id: u8,
    pub distance_cm: u16,
}

/// Body the collector posts to the backend for every forwarded packet.
///
/// Distances are relayed raw, sentinels included; the backend decides what to do
/// with failed readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkRequest {
    pub mac_address: String,
    pub readings: Vec<UplinkReading>,
    pub sequence: u16,
    pub rssi: i8,
}

impl UplinkRequest {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

impl From<&TelemetryPacket> for UplinkRequest {
    fn from(packet: &TelemetryPacket) -> Self {
        Self {
            mac_address: packet.source.to_string(),
            readings: vec![UplinkReading {
                sensor_id: packet.channel,
                distance_cm: packet.distance,
            }],
            sequence: packet.sequence,
            rssi: packet.signal_strength,
        }
    }
}
