#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod packet;
pub mod radio;
pub mod sequence;
pub mod uplink;

pub use error::PacketError;
pub use packet::{Distance, MacAddress, PACKET_SIZE, TelemetryPacket};
pub use sequence::{SequenceStatus, SequenceTracker};
pub use uplink::{UplinkReading, UplinkRequest};
