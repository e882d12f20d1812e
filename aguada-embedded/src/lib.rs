#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod agent;
pub mod error;
pub mod forwarder;
pub mod ingest;
pub mod network;
pub mod radio;
pub mod sensor;
pub mod stats;

pub use agent::*;
pub use error::*;
pub use forwarder::*;
pub use ingest::*;
pub use network::*;
pub use radio::*;
pub use sensor::*;
pub use stats::*;
