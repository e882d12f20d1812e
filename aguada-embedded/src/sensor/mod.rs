mod range_sensor;

pub use range_sensor::*;

use core::fmt;

/// Speed of sound in air at ~20 ℃ (cm/µs)
pub const SOUND_SPEED_CM_PER_US: f32 = 0.0343;
/// Longest echo the transducer can report (~6.5 m round trip)
pub const DEFAULT_ECHO_TIMEOUT_US: u32 = 38_000;
/// Settling time between two consecutive samples of an averaged reading
pub const SAMPLE_SETTLE_MS: u32 = 60;

/// Free-running microsecond counter used to time echo pulses.
pub trait MicrosClock {
    fn now_us(&self) -> u64;
}

/// Clock backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl MicrosClock for EmbassyClock {
    fn now_us(&self) -> u64 {
        embassy_time::Instant::now().as_micros()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFailure {
    /// `measure` called before `init`
    NotInitialized,
    /// Echo line held high and could not be cleared before triggering
    EchoStuck,
    /// Echo never rose after the trigger pulse
    NoEcho,
    /// Echo rose but never fell within the timeout
    EchoTooLong,
    /// GPIO driver reported an error
    Pin,
}

impl fmt::Display for RangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "Sensor not initialized"),
            Self::EchoStuck => write!(f, "Echo line stuck high"),
            Self::NoEcho => write!(f, "Timeout waiting for echo"),
            Self::EchoTooLong => write!(f, "Timeout waiting for echo to end"),
            Self::Pin => write!(f, "GPIO error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RangeFailure {}

/// Anything that can produce a distance reading in centimeters.
pub trait DistanceSource {
    fn measure_cm(&mut self) -> Result<f32, RangeFailure>;

    /// Averages `samples` readings, failing only when all of them fail.
    fn measure_avg_cm(&mut self, samples: u8) -> Result<f32, RangeFailure>;
}

/// Inclusive range check applied before a reading is reported.
pub fn is_valid_distance(distance_cm: f32, min_cm: f32, max_cm: f32) -> bool {
    distance_cm >= min_cm && distance_cm <= max_cm
}
