use std::convert::Infallible;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use aguada_embedded::{MicrosClock, RangeSensor, SOUND_SPEED_CM_PER_US};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::errors::MockError;
use crate::settings::SimChannel;

/// Trigger pulses shorter than this are corrective pulses, not measurements.
const MEASURE_PULSE_NS: u64 = 10_000;
/// Time of flight before the echo line rises
const REFLECTION_DELAY_US: u64 = 200;

/// Water level as a fraction of the tank depth, following one fill/drain cycle.
pub fn simulated_level(cycle_fraction: f64) -> f64 {
    let radians = cycle_fraction * 2.0 * PI;

    // Keep the level between 10% and 90% full
    0.5 + 0.4 * radians.sin()
}

/// What the transducer answers to one trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Echo {
    Reflect { width_us: u64 },
    Silent,
    /// Echo line goes high and stays there until a short trigger pulse
    Latched,
}

pub struct TankModel {
    depth_cm: f64,
    offset_cm: f64,
    cycle: Duration,
    noise: Normal<f64>,
    dropout_rate: f64,
    latch_rate: f64,
    started: Instant,
    rng: StdRng,
}

impl TankModel {
    pub fn new(channel: &SimChannel, seed: u64) -> Result<Self, MockError> {
        if !channel.noise_cm.is_finite() || channel.noise_cm < 0.0 {
            return Err(MockError::NoiseLevel(channel.noise_cm));
        }

        Ok(Self {
            depth_cm: channel.tank_depth_cm,
            offset_cm: channel.sensor_offset_cm,
            cycle: Duration::from_secs(channel.cycle_secs.max(1)),
            noise: Normal::new(0.0, channel.noise_cm)?,
            dropout_rate: channel.dropout_rate,
            latch_rate: channel.latch_rate,
            started: Instant::now(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn cycle_fraction(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        (elapsed / self.cycle.as_secs_f64()).fract()
    }

    /// Distance from the transducer to the water surface right now.
    pub fn distance_cm(&mut self) -> f64 {
        let level = simulated_level(self.cycle_fraction()) * self.depth_cm;
        let distance = self.offset_cm + self.depth_cm - level + self.noise.sample(&mut self.rng);

        distance.max(0.0)
    }

    pub fn next_echo(&mut self) -> Echo {
        let roll: f64 = self.rng.random();

        if roll < self.dropout_rate {
            Echo::Silent
        } else if roll < self.dropout_rate + self.latch_rate {
            Echo::Latched
        } else {
            let distance = self.distance_cm();
            Echo::Reflect {
                width_us: (distance * 2.0 / f64::from(SOUND_SPEED_CM_PER_US)) as u64,
            }
        }
    }
}

/// Virtual transducer sharing one nanosecond clock with its delay and clock.
///
/// Time only moves when the driver waits or reads the clock, so a reading completes
/// instantly in wall time.
struct Bench {
    model: TankModel,
    now_ns: u64,
    window_us: Option<(u64, u64)>,
    latched: bool,
    trigger_high_since_ns: Option<u64>,
}

impl Bench {
    fn now_us(&self) -> u64 {
        self.now_ns / 1000
    }

    fn echo_level(&self) -> bool {
        let now = self.now_us();
        self.latched || matches!(self.window_us, Some((rise, fall)) if rise <= now && now < fall)
    }

    fn trigger_fell(&mut self, width_ns: u64) {
        if width_ns < MEASURE_PULSE_NS {
            if self.latched {
                tracing::trace!("Latched echo released");
                self.latched = false;
            }
            return;
        }

        let rise = self.now_us() + REFLECTION_DELAY_US;
        self.window_us = None;

        match self.model.next_echo() {
            Echo::Reflect { width_us } => self.window_us = Some((rise, rise + width_us)),
            Echo::Silent => tracing::trace!("Simulated echo dropout"),
            Echo::Latched => {
                tracing::trace!("Simulated echo latch");
                self.latched = true;
            }
        }
    }
}

#[derive(Clone)]
struct Shared(Arc<Mutex<Bench>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Bench> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SimTrigger(Shared);
pub struct SimEcho(Shared);
pub struct SimDelay(Shared);
pub struct SimClock(Shared);

impl ErrorType for SimTrigger {
    type Error = Infallible;
}

impl OutputPin for SimTrigger {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut bench = self.0.lock();
        if let Some(since) = bench.trigger_high_since_ns.take() {
            let width = bench.now_ns - since;
            bench.trigger_fell(width);
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut bench = self.0.lock();
        if bench.trigger_high_since_ns.is_none() {
            bench.trigger_high_since_ns = Some(bench.now_ns);
        }
        Ok(())
    }
}

impl ErrorType for SimEcho {
    type Error = Infallible;
}

impl InputPin for SimEcho {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.lock().echo_level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.lock().echo_level())
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.lock().now_ns += u64::from(ns);
    }
}

impl MicrosClock for SimClock {
    fn now_us(&self) -> u64 {
        // Every read costs a microsecond so busy-wait loops make progress
        let mut bench = self.0.lock();
        bench.now_ns += 1000;
        bench.now_us()
    }
}

pub type SimulatedSensor = RangeSensor<SimTrigger, SimEcho, SimDelay, SimClock>;

/// Wires a [`RangeSensor`] to a simulated transducer over `model`.
pub fn simulated_sensor(model: TankModel) -> SimulatedSensor {
    let shared = Shared(Arc::new(Mutex::new(Bench {
        model,
        now_ns: 0,
        window_us: None,
        latched: false,
        trigger_high_since_ns: None,
    })));

    RangeSensor::new(
        SimTrigger(shared.clone()),
        SimEcho(shared.clone()),
        SimDelay(shared.clone()),
        SimClock(shared),
    )
}
