use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use super::{
    DEFAULT_ECHO_TIMEOUT_US, DistanceSource, MicrosClock, RangeFailure, SAMPLE_SETTLE_MS,
    SOUND_SPEED_CM_PER_US,
};

const TRIGGER_PULSE_US: u32 = 10;
const TRIGGER_LEAD_US: u32 = 2;
const CORRECTIVE_PULSE_US: u32 = 2;
const LAST_CHANCE_PULSE_US: u32 = 5;
const MAX_CORRECTIVE_PULSES: u8 = 3;
const STUCK_ECHO_GUARD_US: u64 = 10_000;
const STUCK_ECHO_POLL_US: u32 = 100;

/// Trigger/echo ultrasonic transducer (HC-SR04 style).
///
/// A measurement is a 10 µs trigger pulse followed by timing the width of the echo pulse.
/// Every wait is bounded by the configured echo timeout, so a disconnected or faulty
/// transducer costs at most two timeouts per reading.
pub struct RangeSensor<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    trigger: T,
    echo: E,
    delay: D,
    clock: C,
    echo_timeout_us: u32,
    ready: bool,
}

impl<T, E, D, C> RangeSensor<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    pub fn new(trigger: T, echo: E, delay: D, clock: C) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock,
            echo_timeout_us: DEFAULT_ECHO_TIMEOUT_US,
            ready: false,
        }
    }

    pub fn with_echo_timeout(mut self, timeout_us: u32) -> Self {
        self.echo_timeout_us = timeout_us;
        self
    }

    pub fn echo_timeout_us(&self) -> u32 {
        self.echo_timeout_us
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Drives the trigger line low and marks the transducer ready.
    pub fn init(&mut self) -> Result<(), RangeFailure> {
        self.set_trigger(false)?;
        self.delay.delay_ms(SAMPLE_SETTLE_MS);
        self.ready = true;

        log::info!(
            "Range sensor initialized (echo timeout {} us)",
            self.echo_timeout_us
        );
        Ok(())
    }

    /// Performs a single trigger/echo cycle and returns the distance in centimeters.
    pub fn measure(&mut self) -> Result<f32, RangeFailure> {
        if !self.ready {
            log::error!("Range sensor used before init");
            return Err(RangeFailure::NotInitialized);
        }

        self.set_trigger(false)?;
        self.delay.delay_us(10);

        self.clear_stuck_echo()?;
        self.pulse_trigger(TRIGGER_PULSE_US)?;

        let timeout_us = u64::from(self.echo_timeout_us);

        let wait_start = self.clock.now_us();
        while !self.echo_high()? {
            if self.clock.now_us().saturating_sub(wait_start) > timeout_us {
                log::warn!("Timeout waiting for echo to start");
                return Err(RangeFailure::NoEcho);
            }
        }

        let echo_start = self.clock.now_us();
        while self.echo_high()? {
            if self.clock.now_us().saturating_sub(echo_start) > timeout_us {
                log::warn!("Timeout waiting for echo to end");
                return Err(RangeFailure::EchoTooLong);
            }
        }

        let width_us = self.clock.now_us().saturating_sub(echo_start);
        let distance_cm = width_us as f32 * SOUND_SPEED_CM_PER_US / 2.0;

        log::trace!("Echo {} us -> {:.1} cm", width_us, distance_cm);
        Ok(distance_cm)
    }

    /// Averages up to `samples` readings, pausing between samples so echoes do not overlap.
    ///
    /// Failed samples are skipped; the call fails only if every sample failed.
    pub fn measure_avg(&mut self, samples: u8) -> Result<f32, RangeFailure> {
        let samples = samples.max(1);

        let mut total = 0.0f32;
        let mut valid = 0u8;
        let mut last_failure = RangeFailure::NoEcho;

        for i in 0..samples {
            match self.measure() {
                Ok(distance) => {
                    total += distance;
                    valid += 1;
                }
                Err(failure) => last_failure = failure,
            }

            if i + 1 < samples {
                self.delay.delay_ms(SAMPLE_SETTLE_MS);
            }
        }

        if valid == 0 {
            log::error!("All {} samples failed: {}", samples, last_failure);
            return Err(last_failure);
        }

        if valid < samples {
            log::debug!("{}/{} samples valid", valid, samples);
        }

        Ok(total / f32::from(valid))
    }

    /// Some transducers latch the echo line high after a missed reflection. Short trigger
    /// pulses usually release it; give up after the guard time and one last longer pulse.
    fn clear_stuck_echo(&mut self) -> Result<(), RangeFailure> {
        let started = self.clock.now_us();
        let mut pulses = 0u8;

        while self.echo_high()? {
            if self.clock.now_us().saturating_sub(started) > STUCK_ECHO_GUARD_US {
                log::warn!("Echo held high after {} corrective pulses", pulses);

                self.pulse_trigger(LAST_CHANCE_PULSE_US)?;
                self.delay.delay_us(STUCK_ECHO_POLL_US);

                if self.echo_high()? {
                    log::error!("Echo line stuck high, skipping reading");
                    return Err(RangeFailure::EchoStuck);
                }
                break;
            }

            if pulses < MAX_CORRECTIVE_PULSES {
                self.pulse_trigger(CORRECTIVE_PULSE_US)?;
                self.delay.delay_us(50);
                pulses += 1;
            }

            self.delay.delay_us(STUCK_ECHO_POLL_US);
        }

        Ok(())
    }

    fn pulse_trigger(&mut self, width_us: u32) -> Result<(), RangeFailure> {
        self.set_trigger(false)?;
        self.delay.delay_us(TRIGGER_LEAD_US);
        self.set_trigger(true)?;
        self.delay.delay_us(width_us);
        self.set_trigger(false)
    }

    fn set_trigger(&mut self, high: bool) -> Result<(), RangeFailure> {
        let result = if high {
            self.trigger.set_high()
        } else {
            self.trigger.set_low()
        };
        result.map_err(|_| RangeFailure::Pin)
    }

    fn echo_high(&mut self) -> Result<bool, RangeFailure> {
        self.echo.is_high().map_err(|_| RangeFailure::Pin)
    }
}

impl<T, E, D, C> DistanceSource for RangeSensor<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MicrosClock,
{
    fn measure_cm(&mut self) -> Result<f32, RangeFailure> {
        self.measure()
    }

    fn measure_avg_cm(&mut self, samples: u8) -> Result<f32, RangeFailure> {
        self.measure_avg(samples)
    }
}
