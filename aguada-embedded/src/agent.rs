use core::sync::atomic::{AtomicU32, Ordering};

use alloc::sync::Arc;
use alloc::vec::Vec;

use aguada_api::{Distance, MacAddress, TelemetryPacket};
use embassy_time::{Duration, Timer};

use crate::error::{Error, Result};
use crate::radio::RadioLink;
use crate::sensor::{DistanceSource, RangeFailure, is_valid_distance};

pub const MEASUREMENT_INTERVAL: Duration = Duration::from_secs(30);
pub const INTER_CHANNEL_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_SAMPLES: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    /// Sensor channel id carried in every packet
    pub channel: u8,
    /// Samples averaged per reading
    pub samples: u8,
    /// Inclusive (min, max) window in cm; readings outside are reported as out of range
    pub valid_range_cm: Option<(f32, f32)>,
}

impl ChannelConfig {
    pub fn new(channel: u8) -> Self {
        Self {
            channel,
            samples: DEFAULT_SAMPLES,
            valid_range_cm: None,
        }
    }

    pub fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_valid_range(mut self, min_cm: f32, max_cm: f32) -> Self {
        self.valid_range_cm = Some((min_cm, max_cm));
        self
    }

    /// Maps a raw reading onto the value reported over the air.
    pub fn classify(&self, reading: core::result::Result<f32, RangeFailure>) -> Distance {
        match reading {
            Err(_) => Distance::SensorFailure,
            Ok(cm) => match self.valid_range_cm {
                Some((min, max)) if !is_valid_distance(cm, min, max) => Distance::OutOfRange,
                // Truncation, not rounding
                _ => Distance::Centimeters(cm as u16),
            },
        }
    }
}

struct SensorChannel<S> {
    config: ChannelConfig,
    sensor: S,
    next_sequence: u16,
}

#[derive(Debug, Default)]
pub struct AgentStats {
    measurements: AtomicU32,
    errors: AtomicU32,
    send_success: AtomicU32,
    send_fail: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgentSnapshot {
    pub measurements: u32,
    pub errors: u32,
    pub send_success: u32,
    pub send_fail: u32,
}

impl AgentStats {
    /// Send-completion hook; drivers that learn the outcome asynchronously call this.
    pub fn record_send(&self, delivered: bool) {
        let counter = if delivered {
            &self.send_success
        } else {
            &self.send_fail
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_measurement(&self, distance: Distance) {
        self.measurements.fetch_add(1, Ordering::Relaxed);
        if !distance.is_valid() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            measurements: self.measurements.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            send_success: self.send_success.load(Ordering::Relaxed),
            send_fail: self.send_fail.load(Ordering::Relaxed),
        }
    }
}

/// Periodically samples every configured sensor channel and broadcasts one packet per
/// channel.
///
/// Sequence numbers are kept per channel, start at 0 and advance once per cycle whether
/// or not the reading or the transmission succeeded, so gaps seen by the collector are
/// exactly the lost packets.
pub struct MeasurementAgent<S: DistanceSource, R: RadioLink> {
    address: MacAddress,
    radio: R,
    channels: Vec<SensorChannel<S>>,
    stats: Arc<AgentStats>,
    interval: Duration,
    inter_channel_delay: Duration,
}

impl<S: DistanceSource, R: RadioLink> MeasurementAgent<S, R> {
    pub fn new(address: MacAddress, radio: R) -> Self {
        Self {
            address,
            radio,
            channels: Vec::new(),
            stats: Arc::new(AgentStats::default()),
            interval: MEASUREMENT_INTERVAL,
            inter_channel_delay: INTER_CHANNEL_DELAY,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_inter_channel_delay(mut self, delay: Duration) -> Self {
        self.inter_channel_delay = delay;
        self
    }

    pub fn add_channel(&mut self, config: ChannelConfig, sensor: S) -> Result<()> {
        if self.channels.iter().any(|c| c.config.channel == config.channel) {
            log::error!("Channel {} configured twice", config.channel);
            return Err(Error::InvalidConfig);
        }
        if let Some((min, max)) = config.valid_range_cm {
            if !(min <= max) {
                log::error!("Channel {} has an empty valid range", config.channel);
                return Err(Error::InvalidConfig);
            }
        }

        self.channels.push(SensorChannel {
            config,
            sensor,
            next_sequence: 0,
        });
        Ok(())
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn stats(&self) -> Arc<AgentStats> {
        self.stats.clone()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn next_sequence(&self, channel: u8) -> Option<u16> {
        self.channels
            .iter()
            .find(|c| c.config.channel == channel)
            .map(|c| c.next_sequence)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Runs one measurement cycle over all channels and returns the packets it sent.
    pub async fn run_cycle(&mut self) -> Vec<TelemetryPacket> {
        let mut sent = Vec::with_capacity(self.channels.len());

        for index in 0..self.channels.len() {
            if index > 0 {
                Timer::after(self.inter_channel_delay).await;
            }

            let packet = self.sample_channel(index);

            match self
                .radio
                .send(MacAddress::BROADCAST, &packet.encode())
                .await
            {
                Ok(()) => self.stats.record_send(true),
                Err(e) => {
                    log::warn!("Channel {} send failed: {:?}", packet.channel, e);
                    self.stats.record_send(false);
                }
            }

            sent.push(packet);
        }

        sent
    }

    pub async fn run(&mut self) -> ! {
        log::info!(
            "Measurement agent {} started with {} channel(s), interval {} s",
            self.address,
            self.channels.len(),
            self.interval.as_secs()
        );

        loop {
            self.run_cycle().await;
            Timer::after(self.interval).await;
        }
    }

    fn sample_channel(&mut self, index: usize) -> TelemetryPacket {
        let address = self.address;
        let channel = &mut self.channels[index];

        let reading = channel.sensor.measure_avg_cm(channel.config.samples);
        let distance = channel.config.classify(reading);

        match (reading, distance) {
            (Err(e), _) => log::warn!("Channel {} read failed: {}", channel.config.channel, e),
            (Ok(cm), Distance::OutOfRange) => {
                log::warn!("Channel {} reading {:.1} cm out of range", channel.config.channel, cm)
            }
            (Ok(cm), _) => log::info!("Channel {}: {:.1} cm", channel.config.channel, cm),
        }

        let sequence = channel.next_sequence;
        channel.next_sequence = sequence.wrapping_add(1);
        self.stats.record_measurement(distance);

        TelemetryPacket::new(address, channel.config.channel, distance, sequence)
    }
}
