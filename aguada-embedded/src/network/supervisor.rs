use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use embassy_time::{Duration, Instant, Timer, with_timeout};

use crate::stats::GatewayStats;

use super::{NetworkCandidate, WifiController};

pub const ASSOCIATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);
pub const LINK_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// Association attempt in progress for the candidate at this index
    Connecting(usize),
    /// Associated with the candidate at this index
    Connected(usize),
    /// Every candidate failed in the last pass
    AllFailed,
}

#[derive(Debug, Clone)]
struct AccessPoint {
    ssid: String,
    password: String,
}

/// Keeps the gateway's station link up by walking an ordered candidate list.
///
/// Each pass starts at the first candidate and stops at the first successful association.
/// A lost link restarts the pass from the top. When every candidate fails the supervisor
/// waits for the retry interval before the next pass. The local access point is started
/// once and left running in every state so sensor nodes can always reach the gateway.
pub struct NetworkSupervisor<W: WifiController> {
    controller: W,
    candidates: Vec<NetworkCandidate>,
    access_point: Option<AccessPoint>,
    ap_active: bool,
    state: LinkState,
    state_start_time: Instant,
    stats: Arc<GatewayStats>,
    association_timeout: Duration,
    retry_interval: Duration,
    poll_interval: Duration,
}

impl<W: WifiController> NetworkSupervisor<W> {
    pub fn new(controller: W, candidates: Vec<NetworkCandidate>, stats: Arc<GatewayStats>) -> Self {
        Self {
            controller,
            candidates,
            access_point: None,
            ap_active: false,
            state: LinkState::Disconnected,
            state_start_time: Instant::now(),
            stats,
            association_timeout: ASSOCIATION_TIMEOUT,
            retry_interval: RETRY_INTERVAL,
            poll_interval: LINK_POLL_INTERVAL,
        }
    }

    pub fn with_access_point(mut self, ssid: impl Into<String>, password: impl Into<String>) -> Self {
        self.access_point = Some(AccessPoint {
            ssid: ssid.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_association_timeout(mut self, timeout: Duration) -> Self {
        self.association_timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn candidates(&self) -> &[NetworkCandidate] {
        &self.candidates
    }

    /// Candidate currently being tried or in use.
    pub fn current_candidate(&self) -> Option<&NetworkCandidate> {
        match self.state {
            LinkState::Connecting(index) | LinkState::Connected(index) => {
                self.candidates.get(index)
            }
            LinkState::Disconnected | LinkState::AllFailed => None,
        }
    }

    pub fn is_uplink_ready(&self) -> bool {
        matches!(self.state, LinkState::Connected(_))
    }

    pub fn is_ap_active(&self) -> bool {
        self.ap_active
    }

    /// Advances the state machine by one step and returns the resulting state.
    pub async fn tick(&mut self) -> LinkState {
        match self.state {
            LinkState::Disconnected => {
                self.ensure_access_point().await;

                if self.candidates.is_empty() {
                    log::warn!("No upstream networks configured");
                    self.transition_to(LinkState::AllFailed);
                } else {
                    self.transition_to(LinkState::Connecting(0));
                }
            }
            LinkState::Connecting(index) => {
                if self.attempt_association(index).await {
                    self.stats.set_connected(index);
                    self.transition_to(LinkState::Connected(index));
                } else if index + 1 < self.candidates.len() {
                    self.transition_to(LinkState::Connecting(index + 1));
                } else {
                    log::error!(
                        "All {} networks failed, retrying in {} s",
                        self.candidates.len(),
                        self.retry_interval.as_secs()
                    );
                    self.transition_to(LinkState::AllFailed);
                }
            }
            LinkState::Connected(index) => {
                if self.controller.is_connected() {
                    Timer::after(self.poll_interval).await;
                } else {
                    let ssid = self.candidates.get(index).map(|c| c.ssid.as_str());
                    log::warn!("Lost connection to {:?}", ssid);
                    self.stats.mark_offline();
                    self.transition_to(LinkState::Disconnected);
                }
            }
            LinkState::AllFailed => {
                let elapsed = Instant::now().saturating_duration_since(self.state_start_time);

                if elapsed >= self.retry_interval {
                    self.transition_to(LinkState::Disconnected);
                } else {
                    let remaining = self.retry_interval - elapsed;
                    Timer::after(remaining.min(self.poll_interval)).await;
                }
            }
        }

        self.state
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.tick().await;
        }
    }

    async fn ensure_access_point(&mut self) {
        if self.ap_active {
            return;
        }

        let Some(ap) = self.access_point.as_ref() else {
            return;
        };

        match self.controller.start_ap(&ap.ssid, &ap.password).await {
            Ok(()) => {
                log::info!("Access point {} started", ap.ssid);
                self.ap_active = true;
            }
            Err(e) => log::warn!("Failed to start access point {}: {:?}", ap.ssid, e),
        }
    }

    async fn attempt_association(&mut self, index: usize) -> bool {
        let Some(candidate) = self.candidates.get(index) else {
            return false;
        };

        log::info!(
            "Connecting to {} ({}/{})",
            candidate.ssid,
            index + 1,
            self.candidates.len()
        );

        if let Err(e) = self.controller.disconnect().await {
            log::debug!("Disconnect before association failed: {:?}", e);
        }

        let attempt = self.controller.connect_station(
            &candidate.ssid,
            &candidate.password,
            candidate.auth_mode(),
        );

        let result = with_timeout(self.association_timeout, attempt).await;

        match result {
            Ok(Ok(())) => {
                log::info!("Connected to {}", candidate.ssid);
                true
            }
            Ok(Err(e)) => {
                log::warn!("Connection to {} failed: {:?}", candidate.ssid, e);
                false
            }
            Err(_) => {
                log::warn!(
                    "Connection to {} timed out after {} ms",
                    candidate.ssid,
                    self.association_timeout.as_millis()
                );
                if let Err(e) = self.controller.disconnect().await {
                    log::debug!("Disconnect after timeout failed: {:?}", e);
                }
                false
            }
        }
    }

    fn transition_to(&mut self, new_state: LinkState) {
        log::debug!("Link state transition: {:?} -> {:?}", self.state, new_state);
        self.state = new_state;
        self.state_start_time = Instant::now();
    }
}
