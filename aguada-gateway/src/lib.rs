use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use aguada_embedded::{
    BackendForwarder, GatewayStats, IngestQueue, NetworkSupervisor, WifiController, pump_frames,
};
use embassy_time::Duration;
use tokio::task::JoinSet;

use crate::configs::{ControllerKind, Network, Settings};
use crate::errors::GatewayError;
use crate::network::{NmcliController, StaticController};
use crate::radio::UdpReceiver;
use crate::status::StatusReporter;
use crate::uplink::HttpUplink;

pub mod configs;
pub mod errors;
pub mod network;
pub mod radio;
pub mod status;
pub mod uplink;

const LISTENER_RESTART_DELAY: StdDuration = StdDuration::from_secs(1);

/// Running collector: radio listener, forwarding worker, network supervisor and status
/// reporter, all sharing one ingest queue and one set of counters.
///
/// Dropping the gateway aborts every task.
pub struct Gateway {
    stats: Arc<GatewayStats>,
    radio_addr: SocketAddr,
    tasks: JoinSet<()>,
}

impl Gateway {
    pub async fn start(settings: &Settings) -> Result<Self, GatewayError> {
        settings.validate()?;

        let stats = Arc::new(GatewayStats::new());
        let queue: Arc<IngestQueue> = Arc::new(IngestQueue::new(stats.clone()));

        let receiver = UdpReceiver::bind(&settings.radio).await?;
        let radio_addr = receiver.local_addr()?;

        tracing::info!(
            channel = settings.radio.channel,
            %radio_addr,
            "Listening for sensor frames"
        );

        let forwarder = BackendForwarder::new(
            HttpUplink::new(settings.backend.timeout())?,
            settings.backend.urls.clone(),
            stats.clone(),
        )?
        .with_timeout(Duration::from_secs(settings.backend.timeout_secs));

        let reporter = StatusReporter::new(
            stats.clone(),
            &settings.network.candidates,
            StdDuration::from_secs(settings.status.interval_secs),
        );

        let mut tasks = JoinSet::new();
        tasks.spawn(receive_frames(receiver, queue.clone()));
        tasks.spawn(forward_packets(forwarder, queue));
        tasks.spawn(reporter.run());

        let network = &settings.network;
        match network.controller {
            ControllerKind::Static => {
                tasks.spawn(supervise(supervisor(StaticController::new(), network, &stats)));
            }
            ControllerKind::Nmcli => {
                let ap_interface = network
                    .access_point
                    .as_ref()
                    .and_then(|ap| ap.interface.clone());
                let controller = NmcliController::new(network.interface.clone(), ap_interface);
                tasks.spawn(supervise(supervisor(controller, network, &stats)));
            }
        }

        Ok(Self {
            stats,
            radio_addr,
            tasks,
        })
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    pub fn radio_addr(&self) -> SocketAddr {
        self.radio_addr
    }

    /// Resolves as soon as any gateway task stops.
    pub async fn wait(&mut self) {
        if let Some(Err(e)) = self.tasks.join_next().await {
            tracing::error!("Gateway task failed: {}", e);
        }
    }
}

pub async fn run(settings: &Arc<Settings>) -> Result<(), GatewayError> {
    let mut gateway = Gateway::start(settings).await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down");
        }
        _ = gateway.wait() => {
            tracing::error!("Gateway task stopped unexpectedly");
        }
    }

    Ok(())
}

fn supervisor<W: WifiController>(
    controller: W,
    network: &Network,
    stats: &Arc<GatewayStats>,
) -> NetworkSupervisor<W> {
    let supervisor = NetworkSupervisor::new(controller, network.candidates.clone(), stats.clone())
        .with_association_timeout(Duration::from_secs(network.association_timeout_secs))
        .with_retry_interval(Duration::from_secs(network.retry_interval_secs));

    match &network.access_point {
        Some(ap) => supervisor.with_access_point(ap.ssid.clone(), ap.password.clone()),
        None => supervisor,
    }
}

async fn supervise<W: WifiController>(mut supervisor: NetworkSupervisor<W>) {
    supervisor.run().await
}

async fn receive_frames(mut receiver: UdpReceiver, queue: Arc<IngestQueue>) {
    loop {
        let e = pump_frames(&mut receiver, queue.as_ref()).await;
        tracing::error!("Radio listener stopped: {}", e);
        tokio::time::sleep(LISTENER_RESTART_DELAY).await;
    }
}

async fn forward_packets(mut forwarder: BackendForwarder<HttpUplink>, queue: Arc<IngestQueue>) {
    forwarder.run(&queue).await
}
