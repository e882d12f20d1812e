use std::net::SocketAddr;
use std::sync::Arc;

use aguada_api::MacAddress;
use aguada_embedded::{ChannelConfig, MeasurementAgent};
use embassy_time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::backend::BackendState;
use crate::errors::MockError;
use crate::radio::UdpRadio;
use crate::settings::{Node, Settings};
use crate::simulate::{SimulatedSensor, TankModel, simulated_sensor};

pub mod backend;
pub mod errors;
pub mod radio;
pub mod settings;
pub mod simulate;

pub type MockAgent = MeasurementAgent<SimulatedSensor, UdpRadio>;

/// Runs the simulated backend and one measurement agent per configured node until
/// interrupted.
pub async fn run(settings: &Arc<Settings>) -> Result<(), MockError> {
    let mut tasks = JoinSet::new();

    if settings.backend.enabled {
        let listener =
            TcpListener::bind((settings.backend.host.as_str(), settings.backend.port)).await?;
        tracing::info!("Mock backend listening on http://{}", listener.local_addr()?);

        tasks.spawn(async move {
            if let Err(e) = backend::serve(listener, BackendState::new()).await {
                tracing::error!("Mock backend stopped: {}", e);
            }
        });
    }

    let target = settings.radio.target_addr()?;

    for (index, node) in settings.nodes.iter().enumerate() {
        let agent = build_agent(node, index as u64, target).await?;
        tracing::info!(
            node = %node.name,
            address = %agent.address(),
            channels = agent.channel_count(),
            %target,
            "Mock node ready"
        );

        tasks.spawn(run_agent(agent));
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down mock nodes");
        }
        Some(result) = tasks.join_next() => {
            if let Err(e) = result {
                tracing::error!("Mock task failed: {}", e);
            }
        }
    }

    Ok(())
}

/// Builds a node whose channels read simulated tanks and broadcast to `target`.
pub async fn build_agent(
    node: &Node,
    seed: u64,
    target: SocketAddr,
) -> Result<MockAgent, MockError> {
    let address: MacAddress = node.mac.parse()?;
    let radio = UdpRadio::bind(target).await?;

    let mut agent =
        MeasurementAgent::new(address, radio).with_interval(Duration::from_secs(node.interval_secs));

    for (index, channel) in node.channels.iter().enumerate() {
        let model = TankModel::new(channel, (seed << 8) | index as u64)?;
        let mut sensor = simulated_sensor(model);
        sensor.init()?;

        let config = ChannelConfig::new(channel.channel)
            .with_samples(channel.samples)
            .with_valid_range(channel.valid_min_cm, channel.valid_max_cm);

        agent.add_channel(config, sensor)?;
    }

    Ok(agent)
}

async fn run_agent(mut agent: MockAgent) {
    agent.run().await
}
