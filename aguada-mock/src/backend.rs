use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use aguada_api::{Distance, MacAddress, SequenceStatus, SequenceTracker, TelemetryPacket, UplinkRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;

use crate::errors::MockError;

/// Stand-in for the ingestion API: logs every reading and tracks packet loss.
#[derive(Clone, Default)]
pub struct BackendState {
    tracker: Arc<Mutex<SequenceTracker>>,
    uploads: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    pub uploads: u64,
    pub missing: u32,
}

impl BackendState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> BackendStats {
        BackendStats {
            uploads: self.uploads.load(Ordering::Relaxed),
            missing: self
                .tracker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .missing_total(),
        }
    }
}

pub fn router(state: BackendState) -> Router {
    Router::new()
        .route("/api/leituras/raw", post(ingest_reading))
        .route("/api/leituras/stats", get(get_stats))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: BackendState) -> Result<(), MockError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn ingest_reading(
    State(state): State<BackendState>,
    Json(request): Json<UplinkRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let source: MacAddress = request
        .mac_address
        .parse()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let now = OffsetDateTime::now_utc();
    let received_at = now.format(&Rfc3339).unwrap_or_else(|_| now.to_string());

    state.uploads.fetch_add(1, Ordering::Relaxed);

    for reading in &request.readings {
        let packet = TelemetryPacket::new(
            source,
            reading.sensor_id,
            Distance::from_raw(reading.distance_cm),
            request.sequence,
        )
        .with_signal_strength(request.rssi);

        let status = state
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(&packet);

        match status {
            SequenceStatus::Gap { missing } => {
                tracing::warn!(%source, channel = packet.channel, missing, "Sequence gap")
            }
            SequenceStatus::Duplicate => {
                tracing::warn!(%source, channel = packet.channel, sequence = packet.sequence, "Duplicate reading")
            }
            SequenceStatus::Restarted => {
                tracing::info!(%source, channel = packet.channel, "Node restarted its sequence")
            }
            SequenceStatus::First | SequenceStatus::InOrder => {}
        }

        match packet.distance() {
            Distance::Centimeters(cm) => tracing::info!(
                %source,
                channel = packet.channel,
                sequence = packet.sequence,
                rssi = packet.signal_strength,
                %received_at,
                "{} cm",
                cm
            ),
            Distance::SensorFailure => tracing::warn!(
                %source,
                channel = packet.channel,
                sequence = packet.sequence,
                %received_at,
                "Sensor failure reported"
            ),
            Distance::OutOfRange => tracing::warn!(
                %source,
                channel = packet.channel,
                sequence = packet.sequence,
                %received_at,
                "Reading out of range"
            ),
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "accepted": request.readings.len() })),
    ))
}

pub async fn get_stats(State(state): State<BackendState>) -> impl IntoResponse {
    Json(state.stats())
}
