use aguada_api::{Distance, MacAddress, TelemetryPacket};
use aguada_gateway::Gateway;
use axum::http::StatusCode;
use serde_json::json;
use tokio::net::UdpSocket;

mod common;
use common::{MockBackend, eventually, test_settings};

const NODE: MacAddress = MacAddress([0x20, 0x6E, 0xF1, 0x6B, 0x77, 0x58]);

async fn send_frames(gateway: &Gateway, frames: &[&[u8]]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for frame in frames {
        socket.send_to(frame, gateway.radio_addr()).await.unwrap();
    }
}

fn frame(channel: u8, distance: Distance, sequence: u16) -> [u8; 12] {
    TelemetryPacket::new(NODE, channel, distance, sequence).encode()
}

#[tokio::test]
async fn test_forwards_frames_to_backend() {
    let backend = MockBackend::start(StatusCode::CREATED).await;
    let gateway = Gateway::start(&test_settings(vec![backend.url.clone()]))
        .await
        .unwrap();

    send_frames(
        &gateway,
        &[
            &frame(1, Distance::Centimeters(187), 42),
            &frame(2, Distance::SensorFailure, 43),
            &frame(1, Distance::OutOfRange, 44),
        ],
    )
    .await;

    let received = backend.wait_for(3).await;
    assert_eq!(received.len(), 3);
    assert_eq!(
        received[0],
        json!({
            "mac_address": "20:6E:F1:6B:77:58",
            "readings": [{ "sensor_id": 1, "distance_cm": 187 }],
            "sequence": 42,
            "rssi": 0
        })
    );
    assert_eq!(received[1]["readings"][0]["distance_cm"], json!(65535));
    assert_eq!(received[2]["readings"][0]["distance_cm"], json!(65534));

    let stats = gateway.stats().clone();
    assert!(eventually(|| stats.snapshot().packets_tx == 3).await);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.packets_rx, 3);
    assert_eq!(snapshot.errors, 0);
    assert!(snapshot.backend_available);
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let backend = MockBackend::start(StatusCode::CREATED).await;
    let gateway = Gateway::start(&test_settings(vec![backend.url.clone()]))
        .await
        .unwrap();

    let valid = frame(1, Distance::Centimeters(120), 7);
    let mut long = [0u8; 13];
    long[..12].copy_from_slice(&valid);

    send_frames(&gateway, &[&valid[..11], &long, &valid]).await;

    let received = backend.wait_for(1).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["sequence"], json!(7));

    let stats = gateway.stats().clone();
    assert!(eventually(|| stats.snapshot().packets_tx == 1).await);
    assert_eq!(stats.snapshot().errors, 2);
    assert_eq!(stats.snapshot().packets_rx, 1);
}

#[tokio::test]
async fn test_rejected_upload_is_not_retried() {
    let backend = MockBackend::start(StatusCode::INTERNAL_SERVER_ERROR).await;
    let gateway = Gateway::start(&test_settings(vec![backend.url.clone()]))
        .await
        .unwrap();

    send_frames(&gateway, &[&frame(1, Distance::Centimeters(99), 1)]).await;

    let stats = gateway.stats().clone();
    assert!(eventually(|| stats.snapshot().errors == 1).await);

    // Give a retry the chance to show up
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(backend.received().len(), 1);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.packets_tx, 0);
    assert!(!snapshot.backend_available);
}

#[tokio::test]
async fn test_failed_backend_hands_over_to_next_url() {
    let backend = MockBackend::start(StatusCode::CREATED).await;

    // Nothing listens on the discard port
    let unreachable = String::from("http://127.0.0.1:9/api/leituras/raw");
    let gateway = Gateway::start(&test_settings(vec![unreachable, backend.url.clone()]))
        .await
        .unwrap();

    send_frames(&gateway, &[&frame(1, Distance::Centimeters(150), 10)]).await;

    let stats = gateway.stats().clone();
    assert!(eventually(|| stats.snapshot().errors == 1).await);

    send_frames(&gateway, &[&frame(1, Distance::Centimeters(151), 11)]).await;

    let received = backend.wait_for(1).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["sequence"], json!(11));
    assert!(eventually(|| stats.snapshot().packets_tx == 1).await);
}

#[tokio::test]
async fn test_static_uplink_reports_link_ready() {
    let backend = MockBackend::start(StatusCode::CREATED).await;
    let gateway = Gateway::start(&test_settings(vec![backend.url.clone()]))
        .await
        .unwrap();

    let stats = gateway.stats().clone();
    assert!(eventually(|| stats.snapshot().link_ready).await);
    assert_eq!(stats.snapshot().active_network, Some(0));
}
