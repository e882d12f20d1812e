use std::sync::{Arc, Mutex};
use std::time::Duration;

use aguada_gateway::configs::settings::{Backend, Logger, Network, Radio, Settings, Status};
use aguada_gateway::configs::ControllerKind;
use aguada_embedded::NetworkCandidate;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct BackendState {
    status: StatusCode,
    received: Arc<Mutex<Vec<Value>>>,
}

/// Throw-away HTTP backend answering every upload with a fixed status.
pub struct MockBackend {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start(status: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/api/leituras/raw", post(upload))
            .with_state(BackendState {
                status,
                received: received.clone(),
            });

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{address}/api/leituras/raw"),
            received,
            handle,
        }
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Polls until at least `count` uploads arrived or the deadline passes.
    pub async fn wait_for(&self, count: usize) -> Vec<Value> {
        for _ in 0..250 {
            if self.received.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.received()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn upload(State(state): State<BackendState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.received.lock().unwrap().push(body);
    (state.status, Json(json!({ "status": "ok" })))
}

pub fn test_settings(urls: Vec<String>) -> Settings {
    Settings {
        logger: Logger {
            level: "debug".into(),
        },
        radio: Radio {
            channel: 11,
            bind_host: "127.0.0.1".into(),
            base_port: 47000,
            port: Some(0),
        },
        network: Network {
            controller: ControllerKind::Static,
            interface: "eth0".into(),
            access_point: None,
            candidates: vec![NetworkCandidate::new("wired", "")],
            association_timeout_secs: 1,
            retry_interval_secs: 1,
        },
        backend: Backend {
            urls,
            timeout_secs: 2,
        },
        status: Status { interval_secs: 30 },
    }
}

/// Polls `check` every 20 ms for up to five seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
