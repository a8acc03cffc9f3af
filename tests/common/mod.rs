//! Shared helpers for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use navisafe::api::{self, AppState};
use navisafe::config::Config;
use navisafe::hazard::{BlackSpot, RiskLevel};
use navisafe::safety::DEFAULT_RESOLUTION;
use navisafe::store::BlackSpotStore;

pub fn black_spot(id: &str, lat: f64, lon: f64, risk: RiskLevel) -> BlackSpot {
    BlackSpot {
        id: id.to_string(),
        lat,
        lon,
        risk,
        description: format!("{} reported hazard", id),
        reported_at: Utc::now(),
        reporter: None,
    }
}

/// Config with no persistence and no briefing key.
pub fn offline_config() -> Config {
    let mut config = Config::default();
    config.store.path = None;
    config.briefing.api_key = None;
    config
}

pub fn app_with(config: Config, spots: Vec<BlackSpot>) -> Router {
    let store = BlackSpotStore::in_memory(spots, DEFAULT_RESOLUTION).unwrap();
    let state = AppState::with_store(config, store).unwrap();
    api::router(Arc::new(state))
}

/// Serve `app` on an ephemeral local port, returning its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
