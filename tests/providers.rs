//! Upstream adapters and the full planning flow against local stand-in services.

mod common;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use navisafe::briefing::{Briefer, BriefingSource};
use navisafe::config::{BriefingConfig, Config, GeocoderConfig, RoutingConfig};
use navisafe::geocoder::Geocoder;
use navisafe::geometry::{Coordinate, GeoJsonLineString};
use navisafe::hazard::RiskLevel;
use navisafe::routing::{RouteProvider, TravelMode};
use navisafe::scoring::{DetectedHazard, RouteAssessment};
use navisafe::NaviError;

// --- Stand-in services ---

async fn nominatim(
    State(hits): State<Arc<AtomicUsize>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    match params.get("q").map(String::as_str) {
        Some("Patiala Bus Stand") => Json(json!([
            { "lat": "30.33", "lon": "76.38", "display_name": "Bus Stand, Patiala" }
        ])),
        Some("Rajpura Road") => Json(json!([
            { "lat": "30.35", "lon": "76.38", "display_name": "Rajpura Road, Patiala" }
        ])),
        _ => Json(json!([])),
    }
}

async fn osrm(Path((profile, coords)): Path<(String, String)>) -> (StatusCode, Json<Value>) {
    if profile == "cycling" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": "NoRoute", "message": "Impossible route" })),
        );
    }

    let stops: Vec<[f64; 2]> = coords
        .split(';')
        .map(|pair| {
            let mut parts = pair.split(',').map(|v| v.parse::<f64>().unwrap());
            [parts.next().unwrap(), parts.next().unwrap()]
        })
        .collect();

    // With waypoints, echo the stops back as a single route
    if stops.len() > 2 {
        return (
            StatusCode::OK,
            Json(json!({ "code": "Ok", "routes": [
                { "distance": 2500.0, "duration": 360.0,
                  "geometry": { "type": "LineString", "coordinates": stops } }
            ]})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({ "code": "Ok", "routes": [
            { "distance": 2224.0, "duration": 300.0,
              "geometry": { "type": "LineString",
                            "coordinates": [[76.38, 30.33], [76.38, 30.35]] } },
            { "distance": 4400.0, "duration": 400.0,
              "geometry": { "type": "LineString",
                            "coordinates": [[76.38, 30.33], [76.40, 30.34], [76.38, 30.35]] } }
        ]})),
    )
}

async fn gemini(
    Path(call): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert!(call.ends_with(":generateContent"));
    assert!(body["contents"][0]["parts"][0]["text"].is_string());

    match params.get("key").map(String::as_str) {
        Some("good") => (
            StatusCode::OK,
            Json(json!({ "candidates": [
                { "content": { "parts": [{ "text": "Slow down near the canal bridge." }] } }
            ]})),
        ),
        Some("empty") => (StatusCode::OK, Json(json!({ "candidates": [] }))),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "quota exceeded" })),
        ),
    }
}

struct Upstreams {
    geocoder: String,
    router: String,
    model: String,
    geocoder_hits: Arc<AtomicUsize>,
}

async fn spawn_upstreams() -> Upstreams {
    let geocoder_hits = Arc::new(AtomicUsize::new(0));
    let geocoder = spawn_server(
        Router::new()
            .route("/search", get(nominatim))
            .with_state(geocoder_hits.clone()),
    )
    .await;
    let router = spawn_server(Router::new().route("/route/v1/:profile/:coords", get(osrm))).await;
    let model = spawn_server(Router::new().route("/v1beta/models/:call", post(gemini))).await;

    Upstreams {
        geocoder,
        router,
        model,
        geocoder_hits,
    }
}

fn config_for(upstreams: &Upstreams, api_key: Option<&str>) -> Config {
    let mut config = offline_config();
    config.geocoder.base_url = upstreams.geocoder.clone();
    config.routing.base_url = upstreams.router.clone();
    config.briefing.base_url = upstreams.model.clone();
    config.briefing.api_key = api_key.map(str::to_string);
    config
}

fn briefed_route() -> RouteAssessment {
    RouteAssessment {
        provider_index: 0,
        recommended: true,
        distance_m: 2224.0,
        duration_s: 300.0,
        risk_score: 10,
        exposure: 10.0,
        hazards: vec![DetectedHazard {
            id: "bridge".into(),
            lat: 30.34,
            lon: 76.3805,
            risk: RiskLevel::High,
            description: "Blind curve at the canal bridge".into(),
            distance_m: 48.0,
            along_route_m: 1100.0,
        }],
        geometry: GeoJsonLineString::from_coordinates(&[]),
    }
}

// --- Geocoder ---

#[tokio::test]
async fn test_geocoder_lookup_and_cache() {
    let upstreams = spawn_upstreams().await;
    let geocoder = Geocoder::new(&GeocoderConfig {
        base_url: upstreams.geocoder.clone(),
        ..GeocoderConfig::default()
    })
    .unwrap();

    let place = geocoder.lookup("Patiala Bus Stand").await.unwrap();
    assert_eq!(place.name, "Bus Stand, Patiala");
    assert_eq!(place.coordinate(), Coordinate::new(30.33, 76.38));

    let again = geocoder.lookup("  patiala bus stand ").await.unwrap();
    assert_eq!(again, place);
    assert_eq!(upstreams.geocoder_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_geocoder_not_found() {
    let upstreams = spawn_upstreams().await;
    let geocoder = Geocoder::new(&GeocoderConfig {
        base_url: upstreams.geocoder.clone(),
        ..GeocoderConfig::default()
    })
    .unwrap();

    let err = geocoder.lookup("Atlantis").await.unwrap_err();
    assert!(matches!(err, NaviError::PlaceNotFound(ref q) if q == "Atlantis"));
}

#[tokio::test]
async fn test_geocoder_unreachable() {
    let geocoder = Geocoder::new(&GeocoderConfig {
        base_url: "http://127.0.0.1:1".into(),
        timeout_secs: 2,
        ..GeocoderConfig::default()
    })
    .unwrap();

    let err = geocoder.lookup("Patiala").await.unwrap_err();
    assert!(matches!(err, NaviError::Http(_)));
}

// --- Routing ---

#[tokio::test]
async fn test_routes_alternatives() {
    let upstreams = spawn_upstreams().await;
    let provider = RouteProvider::new(&RoutingConfig {
        base_url: upstreams.router.clone(),
        ..RoutingConfig::default()
    })
    .unwrap();

    let routes = provider
        .routes(
            Coordinate::new(30.33, 76.38),
            &[],
            Coordinate::new(30.35, 76.38),
            TravelMode::Driving,
        )
        .await
        .unwrap();

    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0].duration_s, 300.0);
    assert_eq!(routes[1].geometry[1], Coordinate::new(30.34, 76.40));
}

#[tokio::test]
async fn test_routes_pass_waypoints_in_order() {
    let upstreams = spawn_upstreams().await;
    let provider = RouteProvider::new(&RoutingConfig {
        base_url: upstreams.router.clone(),
        ..RoutingConfig::default()
    })
    .unwrap();

    let via = [Coordinate::new(30.34, 76.39)];
    let routes = provider
        .routes(
            Coordinate::new(30.33, 76.38),
            &via,
            Coordinate::new(30.35, 76.38),
            TravelMode::Driving,
        )
        .await
        .unwrap();

    assert_eq!(routes.len(), 1);
    assert_eq!(
        routes[0].geometry,
        vec![
            Coordinate::new(30.33, 76.38),
            Coordinate::new(30.34, 76.39),
            Coordinate::new(30.35, 76.38),
        ]
    );
}

#[tokio::test]
async fn test_routes_no_route() {
    let upstreams = spawn_upstreams().await;
    let provider = RouteProvider::new(&RoutingConfig {
        base_url: upstreams.router.clone(),
        ..RoutingConfig::default()
    })
    .unwrap();

    let err = provider
        .routes(
            Coordinate::new(30.33, 76.38),
            &[],
            Coordinate::new(30.35, 76.38),
            TravelMode::Cycling,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NaviError::NoRoute(ref m) if m.contains("Impossible route")));
}

#[tokio::test]
async fn test_routes_reject_bad_waypoint() {
    let provider = RouteProvider::new(&RoutingConfig::default()).unwrap();
    let err = provider
        .routes(
            Coordinate::new(30.33, 76.38),
            &[Coordinate::new(123.0, 76.0)],
            Coordinate::new(30.35, 76.38),
            TravelMode::Driving,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NaviError::InvalidInput(_)));
}

// --- Briefing ---

fn briefer(upstreams: &Upstreams, key: &str) -> Briefer {
    Briefer::new(&BriefingConfig {
        base_url: upstreams.model.clone(),
        api_key: Some(key.to_string()),
        ..BriefingConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_briefing_from_model() {
    let upstreams = spawn_upstreams().await;
    let briefing = briefer(&upstreams, "good")
        .brief(&briefed_route(), TravelMode::Driving, 100.0)
        .await;
    assert_eq!(briefing.source, BriefingSource::Model);
    assert_eq!(briefing.text, "Slow down near the canal bridge.");
}

#[tokio::test]
async fn test_briefing_falls_back_on_failure() {
    let upstreams = spawn_upstreams().await;

    for key in ["revoked", "empty"] {
        let briefing = briefer(&upstreams, key)
            .brief(&briefed_route(), TravelMode::Driving, 100.0)
            .await;
        assert_eq!(briefing.source, BriefingSource::Fallback);
        assert!(briefing.text.contains("Blind curve at the canal bridge"));
    }
}

// --- Full plan ---

#[tokio::test]
async fn test_plan_recommends_safer_route() {
    let upstreams = spawn_upstreams().await;
    let app = app_with(
        config_for(&upstreams, Some("good")),
        vec![black_spot("bridge", 30.34, 76.3805, RiskLevel::High)],
    );

    let response = app
        .oneshot(post_json(
            "/plan",
            json!({ "start": "Patiala Bus Stand", "end": "Rajpura Road", "mode": "car" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["start"]["name"], "Bus Stand, Patiala");
    assert_eq!(body["mode"], "driving");
    assert_eq!(body["recommended"], 1);
    assert_eq!(body["routes"][0]["risk_score"], 0);
    assert_eq!(body["routes"][1]["risk_score"], 10);
    assert_eq!(body["briefing"]["source"], "model");
}

#[tokio::test]
async fn test_plan_fastest_with_fallback_briefing() {
    let upstreams = spawn_upstreams().await;
    let app = app_with(
        config_for(&upstreams, None),
        vec![black_spot("bridge", 30.34, 76.3805, RiskLevel::High)],
    );

    let response = app
        .oneshot(post_json(
            "/plan",
            json!({ "start": "Patiala Bus Stand", "end": "Rajpura Road", "policy": "fastest" }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;

    assert_eq!(body["recommended"], 0);
    assert_eq!(body["briefing"]["source"], "fallback");
    assert!(body["briefing"]["text"]
        .as_str()
        .unwrap()
        .contains("1 black spot on this route"));
}

#[tokio::test]
async fn test_plan_waypoints_are_lat_lon() {
    let upstreams = spawn_upstreams().await;
    let app = app_with(config_for(&upstreams, None), vec![]);

    let response = app
        .oneshot(post_json(
            "/plan",
            json!({
                "start": "Patiala Bus Stand",
                "end": "Rajpura Road",
                "waypoints": [[30.34, 76.39]]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The stand-in echoes the stops it was sent, in [lon, lat] order
    let body = body_json(response).await;
    assert_eq!(
        body["routes"][0]["geometry"]["coordinates"],
        json!([[76.38, 30.33], [76.39, 30.34], [76.38, 30.35]])
    );
}

#[tokio::test]
async fn test_plan_errors_map_to_status() {
    let upstreams = spawn_upstreams().await;
    let app = app_with(config_for(&upstreams, None), vec![]);

    let unknown = app
        .clone()
        .oneshot(post_json(
            "/plan",
            json!({ "start": "Atlantis", "end": "Rajpura Road" }),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let no_route = app
        .clone()
        .oneshot(post_json(
            "/plan",
            json!({ "start": "Patiala Bus Stand", "end": "Rajpura Road", "mode": "bike" }),
        ))
        .await
        .unwrap();
    assert_eq!(no_route.status(), StatusCode::NOT_FOUND);

    let waypoints = vec![[30.34, 76.39]; 9];
    let too_many = app
        .oneshot(post_json(
            "/plan",
            json!({
                "start": "Patiala Bus Stand",
                "end": "Rajpura Road",
                "waypoints": waypoints
            }),
        ))
        .await
        .unwrap();
    assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);
}
