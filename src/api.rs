use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::briefing::{Briefer, Briefing};
use crate::config::Config;
use crate::error::{NaviError, Result};
use crate::geocoder::{Geocoder, Place};
use crate::geometry::{polyline_length_m, Coordinate};
use crate::hazard::{BlackSpot, NewBlackSpot};
use crate::routing::{CandidateRoute, RouteProvider, TravelMode};
use crate::safety::HeatCell;
use crate::scoring::{assess_routes, RankingConfig, RouteAssessment, RoutePolicy};
use crate::store::BlackSpotStore;

pub const MAX_WAYPOINTS: usize = 8;

// Shared State for concurrency
pub struct AppState {
    pub config: Config,
    pub store: BlackSpotStore,
    pub geocoder: Geocoder,
    pub routes: RouteProvider,
    pub briefer: Briefer,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let store = BlackSpotStore::load(
            config.store.path.as_deref(),
            config.detection.heat_resolution,
        )?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: BlackSpotStore) -> Result<Self> {
        Ok(Self {
            geocoder: Geocoder::new(&config.geocoder)?,
            routes: RouteProvider::new(&config.routing)?,
            briefer: Briefer::new(&config.briefing)?,
            store,
            config,
        })
    }

    fn ranking(&self, policy: Option<RoutePolicy>) -> RankingConfig {
        RankingConfig {
            policy: policy.unwrap_or(self.config.ranking.policy),
            risk_penalty_s: self.config.ranking.risk_penalty_s,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // Allows the map front-end to talk to this API from any origin
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/plan", post(plan_route))
        .route("/score", post(score_routes))
        .route("/blackspots", get(list_black_spots).post(report_black_spot))
        .route("/heatmap", get(heatmap))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// --- API DTOs ---

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub mode: TravelMode,
    /// Intermediate stops as [lat, lon]
    #[serde(default)]
    pub waypoints: Vec<[f64; 2]>,
    #[serde(default)]
    pub policy: Option<RoutePolicy>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub start: Place,
    pub end: Place,
    pub mode: TravelMode,
    pub policy: RoutePolicy,
    /// Ranked, best first
    pub routes: Vec<RouteAssessment>,
    /// `provider_index` of the recommended route
    pub recommended: usize,
    pub briefing: Briefing,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub routes: Vec<ScoreRoute>,
    #[serde(default)]
    pub policy: Option<RoutePolicy>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRoute {
    /// [lon, lat] pairs, GeoJSON order
    pub geometry: Vec<[f64; 2]>,
    #[serde(default)]
    pub distance_m: Option<f64>,
    pub duration_s: f64,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub policy: RoutePolicy,
    pub routes: Vec<RouteAssessment>,
    pub recommended: usize,
}

// --- Handlers ---

async fn plan_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlanRequest>,
) -> Result<Json<PlanResponse>> {
    if payload.waypoints.len() > MAX_WAYPOINTS {
        return Err(NaviError::InvalidInput(format!(
            "at most {} waypoints allowed",
            MAX_WAYPOINTS
        )));
    }
    let waypoints: Vec<Coordinate> = payload
        .waypoints
        .iter()
        .map(|&pair| Coordinate::from_lat_lon(pair))
        .collect();

    // 1. Geocode both ends
    let (start, end) = tokio::try_join!(
        state.geocoder.lookup(&payload.start),
        state.geocoder.lookup(&payload.end)
    )?;

    // 2. Fetch alternatives
    let candidates = state
        .routes
        .routes(start.coordinate(), &waypoints, end.coordinate(), payload.mode)
        .await?;

    // 3. Score and rank against the current black spots
    let ranking = state.ranking(payload.policy);
    let snapshot = state.store.snapshot();
    let routes = assess_routes(candidates, &snapshot, &state.config.detection, &ranking)?;
    let best = routes
        .first()
        .ok_or_else(|| NaviError::NoRoute("no candidate routes".into()))?;

    info!(
        "Planned {} -> {}: {} routes, recommended #{} (risk {}, {:.0} s)",
        start.name,
        end.name,
        routes.len(),
        best.provider_index,
        best.risk_score,
        best.duration_s
    );

    // 4. Brief the recommended route
    let briefing = state
        .briefer
        .brief(best, payload.mode, state.config.detection.threshold_m)
        .await;
    let recommended = best.provider_index;

    Ok(Json(PlanResponse {
        start,
        end,
        mode: payload.mode,
        policy: ranking.policy,
        routes,
        recommended,
        briefing,
    }))
}

async fn score_routes(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>> {
    if payload.routes.is_empty() {
        return Err(NaviError::InvalidInput("no routes to score".into()));
    }

    let candidates = payload
        .routes
        .into_iter()
        .map(|route| -> Result<CandidateRoute> {
            let geometry: Vec<Coordinate> = route
                .geometry
                .iter()
                .map(|&pair| Coordinate::from_lon_lat(pair))
                .collect();
            for point in &geometry {
                point.validate()?;
            }
            if !route.duration_s.is_finite() || route.duration_s < 0.0 {
                return Err(NaviError::InvalidInput("duration_s must be non-negative".into()));
            }
            Ok(CandidateRoute {
                distance_m: route
                    .distance_m
                    .unwrap_or_else(|| polyline_length_m(&geometry)),
                duration_s: route.duration_s,
                geometry,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let ranking = state.ranking(payload.policy);
    let snapshot = state.store.snapshot();
    let routes = assess_routes(candidates, &snapshot, &state.config.detection, &ranking)?;
    let recommended = routes.first().map(|r| r.provider_index).unwrap_or_default();

    Ok(Json(ScoreResponse {
        policy: ranking.policy,
        routes,
        recommended,
    }))
}

async fn list_black_spots(State(state): State<Arc<AppState>>) -> Json<Vec<BlackSpot>> {
    Json(state.store.list())
}

async fn report_black_spot(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewBlackSpot>,
) -> Result<(StatusCode, Json<BlackSpot>)> {
    // Persisting touches the disk; keep it off the async workers
    let spot = tokio::task::spawn_blocking(move || state.store.report(payload))
        .await
        .map_err(|e| NaviError::Store(format!("report task failed: {}", e)))??;
    Ok((StatusCode::CREATED, Json(spot)))
}

async fn heatmap(State(state): State<Arc<AppState>>) -> Json<Vec<HeatCell>> {
    Json(state.store.snapshot().heat.cells())
}
