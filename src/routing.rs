//! Route alternatives from an OSRM-compatible HTTP service.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::RoutingConfig;
use crate::error::{NaviError, Result};
use crate::geometry::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    #[serde(alias = "car")]
    Driving,
    #[serde(alias = "bike")]
    Cycling,
}

impl TravelMode {
    pub fn profile(self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Cycling => "cycling",
        }
    }
}

/// One alternative as returned by the routing service.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRoute {
    pub geometry: Vec<Coordinate>,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

pub struct RouteProvider {
    http_client: reqwest::Client,
    base_url: String,
}

impl RouteProvider {
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch alternatives for start -> waypoints -> end.
    pub async fn routes(
        &self,
        start: Coordinate,
        waypoints: &[Coordinate],
        end: Coordinate,
        mode: TravelMode,
    ) -> Result<Vec<CandidateRoute>> {
        let stops: Vec<Coordinate> = std::iter::once(start)
            .chain(waypoints.iter().copied())
            .chain(std::iter::once(end))
            .collect();
        for stop in &stops {
            stop.validate()?;
        }

        let url = format!(
            "{}/route/v1/{}/{}",
            self.base_url,
            mode.profile(),
            coordinate_path(&stops)
        );
        debug!("Requesting routes: {}", url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("alternatives", "true"),
                ("overview", "full"),
                ("geometries", "geojson"),
            ])
            .send()
            .await?;

        // OSRM reports NoRoute and friends with a 400 and a JSON body
        let status = response.status();
        let body: OsrmResponse = response.json().await.map_err(|e| {
            NaviError::Routing(format!("unreadable response (HTTP {}): {}", status, e))
        })?;

        parse_routes(body)
    }
}

/// `lon,lat;lon,lat;...` as OSRM expects.
fn coordinate_path(stops: &[Coordinate]) -> String {
    stops
        .iter()
        .map(|c| format!("{},{}", c.lon, c.lat))
        .join(";")
}

fn parse_routes(body: OsrmResponse) -> Result<Vec<CandidateRoute>> {
    if body.code != "Ok" {
        let detail = body.message.unwrap_or_default();
        return Err(NaviError::NoRoute(format!("{} {}", body.code, detail).trim().to_string()));
    }
    if body.routes.is_empty() {
        return Err(NaviError::NoRoute("service returned no routes".into()));
    }

    Ok(body
        .routes
        .into_iter()
        .map(|route| CandidateRoute {
            geometry: route
                .geometry
                .coordinates
                .into_iter()
                .map(Coordinate::from_lon_lat)
                .collect(),
            distance_m: route.distance,
            duration_s: route.duration,
        })
        .collect())
}
