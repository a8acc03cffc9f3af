//! Route risk scoring.
//!
//! A hazard counts against a route once any point of the (densified) route
//! geometry comes within the collision threshold of it. Each hazard counts at
//! most once per route, and the route's risk score is the sum of the severity
//! weights of its distinct hazards.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{NaviError, Result};
use crate::geometry::{
    cumulative_distances, densified_len, densify, haversine_m, Coordinate, GeoJsonLineString,
};
use crate::hazard::{BlackSpot, HazardIndex, RiskLevel};
use crate::routing::CandidateRoute;
use crate::safety::DEFAULT_RESOLUTION;
use crate::store::HazardSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Collision threshold in meters (inclusive)
    #[serde(default = "default_threshold")]
    pub threshold_m: f64,

    /// Max gap between checked route points; `None` or `0` checks vertices only
    #[serde(default = "default_densify_spacing")]
    pub densify_spacing_m: Option<f64>,

    /// H3 resolution of the heat map
    #[serde(default = "default_heat_resolution")]
    pub heat_resolution: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_m: default_threshold(),
            densify_spacing_m: default_densify_spacing(),
            heat_resolution: default_heat_resolution(),
        }
    }
}

fn default_threshold() -> f64 {
    100.0
}

fn default_densify_spacing() -> Option<f64> {
    Some(25.0)
}

fn default_heat_resolution() -> u8 {
    DEFAULT_RESOLUTION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePolicy {
    /// Risk first, then duration
    #[default]
    Safest,
    /// Duration first, then risk
    Fastest,
    /// Duration plus a time penalty per risk point
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub policy: RoutePolicy,

    /// Seconds of travel time one risk point is worth under `balanced`
    #[serde(default = "default_risk_penalty")]
    pub risk_penalty_s: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            policy: RoutePolicy::default(),
            risk_penalty_s: default_risk_penalty(),
        }
    }
}

fn default_risk_penalty() -> f64 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedHazard {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub risk: RiskLevel,
    pub description: String,
    /// Closest approach between the route and the hazard
    pub distance_m: f64,
    /// Distance along the route where the hazard was first detected
    pub along_route_m: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteAssessment {
    /// Position in the routing service's answer
    pub provider_index: usize,
    pub recommended: bool,
    pub distance_m: f64,
    pub duration_s: f64,
    pub risk_score: u32,
    pub exposure: f64,
    pub hazards: Vec<DetectedHazard>,
    pub geometry: GeoJsonLineString,
}

/// Most route points one assessment may check, across all candidates.
pub const MAX_SAMPLE_POINTS: usize = 200_000;

/// How many points `sample_points` would check for this route.
pub fn sample_count(route: &[Coordinate], config: &DetectionConfig) -> usize {
    densified_len(route, config.densify_spacing_m.unwrap_or(0.0))
}

/// Route points that get checked: the geometry, densified when configured.
pub fn sample_points(
    route: &[Coordinate],
    config: &DetectionConfig,
) -> Result<Vec<Coordinate>> {
    check_sample_budget(sample_count(route, config))?;
    Ok(densify(route, config.densify_spacing_m.unwrap_or(0.0)))
}

fn check_sample_budget(count: usize) -> Result<()> {
    if count > MAX_SAMPLE_POINTS {
        return Err(NaviError::InvalidInput(format!(
            "routes too long to check: {} sample points, at most {} allowed",
            count, MAX_SAMPLE_POINTS
        )));
    }
    Ok(())
}

/// Hazards within the collision threshold of the route, in route order.
pub fn detect_hazards(
    route: &[Coordinate],
    spots: &[BlackSpot],
    index: &HazardIndex,
    config: &DetectionConfig,
) -> Result<Vec<DetectedHazard>> {
    if route.is_empty() || index.is_empty() {
        return Ok(Vec::new());
    }
    let points = sample_points(route, config)?;
    Ok(scan_points(&points, spots, index, config.threshold_m))
}

/// Walk already sampled points and collect hazards within `threshold_m`.
fn scan_points(
    points: &[Coordinate],
    spots: &[BlackSpot],
    index: &HazardIndex,
    threshold_m: f64,
) -> Vec<DetectedHazard> {
    if points.is_empty() || index.is_empty() {
        return Vec::new();
    }

    let along = cumulative_distances(points);

    let mut detected: Vec<DetectedHazard> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (i, &point) in points.iter().enumerate() {
        let hits = index
            .candidates_near(point, threshold_m)
            .into_iter()
            .filter_map(|idx| spots.get(idx))
            .map(|spot| (spot, haversine_m(point, spot.coordinate())))
            .filter(|(_, d)| *d <= threshold_m)
            .sorted_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));

        for (spot, distance) in hits {
            match seen.get(spot.id.as_str()).copied() {
                Some(slot) => {
                    let hazard = &mut detected[slot];
                    if distance < hazard.distance_m {
                        hazard.distance_m = distance;
                    }
                }
                None => {
                    seen.insert(spot.id.as_str(), detected.len());
                    detected.push(DetectedHazard {
                        id: spot.id.clone(),
                        lat: spot.lat,
                        lon: spot.lon,
                        risk: spot.risk,
                        description: spot.description.clone(),
                        distance_m: distance,
                        along_route_m: along[i],
                    });
                }
            }
        }
    }

    debug!(
        "Detected {} hazards over {} route points",
        detected.len(),
        points.len()
    );
    detected
}

/// Sum of severity weights over distinct hazards.
pub fn risk_score(hazards: &[DetectedHazard]) -> u32 {
    hazards
        .iter()
        .unique_by(|h| h.id.as_str())
        .map(|h| h.risk.weight())
        .sum()
}

/// Score every candidate and return them ranked, best first.
///
/// Fails with `InvalidInput` when the candidates together need more than
/// `MAX_SAMPLE_POINTS` checked points.
pub fn assess_routes(
    candidates: Vec<CandidateRoute>,
    snapshot: &HazardSnapshot,
    detection: &DetectionConfig,
    ranking: &RankingConfig,
) -> Result<Vec<RouteAssessment>> {
    let total = candidates
        .iter()
        .map(|c| sample_count(&c.geometry, detection))
        .fold(0usize, usize::saturating_add);
    check_sample_budget(total)?;

    let assessed = candidates
        .into_iter()
        .enumerate()
        .map(|(provider_index, candidate)| -> Result<RouteAssessment> {
            let points = sample_points(&candidate.geometry, detection)?;
            let hazards = scan_points(
                &points,
                &snapshot.spots,
                &snapshot.index,
                detection.threshold_m,
            );
            Ok(RouteAssessment {
                provider_index,
                recommended: false,
                distance_m: candidate.distance_m,
                duration_s: candidate.duration_s,
                risk_score: risk_score(&hazards),
                exposure: snapshot.heat.exposure(&points),
                hazards,
                geometry: GeoJsonLineString::from_coordinates(&candidate.geometry),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(rank_routes(assessed, ranking))
}

/// Stable sort under the policy; marks the first route as recommended.
pub fn rank_routes(
    routes: Vec<RouteAssessment>,
    ranking: &RankingConfig,
) -> Vec<RouteAssessment> {
    let mut ranked: Vec<RouteAssessment> = routes
        .into_iter()
        .sorted_by(|a, b| compare(a, b, ranking))
        .collect();

    for (i, route) in ranked.iter_mut().enumerate() {
        route.recommended = i == 0;
    }
    ranked
}

fn compare(a: &RouteAssessment, b: &RouteAssessment, ranking: &RankingConfig) -> Ordering {
    let by_risk = a.risk_score.cmp(&b.risk_score);
    let by_time = a.duration_s.total_cmp(&b.duration_s);

    match ranking.policy {
        RoutePolicy::Safest => by_risk.then(by_time),
        RoutePolicy::Fastest => by_time.then(by_risk),
        RoutePolicy::Balanced => {
            let cost = |r: &RouteAssessment| {
                r.duration_s + f64::from(r.risk_score) * ranking.risk_penalty_s
            };
            cost(a).total_cmp(&cost(b)).then(by_risk).then(by_time)
        }
    }
}
