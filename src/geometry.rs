//! Coordinates and polyline helpers.
//!
//! Single points travel as `[lat, lon]` in requests; route geometry travels as
//! GeoJSON `[lon, lat]` pairs.

use geo::prelude::*;
use geo::Point;
use serde::{Deserialize, Serialize};

use crate::error::{NaviError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn from_lat_lon(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }

    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }

    /// GeoJSON order.
    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(NaviError::InvalidInput(format!(
                "coordinate is not finite: ({}, {})",
                self.lat, self.lon
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(NaviError::InvalidInput(format!(
                "latitude {} out of range",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(NaviError::InvalidInput(format!(
                "longitude {} out of range",
                self.lon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonLineString {
    pub r#type: String,
    pub coordinates: Vec<[f64; 2]>, // [lon, lat] standard for GeoJSON
}

impl GeoJsonLineString {
    pub fn from_coordinates(points: &[Coordinate]) -> Self {
        Self {
            r#type: "LineString".to_string(),
            coordinates: points.iter().map(|p| p.to_lon_lat()).collect(),
        }
    }

    pub fn to_coordinates(&self) -> Vec<Coordinate> {
        self.coordinates
            .iter()
            .map(|&pair| Coordinate::from_lon_lat(pair))
            .collect()
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

/// Insert interpolated points so no gap exceeds `max_spacing_m`.
///
/// Interpolation is linear in lat/lon, which is fine at street scale.
pub fn densify(points: &[Coordinate], max_spacing_m: f64) -> Vec<Coordinate> {
    if !max_spacing_m.is_finite() || max_spacing_m <= 0.0 || points.len() < 2 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);

    for window in points.windows(2) {
        let (a, b) = (window[0], window[1]);
        let gap = haversine_m(a, b);
        let steps = (gap / max_spacing_m).ceil() as usize;

        for i in 1..steps {
            let t = i as f64 / steps as f64;
            out.push(Coordinate::new(
                a.lat + (b.lat - a.lat) * t,
                a.lon + (b.lon - a.lon) * t,
            ));
        }
        out.push(b);
    }

    out
}

/// Number of points `densify` would return, without building them.
pub fn densified_len(points: &[Coordinate], max_spacing_m: f64) -> usize {
    if !max_spacing_m.is_finite() || max_spacing_m <= 0.0 || points.len() < 2 {
        return points.len();
    }
    points.windows(2).fold(1usize, |total, window| {
        let steps = (haversine_m(window[0], window[1]) / max_spacing_m).ceil() as usize;
        total.saturating_add(steps.max(1))
    })
}

/// Distance from the first point to every point along the polyline.
pub fn cumulative_distances(points: &[Coordinate]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(points.len());
    for (i, &p) in points.iter().enumerate() {
        if i > 0 {
            total += haversine_m(points[i - 1], p);
        }
        out.push(total);
    }
    out
}

pub fn polyline_length_m(points: &[Coordinate]) -> f64 {
    cumulative_distances(points).last().copied().unwrap_or(0.0)
}
