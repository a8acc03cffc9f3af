//! Black spots: reported accident-prone locations and their spatial index.

use chrono::{DateTime, Utc};
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{NaviError, Result};
use crate::geometry::Coordinate;

pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_REPORTER_CHARS: usize = 80;

/// Lower bound on meters per degree, so envelopes never undershoot.
const METERS_PER_DEGREE: f64 = 111_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Severity weight summed into a route's risk score.
    pub fn weight(self) -> u32 {
        match self {
            RiskLevel::High => 10,
            RiskLevel::Medium => 5,
            RiskLevel::Low => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackSpot {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub risk: RiskLevel,
    pub description: String,
    pub reported_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
}

impl BlackSpot {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// Payload of a crowd-sourced report.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBlackSpot {
    pub lat: f64,
    pub lon: f64,
    pub risk: RiskLevel,
    pub description: String,
    #[serde(default)]
    pub reporter: Option<String>,
}

impl NewBlackSpot {
    pub fn validate(&self) -> Result<()> {
        Coordinate::new(self.lat, self.lon).validate()?;

        let description = self.description.trim();
        if description.is_empty() {
            return Err(NaviError::InvalidInput("description is empty".into()));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(NaviError::InvalidInput(format!(
                "description longer than {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
        if let Some(reporter) = &self.reporter {
            if reporter.trim().chars().count() > MAX_REPORTER_CHARS {
                return Err(NaviError::InvalidInput(format!(
                    "reporter longer than {} characters",
                    MAX_REPORTER_CHARS
                )));
            }
        }
        Ok(())
    }

    /// Validate and stamp with a fresh id and the current time.
    pub fn into_black_spot(self) -> Result<BlackSpot> {
        self.validate()?;
        Ok(BlackSpot {
            id: uuid::Uuid::new_v4().to_string(),
            lat: self.lat,
            lon: self.lon,
            risk: self.risk,
            description: self.description.trim().to_string(),
            reported_at: Utc::now(),
            reporter: self
                .reporter
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        })
    }
}

/// R-tree over black spot positions, keyed by position in the spot list.
pub struct HazardIndex {
    tree: RTree<GeomWithData<[f64; 2], usize>>,
}

impl HazardIndex {
    pub fn build(spots: &[BlackSpot]) -> Self {
        let entries = spots
            .iter()
            .enumerate()
            .map(|(i, spot)| GeomWithData::new([spot.lon, spot.lat], i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Spot indices inside an envelope that contains the `radius_m` circle.
    ///
    /// This over-approximates; callers filter with `haversine_m`.
    pub fn candidates_near(&self, point: Coordinate, radius_m: f64) -> Vec<usize> {
        let dlat = radius_m / METERS_PER_DEGREE;
        // Widest longitude offset on the circle is asin(sin(d) / cos(lat));
        // a circle reaching a pole spans every meridian
        let spread = dlat.to_radians().sin() / point.lat.to_radians().cos();
        let polar = point.lat.abs() + dlat >= 90.0;
        let (min_lon, max_lon) = if polar || !spread.is_finite() || spread >= 1.0 {
            (-180.0, 180.0)
        } else {
            let dlon = spread.asin().to_degrees();
            (point.lon - dlon, point.lon + dlon)
        };
        let envelope = AABB::from_corners(
            [min_lon, point.lat - dlat],
            [max_lon, point.lat + dlat],
        );
        self.tree
            .locate_in_envelope(&envelope)
            .map(|entry| entry.data)
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn spot(id: &str, lat: f64, lon: f64, risk: RiskLevel) -> BlackSpot {
    BlackSpot {
        id: id.to_string(),
        lat,
        lon,
        risk,
        description: format!("{} test spot", id),
        reported_at: Utc::now(),
        reporter: None,
    }
}
