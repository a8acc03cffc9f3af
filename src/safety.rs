use h3o::{CellIndex, LatLng, Resolution};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{NaviError, Result};
use crate::geometry::Coordinate;
use crate::hazard::BlackSpot;

pub const DEFAULT_RESOLUTION: u8 = 9;

/// Black spot weight aggregated over H3 cells.
///
/// A spot puts its full weight on its own cell and half of it on the first
/// ring of neighbors.
pub struct SafetyMap {
    resolution: Resolution,
    cells: HashMap<CellIndex, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatCell {
    pub cell: String,
    pub lat: f64,
    pub lon: f64,
    pub risk: f64,
}

impl SafetyMap {
    pub fn build(spots: &[BlackSpot], resolution: u8) -> Result<Self> {
        let resolution = Resolution::try_from(resolution)
            .map_err(|e| NaviError::InvalidInput(format!("H3 resolution: {}", e)))?;

        let mut cells = HashMap::new();
        for spot in spots {
            let Some(center) = to_cell(spot.coordinate(), resolution) else {
                continue;
            };
            let weight = f64::from(spot.risk.weight());

            *cells.entry(center).or_insert(0.0) += weight;
            for neighbor in center.grid_disk::<Vec<_>>(1) {
                if neighbor != center {
                    *cells.entry(neighbor).or_insert(0.0) += weight / 2.0;
                }
            }
        }

        Ok(Self { resolution, cells })
    }

    pub fn risk_at(&self, point: Coordinate) -> f64 {
        to_cell(point, self.resolution)
            .and_then(|cell| self.cells.get(&cell).copied())
            .unwrap_or(0.0)
    }

    /// Summed risk over the distinct cells a route passes through.
    pub fn exposure(&self, route: &[Coordinate]) -> f64 {
        let visited: HashSet<CellIndex> = route
            .iter()
            .filter_map(|&p| to_cell(p, self.resolution))
            .collect();
        visited
            .iter()
            .filter_map(|cell| self.cells.get(cell))
            .sum()
    }

    /// Non-empty cells, riskiest first.
    pub fn cells(&self) -> Vec<HeatCell> {
        let mut out: Vec<HeatCell> = self
            .cells
            .iter()
            .filter(|(_, risk)| **risk > 0.0)
            .map(|(cell, risk)| {
                let center = LatLng::from(*cell);
                HeatCell {
                    cell: cell.to_string(),
                    lat: center.lat(),
                    lon: center.lng(),
                    risk: *risk,
                }
            })
            .collect();
        out.sort_by(|a, b| b.risk.total_cmp(&a.risk).then_with(|| a.cell.cmp(&b.cell)));
        out
    }
}

fn to_cell(point: Coordinate, resolution: Resolution) -> Option<CellIndex> {
    LatLng::new(point.lat, point.lon)
        .ok()
        .map(|ll| ll.to_cell(resolution))
}
