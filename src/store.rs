//! Crowd-sourced black spot store.
//!
//! Holds the report list and an immutable snapshot (spots, R-tree, heat map)
//! that is rebuilt on every change. Reports are serialized by their own
//! mutex and do their disk I/O and rebuild outside the snapshot lock, so
//! readers only ever wait for a pointer swap.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{error, info};

use crate::error::{NaviError, Result};
use crate::hazard::{BlackSpot, HazardIndex, NewBlackSpot};
use crate::safety::SafetyMap;

pub struct HazardSnapshot {
    pub spots: Vec<BlackSpot>,
    pub index: HazardIndex,
    pub heat: SafetyMap,
}

impl HazardSnapshot {
    pub fn build(spots: Vec<BlackSpot>, heat_resolution: u8) -> Result<Self> {
        let index = HazardIndex::build(&spots);
        let heat = SafetyMap::build(&spots, heat_resolution)?;
        Ok(Self { spots, index, heat })
    }
}

pub struct BlackSpotStore {
    path: Option<PathBuf>,
    heat_resolution: u8,
    current: RwLock<Arc<HazardSnapshot>>,
    /// Held for a whole report so concurrent reports never drop each other
    writer: Mutex<()>,
}

impl BlackSpotStore {
    pub fn in_memory(spots: Vec<BlackSpot>, heat_resolution: u8) -> Result<Self> {
        Ok(Self {
            path: None,
            heat_resolution,
            current: RwLock::new(Arc::new(HazardSnapshot::build(spots, heat_resolution)?)),
            writer: Mutex::new(()),
        })
    }

    /// Read the JSON file if it exists, otherwise start empty.
    pub fn load(path: Option<&Path>, heat_resolution: u8) -> Result<Self> {
        let spots = match path {
            Some(p) if p.exists() => {
                let raw = fs::read_to_string(p)?;
                let spots: Vec<BlackSpot> = serde_json::from_str(&raw)?;
                info!("Loaded {} black spots from {}", spots.len(), p.display());
                spots
            }
            Some(p) => {
                info!("No black spot file at {}, starting empty", p.display());
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut store = Self::in_memory(spots, heat_resolution)?;
        store.path = path.map(Path::to_path_buf);
        Ok(store)
    }

    pub fn snapshot(&self) -> Arc<HazardSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn list(&self) -> Vec<BlackSpot> {
        self.snapshot().spots.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate, persist and publish a new report.
    ///
    /// Blocks on file I/O when a path is configured; async callers should
    /// run it on a blocking thread.
    pub fn report(&self, new: NewBlackSpot) -> Result<BlackSpot> {
        let spot = new.into_black_spot()?;

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut spots = self.snapshot().spots.clone();
        spots.push(spot.clone());

        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &spots) {
                error!("Failed to persist black spots to {}: {}", path.display(), e);
                return Err(e);
            }
        }

        let next = Arc::new(HazardSnapshot::build(spots, self.heat_resolution)?);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;

        info!(
            "Black spot {} reported ({:?}) at ({}, {})",
            spot.id, spot.risk, spot.lat, spot.lon
        );
        Ok(spot)
    }
}

/// Write to a sibling temp file, then rename over the target.
fn persist(path: &Path, spots: &[BlackSpot]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(spots)?)?;
    fs::rename(&tmp, path)
        .map_err(|e| NaviError::Store(format!("rename {}: {}", tmp.display(), e)))
}
