//! Free-text place lookup against a Nominatim-compatible search API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::config::GeocoderConfig;
use crate::error::{NaviError, Result};
use crate::geometry::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Place {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
}

pub struct Geocoder {
    http_client: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, Place>>,
    cache_capacity: usize,
}

impl Geocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
            cache_capacity: config.cache_capacity,
        })
    }

    pub async fn lookup(&self, query: &str) -> Result<Place> {
        let query = query.trim();
        if query.is_empty() {
            return Err(NaviError::InvalidInput("place name is empty".into()));
        }

        let key = query.to_lowercase();
        if let Some(place) = self.cached(&key) {
            debug!("Cache hit for geocode: {}", query);
            return Ok(place);
        }

        let response = self
            .http_client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NaviError::Geocoder(format!(
                "search returned HTTP {}",
                response.status()
            )));
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .map_err(|e| NaviError::Geocoder(format!("failed to parse response: {}", e)))?;

        let place = results
            .into_iter()
            .next()
            .ok_or_else(|| NaviError::PlaceNotFound(query.to_string()))
            .and_then(to_place)?;

        self.remember(key, place.clone());
        Ok(place)
    }

    fn cached(&self, key: &str) -> Option<Place> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn remember(&self, key: String, place: Place) {
        if self.cache_capacity == 0 {
            return;
        }
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.len() >= self.cache_capacity {
            cache.clear();
        }
        cache.insert(key, place);
    }
}

fn to_place(result: NominatimResult) -> Result<Place> {
    let parse = |field: &str, raw: &str| {
        raw.parse::<f64>()
            .map_err(|_| NaviError::Geocoder(format!("bad {} '{}' in response", field, raw)))
    };
    let place = Place {
        lat: parse("lat", &result.lat)?,
        lon: parse("lon", &result.lon)?,
        name: result.display_name,
    };
    place
        .coordinate()
        .validate()
        .map_err(|e| NaviError::Geocoder(e.to_string()))?;
    Ok(place)
}
