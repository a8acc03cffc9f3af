//! # NaviSafe
//!
//! Route planning with accident black spot awareness.
//!
//! - Geocodes free-text start and end places
//! - Fetches driving or cycling alternatives from an OSRM-compatible service
//! - Flags crowd-sourced black spots within a collision threshold of each route
//! - Ranks alternatives by risk score and travel time
//! - Produces a safety briefing, from a generative model or a fixed template
//!
//! ```rust
//! use navisafe::geometry::Coordinate;
//! use navisafe::hazard::{BlackSpot, HazardIndex, RiskLevel};
//! use navisafe::scoring::{detect_hazards, risk_score, DetectionConfig};
//!
//! let spots = vec![BlackSpot {
//!     id: "canal-bridge".into(),
//!     lat: 30.34,
//!     lon: 76.3805,
//!     risk: RiskLevel::High,
//!     description: "Blind curve at the canal bridge".into(),
//!     reported_at: chrono::Utc::now(),
//!     reporter: None,
//! }];
//! let index = HazardIndex::build(&spots);
//! let route = [Coordinate::new(30.33, 76.38), Coordinate::new(30.35, 76.38)];
//!
//! let hazards = detect_hazards(&route, &spots, &index, &DetectionConfig::default()).unwrap();
//! assert_eq!(risk_score(&hazards), 10);
//! ```

pub mod api;
pub mod briefing;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod geometry;
pub mod hazard;
pub mod routing;
pub mod safety;
pub mod scoring;
pub mod store;

pub use error::{NaviError, Result};
