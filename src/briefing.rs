//! Natural-language safety briefing for the recommended route.
//!
//! Asks a Gemini-compatible `generateContent` endpoint for a short advisory.
//! Any failure falls back to a fixed template; callers always get text.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BriefingConfig;
use crate::error::{NaviError, Result};
use crate::routing::TravelMode;
use crate::scoring::RouteAssessment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BriefingSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct Briefing {
    pub text: String,
    pub source: BriefingSource,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct Briefer {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl Briefer {
    pub fn new(config: &BriefingConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    pub async fn brief(
        &self,
        route: &RouteAssessment,
        mode: TravelMode,
        threshold_m: f64,
    ) -> Briefing {
        let Some(api_key) = &self.api_key else {
            debug!("No briefing API key configured, using fallback");
            return fallback(route, mode, threshold_m);
        };

        match self.generate(api_key, &prompt(route, mode, threshold_m)).await {
            Ok(text) => Briefing {
                text,
                source: BriefingSource::Model,
            },
            Err(e) => {
                warn!("Briefing model call failed, using fallback: {}", e);
                fallback(route, mode, threshold_m)
            }
        }
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NaviError::Briefing(format!(
                "model returned HTTP {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(NaviError::Briefing("model returned no text".into()));
        }
        Ok(text)
    }
}

fn prompt(route: &RouteAssessment, mode: TravelMode, threshold_m: f64) -> String {
    let mut out = format!(
        "You are a road safety assistant. Write a short, calm safety briefing \
         (at most 5 sentences) for a {} trip of {:.1} km \
         taking about {} minutes. ",
        mode.profile(),
        route.distance_m / 1000.0,
        (route.duration_s / 60.0).round()
    );

    if route.hazards.is_empty() {
        let _ = write!(
            out,
            "No reported accident black spots lie within {:.0} m of the route.",
            threshold_m
        );
        return out;
    }

    let _ = writeln!(
        out,
        "These reported accident black spots lie on the route, in travel order:"
    );
    for hazard in &route.hazards {
        let _ = writeln!(
            out,
            "- {} risk, {:.1} km from the start: {}",
            hazard.risk.label(),
            hazard.along_route_m / 1000.0,
            hazard.description
        );
    }
    out.push_str("Mention each black spot and give practical advice.");
    out
}

/// Deterministic briefing used when the model is unavailable.
pub fn fallback(route: &RouteAssessment, mode: TravelMode, threshold_m: f64) -> Briefing {
    let advice = match mode {
        TravelMode::Driving => {
            "Keep to the speed limit and increase following distance near these spots."
        }
        TravelMode::Cycling => {
            "Stay visible, signal early and consider walking your bike through these spots."
        }
    };

    let text = if route.hazards.is_empty() {
        format!(
            "Route looks clear: no reported black spots within {:.0} m. \
             Stay alert and travel safely.",
            threshold_m
        )
    } else {
        let mut text = format!(
            "Caution: {} black spot{} on this route (risk score {}).\n",
            route.hazards.len(),
            if route.hazards.len() == 1 { "" } else { "s" },
            route.risk_score
        );
        for hazard in &route.hazards {
            let _ = writeln!(
                text,
                "- {} at {:.1} km: {}",
                hazard.risk.label(),
                hazard.along_route_m / 1000.0,
                hazard.description
            );
        }
        text.push_str(advice);
        text
    };

    Briefing {
        text,
        source: BriefingSource::Fallback,
    }
}
