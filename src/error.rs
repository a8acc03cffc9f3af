//! Error types for NaviSafe.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NaviError>;

#[derive(Error, Debug)]
pub enum NaviError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No place found for '{0}'")]
    PlaceNotFound(String),

    #[error("No route found: {0}")]
    NoRoute(String),

    #[error("Geocoder error: {0}")]
    Geocoder(String),

    #[error("Routing service error: {0}")]
    Routing(String),

    #[error("Briefing model error: {0}")]
    Briefing(String),

    #[error("Black spot store error: {0}")]
    Store(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl NaviError {
    pub fn status(&self) -> StatusCode {
        match self {
            NaviError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            NaviError::PlaceNotFound(_) | NaviError::NoRoute(_) => StatusCode::NOT_FOUND,
            NaviError::Geocoder(_)
            | NaviError::Routing(_)
            | NaviError::Briefing(_)
            | NaviError::Http(_) => StatusCode::BAD_GATEWAY,
            NaviError::Store(_) | NaviError::Io(_) | NaviError::Json(_) | NaviError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for NaviError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
