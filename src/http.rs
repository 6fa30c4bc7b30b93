//! Shared plumbing for the request/response API clients.

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::ApiConfig;

/// Failure of a request/response API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not signed in: no access token available (run `olympus auth login`)")]
    NotSignedIn,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: the access token was rejected (run `olympus auth login`)")]
    Unauthorized,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid record id: {0:?}")]
    InvalidId(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Client for non-streaming calls, with both connect and request timeouts.
pub fn api_client(config: &ApiConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
}

pub fn endpoint(config: &ApiConfig, path: &str) -> Result<Url, ApiError> {
    Ok(olympus_core::endpoint::join_path(&config.base_url, path)?)
}

/// Pass a 2xx response through; map everything else to an [`ApiError`].
pub async fn check_status(response: Response, what: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(what.to_string())),
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                body: error_detail(&body),
            })
        }
    }
}

/// Pull the human-readable part out of an error body.
///
/// The backend answers errors as `{"detail": "..."}`; anything else is
/// passed through as-is.
pub fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("message"))
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
