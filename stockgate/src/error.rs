use std::{error, fmt};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stockgate_tokens::SupplyError;
use thiserror::Error;

use crate::email::EmailError;

/// A request that could not be served
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid access token could be obtained; nothing was forwarded
    #[error("Failed to get access token: {}", Chain(.0))]
    AccessToken(#[from] SupplyError),

    /// The access token cannot be carried in an `Authorization` header
    #[error("Failed to get access token: token is not a valid header value")]
    UnusableToken,

    /// The proxied path does not resolve beneath the API base
    #[error("Invalid URL")]
    InvalidPath,

    /// The inventory API could not be reached
    #[error("Failed to make API request")]
    Upstream(#[source] reqwest::Error),

    /// The inventory API response could not be read
    #[error("Failed to read response body")]
    UpstreamBody(#[source] reqwest::Error),

    /// The catalog id contains characters outside `[A-Za-z0-9_-]`
    #[error("invalid catalog id")]
    InvalidCatalogId,

    /// The contact email could not be rendered or delivered
    #[error("Failed to send email: {}", Chain(.0))]
    Email(#[from] EmailError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::AccessToken(_) | Self::UnusableToken | Self::Email(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidPath | Self::InvalidCatalogId => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = (&self as &dyn error::Error), "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Formats an error followed by each of its sources, separated by `: `
struct Chain<'a>(&'a dyn error::Error);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {}", err)?;
            source = err.source();
        }
        Ok(())
    }
}
