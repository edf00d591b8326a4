//! Minting access tokens from the OAuth2 authority

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use stockgate_clock::DurationSecs;
use thiserror::Error;

use crate::AccessToken;

pub mod dto;

pub use dto::RefreshTokenCredentials;

/// An authority that can issue a new access token on demand
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    /// Requests a new access token
    ///
    /// Implementations must not retry internally; a failure is reported as-is.
    async fn refresh(&self) -> Result<TokenGrant, RefreshError>;
}

/// A newly issued access token and how long it lives
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The access token
    pub access_token: AccessToken,
    /// The lifetime reported by the authority
    pub expires_in: DurationSecs,
}

/// An authority reached with the OAuth2 refresh token flow
///
/// The credentials are sent as query parameters of a `POST` to the token URL,
/// with no request body.
#[derive(Debug)]
pub struct RefreshTokenAuthority {
    client: reqwest::Client,
    token_url: reqwest::Url,
    credentials: RefreshTokenCredentials,
    timeout: Duration,
}

impl RefreshTokenAuthority {
    /// How long a refresh may take unless configured otherwise
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Constructs a new refresh token authority
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        credentials: RefreshTokenCredentials,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Bounds how long a single refresh call may take, end to end
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The URL of the token endpoint
    pub fn token_url(&self) -> &reqwest::Url {
        &self.token_url
    }
}

#[async_trait]
impl TokenAuthority for RefreshTokenAuthority {
    async fn refresh(&self) -> Result<TokenGrant, RefreshError> {
        request_grant(
            &self.client,
            &self.token_url,
            &self.credentials,
            self.timeout,
        )
        .await
    }
}

/// An error while requesting a new token from the authority
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The authority could not be reached, timed out, or dropped the response
    #[error("error communicating with token authority")]
    Transport(#[source] reqwest::Error),
    /// The authority refused to issue a token
    #[error("token authority returned status: {status}, body: {body}")]
    Rejected {
        /// The HTTP status of the response
        status: StatusCode,
        /// The response body, for diagnostics
        body: String,
    },
    /// The authority answered `200 OK` with something that is not a grant
    #[error("error deserializing token body from authority")]
    Malformed(#[source] serde_json::Error),
}

impl RefreshError {
    /// The HTTP status returned by the authority, if it returned one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport(err) => err.status(),
            Self::Rejected { status, .. } => Some(*status),
            Self::Malformed(_) => Some(StatusCode::OK),
        }
    }
}

#[tracing::instrument(
    err,
    skip(client, token_url, credentials, timeout),
    fields(
        token_url = %token_url,
        credentials.grant_type = dto::GRANT_TYPE,
        credentials.client_id = %credentials.client_id,
    ),
)]
async fn request_grant(
    client: &reqwest::Client,
    token_url: &reqwest::Url,
    credentials: &RefreshTokenCredentials,
    timeout: Duration,
) -> Result<TokenGrant, RefreshError> {
    tracing::trace!("requesting token from authority");

    let resp = client
        .post(token_url.clone())
        .query(credentials)
        .timeout(timeout)
        .send()
        .await
        .map_err(RefreshError::Transport)?;

    let status = resp.status();
    tracing::debug!(
        response.status = status.as_u16(),
        "received token response from issuing authority"
    );

    let body = resp.bytes().await.map_err(RefreshError::Transport)?;

    if status != StatusCode::OK {
        return Err(RefreshError::Rejected {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    let grant = match serde_json::from_slice::<dto::TokenResponse>(&body) {
        Ok(grant) => grant,
        Err(err) => {
            return Err(match serde_json::from_slice::<dto::ErrorResponse>(&body) {
                Ok(rejection) => {
                    tracing::debug!(error = %rejection.error, "authority refused grant");
                    RefreshError::Rejected {
                        status,
                        body: String::from_utf8_lossy(&body).into_owned(),
                    }
                }
                Err(_) => RefreshError::Malformed(err),
            });
        }
    };

    tracing::info!(lifetime = grant.expires_in.0, "received new access token");

    Ok(TokenGrant {
        access_token: grant.access_token,
        expires_in: grant.expires_in,
    })
}
