//! Forwarding requests to the inventory API

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderName, HeaderValue, Method},
    response::{IntoResponse, Response},
};
use bytes::{BufMut, BytesMut};
use reqwest::Url;
use stockgate_tokens::AccessTokenRef;

use crate::{ApiError, AppState};

/// Header carrying the organization the request acts on
pub const ORGANIZATION_HEADER: HeaderName =
    HeaderName::from_static("x-com-zoho-inventory-organizationid");

const AUTHORIZATION_SCHEME: &[u8] = b"Zoho-oauthtoken ";

/// The upstream inventory API
#[derive(Debug)]
pub struct InventoryApi {
    client: reqwest::Client,
    base_url: Url,
    organization_id: HeaderValue,
    timeout: Duration,
}

impl InventoryApi {
    /// How long a forwarded request may take unless configured otherwise
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Constructs a handle on the API rooted at `base_url`
    ///
    /// Proxied paths are resolved relative to `base_url`, which is treated as
    /// a directory even without a trailing slash.
    pub fn new(
        client: reqwest::Client,
        mut base_url: Url,
        organization_id: HeaderValue,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            client,
            base_url,
            organization_id,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Bounds how long a forwarded request may take, end to end
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves a proxied path and query against the API base
    pub fn endpoint(&self, path: &str, query: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ApiError::InvalidPath)?;

        if !url.as_str().starts_with(self.base_url.as_str()) {
            return Err(ApiError::InvalidPath);
        }

        url.set_query(query);
        Ok(url)
    }

    async fn forward(
        &self,
        method: Method,
        url: Url,
        token: &AccessTokenRef,
        body: Bytes,
    ) -> Result<Response, ApiError> {
        let resp = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, authorization(token)?)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ORGANIZATION_HEADER, self.organization_id.clone())
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(ApiError::Upstream)?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));

        tracing::debug!(
            response.status = status.as_u16(),
            "received response from inventory API"
        );

        let body = resp.bytes().await.map_err(ApiError::UpstreamBody)?;

        Ok((status, [(header::CONTENT_TYPE, content_type)], body).into_response())
    }
}

fn authorization(token: &AccessTokenRef) -> Result<HeaderValue, ApiError> {
    let mut value = BytesMut::with_capacity(AUTHORIZATION_SCHEME.len() + token.as_str().len());
    value.put_slice(AUTHORIZATION_SCHEME);
    value.put_slice(token.as_str().as_bytes());

    let mut value = HeaderValue::from_maybe_shared(value.freeze()).map_err(|_| {
        tracing::error!("access token contains bytes not allowed in a header");
        ApiError::UnusableToken
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Proxies `/zoho/{path}` to the inventory API with a valid access token
///
/// No request is forwarded unless a token could be obtained.
#[tracing::instrument(skip_all, fields(%method, path = %path))]
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = state.tokens.access_token().await?;
    let url = state.inventory.endpoint(&path, query.as_deref())?;

    state.inventory.forward(method, url, &token, body).await
}
