//! REST client for the bookshop backend.
//!
//! One [`ApiClient`] serves all four remote collaborators (cart, orders,
//! catalog, auth) plus the admin endpoints. Calls that need a user take the
//! [`Session`] explicitly; catalog reads and sign-in/sign-up are public.
//!
//! The cart manager, checkout flow and order history depend on the
//! [`CartStore`], [`OrderStore`] and [`ProfileStore`] traits rather than on
//! the client itself, so test doubles plug in at the same seam.
//!
//! Catalog reads are cached with `moka` (TTL from config). Cart and order
//! calls are never cached.

mod admin;
mod auth;
mod cache;
mod cart;
mod catalog;
mod orders;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::error::ApiError;
use crate::session::{Session, SessionHandle};

pub use auth::ProfileStore;
pub use cart::CartStore;
pub use orders::OrderStore;
pub use types::*;

use cache::{CacheKey, CacheValue};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest plain-text error body surfaced as a message.
const MAX_PLAIN_MESSAGE_LEN: usize = 200;

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the bookshop REST backend.
///
/// Cheap to clone; clones share the connection pool, catalog cache and
/// session handle.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    session: SessionHandle,
    cache: Option<Cache<CacheKey, CacheValue>>,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// A 401 on an authenticated call expires the matching session in
    /// `session`.
    #[must_use]
    pub fn new(config: &StorefrontConfig, session: SessionHandle) -> Self {
        let cache = config.catalog_cache_ttl.map(|ttl| {
            Cache::builder()
                .max_capacity(1000)
                .time_to_live(ttl)
                .build()
        });

        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
                timeout: config.request_timeout,
                session,
                cache,
            }),
        }
    }

    /// The session handle this client reports authentication failures to.
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and return the successful response.
    ///
    /// `session` is `None` for public endpoints, which carry no token and
    /// never affect the shared session.
    async fn send(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, %method, path, "Sending request");

        let mut request = self
            .inner
            .client
            .request(method, self.url(path))
            .timeout(self.inner.timeout)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(session) = session {
            request = request.header(reqwest::header::AUTHORIZATION, session.bearer());
        }

        let response = build(request).send().await.map_err(|e| {
            tracing::warn!(%request_id, path, error = %e, "No response received");
            ApiError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED
            && let Some(session) = session
        {
            self.inner.session.expire(session);
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            %request_id,
            path,
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "Backend returned non-success status"
        );
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message: extract_message(&body),
        })
    }

    /// Send a request and decode its JSON body.
    async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, session, build).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                path,
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to decode backend response"
            );
            ApiError::from(e)
        })
    }

    /// Send a request whose response body is not needed.
    async fn fetch_empty(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<(), ApiError> {
        self.send(method, path, session, build).await.map(drop)
    }
}

/// Pull a user-facing message out of an error body.
///
/// Prefers the JSON `message` field; otherwise a short plain-text body is
/// used as-is. HTML error pages and other JSON shapes yield `None`.
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let message = match &value {
            serde_json::Value::Object(map) => map.get("message").and_then(|m| m.as_str()),
            serde_json::Value::String(s) => Some(s.as_str()),
            _ => None,
        };
        return message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from);
    }

    if trimmed.starts_with('<') || trimmed.chars().count() > MAX_PLAIN_MESSAGE_LEN {
        return None;
    }
    Some(trimmed.to_string())
}
