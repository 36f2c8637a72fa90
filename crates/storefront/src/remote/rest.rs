//! REST implementation of the remote collection client.
//!
//! Uses `reqwest` with JSON bodies. The session token, when present, is sent
//! as a bearer `Authorization` header on every request.

use std::sync::Arc;

use bazaar_core::{Collection, CollectionKind, ProductId, ProductSnapshot};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::wire::{
    Envelope, ErrorBody, ProductBody, RawCollection, RawProduct, convert_collection,
};
use super::{Ack, ApiError, RemoteCatalog, RemoteCollection};
use crate::config::StorefrontConfig;
use crate::session::Session;

/// Maximum number of body characters copied into logs.
const LOG_BODY_LIMIT: usize = 500;

/// Client for the storefront REST backend.
///
/// Cheaply cloneable; clones share the connection pool and the session.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    client: reqwest::Client,
    base: Url,
    session: Session,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.inner.base.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

/// Fetch path for a collection.
const fn fetch_path(kind: CollectionKind) -> &'static [&'static str] {
    match kind {
        CollectionKind::Cart => &["cart", "cart"],
        CollectionKind::Wishlist => &["wishlist", "wishlist"],
    }
}

/// Add path for a collection.
const fn add_path(kind: CollectionKind) -> &'static [&'static str] {
    match kind {
        CollectionKind::Cart => &["cart", "add-product"],
        CollectionKind::Wishlist => &["wishlist", "add-product"],
    }
}

/// Remove-one-unit path for a collection.
const fn remove_path(kind: CollectionKind) -> &'static [&'static str] {
    match kind {
        CollectionKind::Cart => &["cart", "remove-product"],
        CollectionKind::Wishlist => &["wishlist", "remove-product"],
    }
}

const INCREMENT_PATH: &[&str] = &["cart", "add-cartQuantity"];
const MOVE_TO_CART_PATH: &[&str] = &["cart", "add-product-wishlist-to-cart"];
const PRODUCT_DETAILS_PATH: &[&str] = &["product", "product-details"];

impl RestClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig, session: Session) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RestClientInner {
                client,
                base: config.api_url.clone(),
                session,
            }),
        })
    }

    /// The session whose token this client sends.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Build an endpoint URL under the configured base.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Execute a request and decode the response envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<ProductBody<'_>>,
    ) -> Result<Envelope<T>, ApiError> {
        let mut request = self.inner.client.request(method.clone(), url.clone());
        if let Some(authorization) = self.inner.session.authorization() {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await.map_err(classify_transport_error)?;

        if !status.is_success() {
            let message = error_message(status, &response_text);
            tracing::error!(
                %method,
                url = %url,
                status = %status,
                body = %truncate(&response_text),
                "Backend returned non-success status"
            );
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
                _ => ApiError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        if response_text.trim().is_empty() {
            return Ok(Envelope {
                message: None,
                data: None,
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&response_text),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    /// Issue a write carrying only the product id.
    async fn write(
        &self,
        method: Method,
        path: &[&str],
        product_id: &ProductId,
    ) -> Result<Ack, ApiError> {
        let url = self.endpoint(path)?;
        let body = ProductBody {
            product_id: product_id.as_str(),
        };
        let envelope: Envelope<serde_json::Value> = self.execute(method, url, Some(body)).await?;
        debug!(message = ?envelope.message, "Write acknowledged");
        Ok(Ack {
            message: envelope.message,
        })
    }
}

impl RemoteCollection for RestClient {
    #[instrument(skip(self), fields(kind = %kind))]
    async fn fetch(&self, kind: CollectionKind) -> Result<Collection, ApiError> {
        let url = self.endpoint(fetch_path(kind))?;
        match self.execute::<RawCollection>(Method::GET, url, None).await {
            Ok(envelope) => Ok(convert_collection(kind, envelope.data)),
            // The backend answers 404 until the first item is added
            Err(ApiError::Status { status: 404, .. }) => {
                debug!("No collection on the backend yet");
                Ok(Collection::empty(kind))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(kind = %kind, product_id = %product_id))]
    async fn write_add(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> Result<Ack, ApiError> {
        self.write(Method::POST, add_path(kind), product_id).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn write_increment(&self, product_id: &ProductId) -> Result<Ack, ApiError> {
        self.write(Method::POST, INCREMENT_PATH, product_id).await
    }

    #[instrument(skip(self), fields(kind = %kind, product_id = %product_id))]
    async fn write_remove_unit(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> Result<Ack, ApiError> {
        self.write(Method::DELETE, remove_path(kind), product_id).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn write_move_to_cart(&self, product_id: &ProductId) -> Result<Ack, ApiError> {
        self.write(Method::POST, MOVE_TO_CART_PATH, product_id).await
    }
}

impl RemoteCatalog for RestClient {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn product(&self, product_id: &ProductId) -> Result<ProductSnapshot, ApiError> {
        let mut path = PRODUCT_DETAILS_PATH.to_vec();
        path.push(product_id.as_str());
        let url = self.endpoint(&path)?;

        let envelope = self.execute::<RawProduct>(Method::GET, url, None).await?;
        envelope
            .data
            .map(ProductSnapshot::from)
            .ok_or_else(|| ApiError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("Product not found: {product_id}"),
            })
    }
}

/// Separate "never reached the backend" from other transport errors.
fn classify_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_connect() || err.is_timeout() {
        ApiError::Connection(err.to_string())
    } else {
        ApiError::Http(err)
    }
}

/// Pick the message shown to the user for a failed request.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map_or_else(|| format!("HTTP {status}"), ToString::to_string)
        })
}

fn truncate(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}
