//! Remote collection client.
//!
//! # Architecture
//!
//! - [`RemoteCollection`] is the request/response boundary the controller
//!   talks to. No retry, batching or caching happens behind it.
//! - [`RemoteCatalog`] looks up product details for price snapshots.
//! - [`RestClient`] implements both against the storefront REST backend
//!   using `reqwest`.
//!
//! The backend is the sole durable owner of carts and wishlists. Writes send
//! only the product id; the backend recomputes quantities and prices.

mod rest;
mod wire;

use std::future::Future;

use bazaar_core::{Collection, CollectionKind, ProductId, ProductSnapshot};
use thiserror::Error;

pub use rest::RestClient;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend could not be reached (connect failure or timeout).
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The session token was missing, expired or refused.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// The human-readable message supplied by the backend, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } | Self::Unauthorized(message) if !message.is_empty() => {
                Some(message)
            }
            _ => None,
        }
    }
}

/// Acknowledgment of a confirmed write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    /// Message returned by the backend, if any.
    pub message: Option<String>,
}

/// Read/write access to the server-owned cart and wishlist.
pub trait RemoteCollection: Send + Sync {
    /// Fetch the authoritative copy of a collection.
    fn fetch(
        &self,
        kind: CollectionKind,
    ) -> impl Future<Output = Result<Collection, ApiError>> + Send;

    /// Add a product (one unit for the cart, presence for the wishlist).
    fn write_add(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    /// Add one unit to a product already in the cart.
    fn write_increment(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send {
        self.write_add(CollectionKind::Cart, product_id)
    }

    /// Remove one unit (the whole entry for the wishlist).
    fn write_remove_unit(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    /// Move a wishlisted product into the cart.
    fn write_move_to_cart(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;
}

/// Product detail lookups.
pub trait RemoteCatalog: Send + Sync {
    /// Fetch the current details of a product.
    fn product(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<ProductSnapshot, ApiError>> + Send;
}
