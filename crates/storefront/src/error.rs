//! Error types at the mutation and refresh boundaries.
//!
//! Remote failures arrive as [`ApiError`] and are folded into one of the
//! boundary errors below. Nothing here is fatal: every mutation failure ends
//! with the store restored and a notice emitted, and the error is handed back
//! to the caller as a value.

use bazaar_core::{CollectionKind, ProductId};
use thiserror::Error;

use crate::remote::ApiError;

/// Failure of a cart or wishlist mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// No active session; nothing was attempted.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The backend rejected the write (e.g. out of stock).
    #[error("Write rejected: {0}")]
    RemoteWrite(String),

    /// The request never reached the backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Increment requested for a product that is not in the collection.
    #[error("Product {product_id} is not in the {kind}")]
    NotInCollection {
        kind: CollectionKind,
        product_id: ProductId,
    },
}

impl MutationError {
    /// Whether the failure came from the remote write itself.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteWrite(_) | Self::Network(_))
    }
}

impl From<ApiError> for MutationError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { message, .. } | ApiError::Unauthorized(message) => {
                Self::RemoteWrite(message)
            }
            other => Self::Network(other.to_string()),
        }
    }
}

/// Failure of a collection refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No active session; nothing was fetched.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The backend refused the session token.
    #[error("Auth error: {0}")]
    Auth(String),

    /// The backend answered with an error.
    #[error("Remote error: {0}")]
    Remote(String),

    /// The request never reached the backend or the body was unreadable.
    #[error("Network error: {0}")]
    Network(String),

    /// The customer signed in or out while the fetch was in flight; the
    /// result was discarded.
    #[error("Session changed during fetch")]
    SessionChanged,
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) => Self::Auth(message),
            ApiError::Status { message, .. } => Self::Remote(message),
            other => Self::Network(other.to_string()),
        }
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart and
/// wishlist actions leading up to an error. Without an initialized Sentry
/// client this is a no-op.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_error_display() {
        let err = MutationError::RemoteWrite("Out of stock".to_string());
        assert_eq!(err.to_string(), "Write rejected: Out of stock");

        let err = MutationError::NotInCollection {
            kind: CollectionKind::Cart,
            product_id: ProductId::new("P1"),
        };
        assert_eq!(err.to_string(), "Product P1 is not in the cart");
    }

    #[test]
    fn test_rejections_map_to_remote_write() {
        let err = MutationError::from(ApiError::Status {
            status: 400,
            message: "Out of stock".to_string(),
        });
        assert_eq!(err, MutationError::RemoteWrite("Out of stock".to_string()));
        assert!(err.is_remote());

        let err = MutationError::from(ApiError::Unauthorized("jwt expired".to_string()));
        assert_eq!(err, MutationError::RemoteWrite("jwt expired".to_string()));
    }

    #[test]
    fn test_transport_failures_map_to_network() {
        let err = MutationError::from(ApiError::Connection("connection refused".to_string()));
        assert!(matches!(err, MutationError::Network(msg) if msg.contains("connection refused")));
        assert!(!MutationError::NotAuthenticated.is_remote());
    }

    #[test]
    fn test_fetch_error_mapping() {
        assert_eq!(
            FetchError::from(ApiError::Unauthorized("no token".to_string())),
            FetchError::Auth("no token".to_string())
        );
        assert_eq!(
            FetchError::from(ApiError::Status {
                status: 500,
                message: "boom".to_string()
            }),
            FetchError::Remote("boom".to_string())
        );
        assert!(matches!(
            FetchError::from(ApiError::Connection("timed out".to_string())),
            FetchError::Network(_)
        ));
    }
}
