//! Application state shared across front-ends.

use std::sync::Arc;

use bazaar_core::{CollectionKind, CurrencyCode};

use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::controller::MutationController;
use crate::remote::{ApiError, RestClient};
use crate::session::Session;
use crate::views::CollectionView;

/// Application state wiring the REST client, catalog and controller together.
///
/// This struct is cheaply cloneable via `Arc`; clones share the session,
/// the stores and the product cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Catalog<RestClient>,
    controller: MutationController<RestClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The session starts signed in when the configuration carries a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let session = config
            .session_token
            .clone()
            .map_or_else(Session::anonymous, Session::with_token);
        let client = Arc::new(RestClient::new(&config, session.clone())?);
        let catalog = Catalog::new(Arc::clone(&client), config.catalog_ttl);
        let controller = MutationController::new(client, session, config.sync);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                controller,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cached product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog<RestClient> {
        &self.inner.catalog
    }

    /// Get a reference to the mutation controller.
    #[must_use]
    pub fn controller(&self) -> &MutationController<RestClient> {
        &self.inner.controller
    }

    /// Get a reference to the current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        self.inner.controller.session()
    }

    /// Display data for the current local copy of a collection.
    #[must_use]
    pub fn view(&self, kind: CollectionKind) -> CollectionView {
        let currency: CurrencyCode = self.inner.config.currency;
        self.inner
            .controller
            .store(kind)
            .read(|collection| CollectionView::new(collection, currency))
    }
}
