//! Integration test support for the Bazaar storefront client.
//!
//! [`FakeBackend`] is an in-memory stand-in for the REST backend. It owns the
//! authoritative cart and wishlist, applies writes the way the real backend
//! does, records every call, and can be scripted to fail or to hold writes
//! until a test releases them.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bazaar_core::{
    Collection, CollectionKind, Decremented, OnExisting, ProductId, ProductSnapshot,
};
use bazaar_storefront::config::{SyncConfig, WriteOrdering};
use bazaar_storefront::controller::MutationController;
use bazaar_storefront::remote::{Ack, ApiError, RemoteCatalog, RemoteCollection};
use bazaar_storefront::session::Session;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::Semaphore;

/// A request received by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(CollectionKind),
    Add(CollectionKind, ProductId),
    Increment(ProductId),
    RemoveUnit(CollectionKind, ProductId),
    MoveToCart(ProductId),
    Product(ProductId),
}

impl Call {
    /// Whether this call changes server state.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::Fetch(_) | Self::Product(_))
    }
}

/// A scripted failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Non-success status with a message body.
    Status(u16, String),
    /// The backend is unreachable.
    Network,
}

impl Failure {
    fn into_error(self) -> ApiError {
        match self {
            Self::Status(status, message) => ApiError::Status { status, message },
            Self::Network => ApiError::Connection("connection refused".to_string()),
        }
    }
}

#[derive(Default)]
struct BackendState {
    products: HashMap<ProductId, ProductSnapshot>,
    cart: Option<Collection>,
    wishlist: Option<Collection>,
    calls: Vec<Call>,
    /// Outcome of upcoming writes; `None` lets a write through.
    write_script: VecDeque<Option<Failure>>,
    fetch_failures: VecDeque<Failure>,
}

impl BackendState {
    fn collection_mut(&mut self, kind: CollectionKind) -> &mut Collection {
        let slot = match kind {
            CollectionKind::Cart => &mut self.cart,
            CollectionKind::Wishlist => &mut self.wishlist,
        };
        slot.get_or_insert_with(|| Collection::empty(kind))
    }

    fn product(&self, product_id: &ProductId) -> Result<ProductSnapshot, ApiError> {
        self.products
            .get(product_id)
            .cloned()
            .ok_or_else(|| not_found("Product not found"))
    }
}

fn not_found(message: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        message: message.to_string(),
    }
}

/// In-memory backend implementing [`RemoteCollection`] and [`RemoteCatalog`].
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeBackend {
    /// An empty backend with no products.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a product in the catalog.
    #[must_use]
    pub fn with_product(self, id: &str, title: &str, price: i64) -> Self {
        let product = ProductSnapshot {
            id: ProductId::new(id),
            title: title.to_string(),
            unit_price: Decimal::from(price),
            image: None,
        };
        self.state().products.insert(product.id.clone(), product);
        self
    }

    /// Seed the server-side cart with `quantity` units of a known product.
    ///
    /// # Panics
    ///
    /// Panics if the product was not registered.
    #[must_use]
    pub fn with_cart_item(self, id: &str, quantity: u32) -> Self {
        {
            let mut state = self.state();
            let product = state
                .product(&ProductId::new(id))
                .unwrap_or_else(|_| panic!("unknown product {id}"));
            let cart = state.collection_mut(CollectionKind::Cart);
            for _ in 0..quantity {
                cart.insert(&product, OnExisting::Increment);
            }
        }
        self
    }

    /// Seed the server-side wishlist with a known product.
    ///
    /// # Panics
    ///
    /// Panics if the product was not registered.
    #[must_use]
    pub fn with_wishlist_item(self, id: &str) -> Self {
        {
            let mut state = self.state();
            let product = state
                .product(&ProductId::new(id))
                .unwrap_or_else(|_| panic!("unknown product {id}"));
            state
                .collection_mut(CollectionKind::Wishlist)
                .insert(&product, OnExisting::Ignore);
        }
        self
    }

    /// Fail the next unscripted write with `failure`.
    ///
    /// Scripted outcomes are consumed one per write, in order.
    pub fn fail_next_write(&self, failure: Failure) {
        self.state().write_script.push_back(Some(failure));
    }

    /// Let the next unscripted write succeed (used before a scripted failure).
    pub fn pass_next_write(&self) {
        self.state().write_script.push_back(None);
    }

    /// Fail the next fetch with `failure`.
    pub fn fail_next_fetch(&self, failure: Failure) {
        self.state().fetch_failures.push_back(failure);
    }

    /// Make writes wait until released with [`Self::release_writes`].
    pub fn hold_writes(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held writes proceed, in arrival order.
    pub fn release_writes(&self, n: usize) {
        if let Some(gate) = self.gate.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            gate.add_permits(n);
        }
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Write calls received so far.
    #[must_use]
    pub fn writes(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    /// The authoritative copy of a collection.
    #[must_use]
    pub fn server_collection(&self, kind: CollectionKind) -> Collection {
        self.state().collection_mut(kind).clone()
    }

    /// Wait until at least `n` writes have arrived.
    ///
    /// # Panics
    ///
    /// Panics if they do not arrive within a second.
    pub async fn wait_for_writes(&self, n: usize) {
        for _ in 0..200 {
            if self.writes().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {n} writes, got {:?}", self.writes());
    }

    async fn write(
        &self,
        call: Call,
        apply: impl FnOnce(&mut BackendState) -> Result<(), ApiError>,
    ) -> Result<Ack, ApiError> {
        self.state().calls.push(call);

        let gate = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| ApiError::Connection(e.to_string()))?
                .forget();
        }

        let mut state = self.state();
        if let Some(failure) = state.write_script.pop_front().flatten() {
            return Err(failure.into_error());
        }
        apply(&mut state)?;
        Ok(Ack {
            message: Some("ok".to_string()),
        })
    }
}

impl RemoteCollection for FakeBackend {
    async fn fetch(&self, kind: CollectionKind) -> Result<Collection, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::Fetch(kind));
        if let Some(failure) = state.fetch_failures.pop_front() {
            return Err(failure.into_error());
        }
        Ok(state.collection_mut(kind).clone())
    }

    async fn write_add(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> Result<Ack, ApiError> {
        self.write(Call::Add(kind, product_id.clone()), |state| {
            let product = state.product(product_id)?;
            let on_existing = if kind.has_quantity() {
                OnExisting::Increment
            } else {
                OnExisting::Ignore
            };
            state.collection_mut(kind).insert(&product, on_existing);
            Ok(())
        })
        .await
    }

    async fn write_increment(&self, product_id: &ProductId) -> Result<Ack, ApiError> {
        self.write(Call::Increment(product_id.clone()), |state| {
            if state.collection_mut(CollectionKind::Cart).increment(product_id) {
                Ok(())
            } else {
                Err(not_found("Product not found in cart"))
            }
        })
        .await
    }

    async fn write_remove_unit(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> Result<Ack, ApiError> {
        self.write(Call::RemoveUnit(kind, product_id.clone()), |state| {
            let collection = state.collection_mut(kind);
            let found = if kind.has_quantity() {
                collection.decrement(product_id) != Decremented::Absent
            } else {
                collection.remove(product_id).is_some()
            };
            if found {
                Ok(())
            } else {
                Err(not_found("Product not found"))
            }
        })
        .await
    }

    async fn write_move_to_cart(&self, product_id: &ProductId) -> Result<Ack, ApiError> {
        self.write(Call::MoveToCart(product_id.clone()), |state| {
            if state
                .collection_mut(CollectionKind::Wishlist)
                .remove(product_id)
                .is_none()
            {
                return Err(not_found("Product not found in wishlist"));
            }
            let product = state.product(product_id)?;
            state
                .collection_mut(CollectionKind::Cart)
                .insert(&product, OnExisting::Increment);
            Ok(())
        })
        .await
    }
}

impl RemoteCatalog for FakeBackend {
    async fn product(&self, product_id: &ProductId) -> Result<ProductSnapshot, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::Product(product_id.clone()));
        state.product(product_id)
    }
}

/// Poll a future exactly once.
///
/// Returns `None` if it is still pending, which lets a test inspect state
/// while a write is held.
pub async fn poll_once<F: Future + Unpin>(future: &mut F) -> Option<F::Output> {
    tokio::select! {
        biased;
        output = future => Some(output),
        () = std::future::ready(()) => None,
    }
}

/// A signed-in controller over `backend`.
#[must_use]
pub fn signed_in(
    backend: &Arc<FakeBackend>,
    ordering: WriteOrdering,
) -> MutationController<FakeBackend> {
    let session = Session::with_token(SecretString::from("test-session-token".to_string()));
    controller(backend, session, ordering)
}

/// An anonymous controller over `backend`.
#[must_use]
pub fn anonymous(backend: &Arc<FakeBackend>) -> MutationController<FakeBackend> {
    controller(backend, Session::anonymous(), WriteOrdering::Concurrent)
}

fn controller(
    backend: &Arc<FakeBackend>,
    session: Session,
    write_ordering: WriteOrdering,
) -> MutationController<FakeBackend> {
    let sync = SyncConfig {
        refetch_on_success: true,
        write_ordering,
    };
    MutationController::new(Arc::clone(backend), session, sync)
}

/// Look up a registered product.
///
/// # Panics
///
/// Panics if the product was not registered.
#[must_use]
pub fn product(backend: &FakeBackend, id: &str) -> ProductSnapshot {
    backend
        .state()
        .product(&ProductId::new(id))
        .unwrap_or_else(|_| panic!("unknown product {id}"))
}
