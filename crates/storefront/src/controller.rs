//! Optimistic mutation controller.
//!
//! Every cart and wishlist mutation runs the same three phases:
//!
//! 1. **Tentative apply** - the change is computed from the current snapshot
//!    and committed to the [`CollectionStore`] synchronously, before the first
//!    suspension point, so views reflect it immediately.
//! 2. **Remote write** - only the product id goes to the backend, which
//!    recomputes quantities and prices itself.
//! 3. **Resolution** - on success the collection is optionally refetched and
//!    replaced with the authoritative copy; on failure the mutated product's
//!    line is restored from the pre-mutation snapshot. Lines of other
//!    products keep whatever their own in-flight mutations did.
//!
//! A mutation that resolves after a sign-in or sign-out leaves local state
//! alone, so a signed-out customer's collections never come back.
//!
//! Each resolution emits exactly one [`Notice`] and returns the outcome as a
//! `Result`, so nothing propagates past the mutation boundary.
//!
//! # Overlapping mutations
//!
//! With [`WriteOrdering::Concurrent`] two mutations on one product race at
//! the backend; the refetch after the last resolved write is the only
//! correction. [`WriteOrdering::Serialized`] queues remote writes per
//! product (tokio mutexes are FIFO), so they reach the backend in the order
//! their tentative applies happened. Tentative applies are never queued.
//! A failed write whose line was changed again by another mutation on the
//! same product is resolved by a refetch instead of a line restore.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use bazaar_core::{
    Collection, CollectionKind, Decremented, Inserted, OnExisting, ProductId, ProductSnapshot,
};
use secrecy::SecretString;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, broadcast};
use tracing::{debug, info, instrument, warn};

use crate::config::{SyncConfig, WriteOrdering};
use crate::error::{FetchError, MutationError, add_breadcrumb};
use crate::notice::{Notice, Notifier};
use crate::remote::{Ack, ApiError, RemoteCollection};
use crate::session::Session;
use crate::store::{Applied, CollectionStore};

/// User-facing mutation kinds, used for notice texts and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Increment,
    Decrement,
    Add(CollectionKind),
    Remove(CollectionKind),
    MoveToCart,
}

impl Operation {
    const fn name(self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Decrement => "decrement",
            Self::Add(CollectionKind::Cart) => "add_to_cart",
            Self::Add(CollectionKind::Wishlist) => "add_to_wishlist",
            Self::Remove(CollectionKind::Cart) => "remove_from_cart",
            Self::Remove(CollectionKind::Wishlist) => "remove_from_wishlist",
            Self::MoveToCart => "move_to_cart",
        }
    }

    const fn success_message(self) -> &'static str {
        match self {
            Self::Increment => "Quantity increased",
            Self::Decrement => "Quantity decreased",
            Self::Add(CollectionKind::Cart) | Self::MoveToCart => "Product added to cart",
            Self::Add(CollectionKind::Wishlist) => "Added to wishlist!",
            Self::Remove(CollectionKind::Cart) => "Product removed from cart",
            Self::Remove(CollectionKind::Wishlist) => "Removed from wishlist!",
        }
    }

    const fn default_failure(self) -> &'static str {
        match self {
            Self::Increment => "Error while adding the product",
            Self::Decrement | Self::Remove(CollectionKind::Cart) => {
                "Error while removing the product"
            }
            Self::Add(CollectionKind::Cart) | Self::MoveToCart => "Error adding to cart",
            Self::Add(CollectionKind::Wishlist) | Self::Remove(CollectionKind::Wishlist) => {
                "Error updating wishlist"
            }
        }
    }

    /// Cart failures surface the backend's reason; wishlist failures do not.
    fn failure_message(self, err: &ApiError) -> String {
        match self {
            Self::Add(CollectionKind::Wishlist) | Self::Remove(CollectionKind::Wishlist) => {
                self.default_failure().to_string()
            }
            _ => err
                .server_message()
                .unwrap_or(self.default_failure())
                .to_string(),
        }
    }
}

/// A failed remote write.
struct WriteFailure {
    error: ApiError,
    /// Some units of a multi-call write already went through.
    partial: bool,
}

impl From<ApiError> for WriteFailure {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            partial: false,
        }
    }
}

/// A tentative change awaiting its remote write.
struct Tentative {
    /// Session generation the change was applied under.
    generation: u64,
    applied: Applied,
}

/// Per-product FIFO queues for serialized writes.
#[derive(Default)]
struct WriteLocks {
    locks: Mutex<HashMap<(CollectionKind, ProductId), Arc<AsyncMutex<()>>>>,
}

impl WriteLocks {
    async fn acquire(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only referenced by the map are idle
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry((kind, product_id.clone())).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Applies cart and wishlist mutations optimistically and reconciles them
/// with the backend.
pub struct MutationController<R> {
    remote: Arc<R>,
    session: Session,
    cart: CollectionStore,
    wishlist: CollectionStore,
    notifier: Notifier,
    sync: SyncConfig,
    write_locks: Arc<WriteLocks>,
}

impl<R> Clone for MutationController<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            session: self.session.clone(),
            cart: self.cart.clone(),
            wishlist: self.wishlist.clone(),
            notifier: self.notifier.clone(),
            sync: self.sync,
            write_locks: Arc::clone(&self.write_locks),
        }
    }
}

impl<R: RemoteCollection> MutationController<R> {
    /// Create a controller with fresh, empty stores.
    #[must_use]
    pub fn new(remote: Arc<R>, session: Session, sync: SyncConfig) -> Self {
        Self {
            remote,
            session,
            cart: CollectionStore::new(CollectionKind::Cart),
            wishlist: CollectionStore::new(CollectionKind::Wishlist),
            notifier: Notifier::default(),
            sync,
            write_locks: Arc::default(),
        }
    }

    /// Use externally owned stores (e.g. ones views already subscribe to).
    #[must_use]
    pub fn with_stores(mut self, cart: CollectionStore, wishlist: CollectionStore) -> Self {
        self.cart = cart;
        self.wishlist = wishlist;
        self
    }

    /// Use an externally owned notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// The session checked before every mutation.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The store for a collection kind.
    #[must_use]
    pub const fn store(&self, kind: CollectionKind) -> &CollectionStore {
        match kind {
            CollectionKind::Cart => &self.cart,
            CollectionKind::Wishlist => &self.wishlist,
        }
    }

    /// Receive a notice for every mutation resolved after this call.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    // =========================================================================
    // Cart Quantity
    // =========================================================================

    /// Add one unit of a product already in the cart.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session, `NotInCollection` when the
    /// product is not in the cart, and `RemoteWrite`/`Network` when the
    /// backend write fails (the cart is reverted).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn increment(&self, product_id: &ProductId) -> Result<Collection, MutationError> {
        let op = Operation::Increment;
        let generation = self.ensure_session(op, product_id)?;

        let Some(applied) = self.cart.apply(|cart| cart.increment(product_id)) else {
            if self.cart.read(|cart| cart.contains(product_id)) {
                debug!("Quantity at its limit, nothing to increment");
                return Ok(self.cart.get());
            }
            self.resolve(op, product_id, Notice::failure(op.default_failure()));
            return Err(MutationError::NotInCollection {
                kind: CollectionKind::Cart,
                product_id: product_id.clone(),
            });
        };
        debug!("Tentatively incremented");

        let write = async {
            self.remote
                .write_increment(product_id)
                .await
                .map_err(WriteFailure::from)
        };
        let tentative = Tentative {
            generation,
            applied,
        };
        self.commit(op, CollectionKind::Cart, product_id, tentative, write)
            .await
    }

    /// Remove one unit of a cart product, dropping the line at zero.
    ///
    /// A product that is not in the cart is left alone.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session, and `RemoteWrite`/`Network`
    /// when the backend write fails (the cart is reverted).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn decrement(&self, product_id: &ProductId) -> Result<Collection, MutationError> {
        let op = Operation::Decrement;
        let generation = self.ensure_session(op, product_id)?;

        let mut outcome = Decremented::Absent;
        let Some(applied) = self.cart.apply(|cart| {
            outcome = cart.decrement(product_id);
            outcome != Decremented::Absent
        }) else {
            debug!("Product not in cart, nothing to decrement");
            return Ok(self.cart.get());
        };
        debug!(?outcome, "Tentatively decremented");

        // Same call whether the line shrinks or disappears; the backend decides
        let write = async {
            self.remote
                .write_remove_unit(CollectionKind::Cart, product_id)
                .await
                .map_err(WriteFailure::from)
        };
        let tentative = Tentative {
            generation,
            applied,
        };
        self.commit(op, CollectionKind::Cart, product_id, tentative, write)
            .await
    }

    // =========================================================================
    // Add / Remove
    // =========================================================================

    /// Add a product to a collection.
    ///
    /// `on_existing` decides what happens when the product is already there;
    /// when that leaves the collection unchanged nothing is sent.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session (nothing is applied or sent), and
    /// `RemoteWrite`/`Network` when the backend write fails (the collection
    /// is reverted).
    #[instrument(skip(self, product), fields(kind = %kind, product_id = %product.id))]
    pub async fn add_item(
        &self,
        kind: CollectionKind,
        product: &ProductSnapshot,
        on_existing: OnExisting,
    ) -> Result<Collection, MutationError> {
        let op = Operation::Add(kind);
        let generation = self.ensure_session(op, &product.id)?;

        let store = self.store(kind);
        let mut inserted = Inserted::Unchanged;
        let Some(applied) = store.apply(|collection| {
            inserted = collection.insert(product, on_existing);
            inserted != Inserted::Unchanged
        }) else {
            debug!("Product already present, nothing to add");
            return Ok(store.get());
        };
        debug!(?inserted, "Tentatively added");

        let write = async {
            self.remote
                .write_add(kind, &product.id)
                .await
                .map_err(WriteFailure::from)
        };
        let tentative = Tentative {
            generation,
            applied,
        };
        self.commit(op, kind, &product.id, tentative, write).await
    }

    /// Add a product to the cart, or one more unit if it is already there.
    ///
    /// # Errors
    ///
    /// See [`Self::add_item`].
    pub async fn add_to_cart(
        &self,
        product: &ProductSnapshot,
    ) -> Result<Collection, MutationError> {
        self.add_item(CollectionKind::Cart, product, OnExisting::Increment)
            .await
    }

    /// Add a product to the wishlist; already present is a no-op.
    ///
    /// # Errors
    ///
    /// See [`Self::add_item`].
    pub async fn add_to_wishlist(
        &self,
        product: &ProductSnapshot,
    ) -> Result<Collection, MutationError> {
        self.add_item(CollectionKind::Wishlist, product, OnExisting::Ignore)
            .await
    }

    /// Remove a product from a collection entirely.
    ///
    /// Absent products are a no-op: no error, no state change, no request.
    /// The backend only removes cart products one unit at a time, so a cart
    /// line is removed with one call per unit. If some of those calls succeed
    /// before one fails, the cart is refetched instead of reverted.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session, and `RemoteWrite`/`Network`
    /// when a backend write fails.
    #[instrument(skip(self), fields(kind = %kind, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
    ) -> Result<Collection, MutationError> {
        let op = Operation::Remove(kind);
        let generation = self.ensure_session(op, product_id)?;

        let store = self.store(kind);
        let mut removed_units = 0;
        let Some(applied) = store.apply(|collection| match collection.remove(product_id) {
            Some(item) => {
                removed_units = item.quantity;
                true
            }
            None => false,
        }) else {
            debug!("Product not present, nothing to remove");
            return Ok(store.get());
        };
        debug!(removed_units, "Tentatively removed");

        let calls = if kind.has_quantity() { removed_units } else { 1 };
        let write = async {
            let mut ack = Ack::default();
            for call in 0..calls {
                ack = self
                    .remote
                    .write_remove_unit(kind, product_id)
                    .await
                    .map_err(|error| WriteFailure {
                        error,
                        partial: call > 0,
                    })?;
            }
            Ok(ack)
        };
        let tentative = Tentative {
            generation,
            applied,
        };
        self.commit(op, kind, product_id, tentative, write).await
    }

    /// Heart button: remove from the wishlist when present, add otherwise.
    ///
    /// # Errors
    ///
    /// See [`Self::add_item`] and [`Self::remove_item`].
    pub async fn toggle_wishlist(
        &self,
        product: &ProductSnapshot,
    ) -> Result<Collection, MutationError> {
        if self.wishlist.read(|wishlist| wishlist.contains(&product.id)) {
            self.remove_item(CollectionKind::Wishlist, &product.id)
                .await
        } else {
            self.add_to_wishlist(product).await
        }
    }

    /// Move a wishlisted product into the cart.
    ///
    /// The cart gets the tentative unit; the wishlist is left to the
    /// backend and refetched together with the cart once the move succeeds.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session, and `RemoteWrite`/`Network`
    /// when the backend write fails (the cart is reverted).
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn move_to_cart(
        &self,
        product: &ProductSnapshot,
    ) -> Result<Collection, MutationError> {
        let op = Operation::MoveToCart;
        let generation = self.ensure_session(op, &product.id)?;

        let Some(applied) = self.cart.apply(|cart| {
            cart.insert(product, OnExisting::Increment) != Inserted::Unchanged
        }) else {
            return Ok(self.cart.get());
        };

        let write = async {
            self.remote
                .write_move_to_cart(&product.id)
                .await
                .map_err(WriteFailure::from)
        };
        let tentative = Tentative {
            generation,
            applied,
        };
        self.commit(op, CollectionKind::Cart, &product.id, tentative, write)
            .await
    }

    // =========================================================================
    // Refresh / Session
    // =========================================================================

    /// Fetch one collection and replace its store.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session, `SessionChanged` when the
    /// customer signed in or out meanwhile; otherwise the fetch error. The
    /// store is untouched on error.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn refresh(&self, kind: CollectionKind) -> Result<Collection, FetchError> {
        if !self.session.is_authenticated() {
            return Err(FetchError::NotAuthenticated);
        }
        let generation = self.session.generation();

        let collection = self.remote.fetch(kind).await.map_err(|e| {
            warn!(error = %e, "Failed to fetch collection");
            FetchError::from(e)
        })?;
        if !self.session.is_current(generation) {
            debug!("Session changed during fetch, discarding result");
            return Err(FetchError::SessionChanged);
        }
        self.store(kind).replace(collection.clone());
        Ok(collection)
    }

    /// Fetch cart and wishlist concurrently and replace both stores.
    ///
    /// Either both stores are replaced or neither is.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session, `SessionChanged` when the
    /// customer signed in or out meanwhile; otherwise the first fetch error.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Result<(Collection, Collection), FetchError> {
        if !self.session.is_authenticated() {
            return Err(FetchError::NotAuthenticated);
        }
        let generation = self.session.generation();

        let (cart, wishlist) = tokio::try_join!(
            self.remote.fetch(CollectionKind::Cart),
            self.remote.fetch(CollectionKind::Wishlist)
        )
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch collections");
            FetchError::from(e)
        })?;
        if !self.session.is_current(generation) {
            debug!("Session changed during fetch, discarding result");
            return Err(FetchError::SessionChanged);
        }

        self.cart.replace(cart.clone());
        self.wishlist.replace(wishlist.clone());
        Ok((cart, wishlist))
    }

    /// Store a session token and load both collections.
    ///
    /// # Errors
    ///
    /// Returns the fetch error if loading fails; the session is kept.
    pub async fn sign_in(
        &self,
        token: SecretString,
    ) -> Result<(Collection, Collection), FetchError> {
        self.session.sign_in(token);
        add_breadcrumb("auth", "Signed in", None);
        self.refresh_all().await
    }

    /// Forget the session and discard both local collections.
    ///
    /// Mutations still in flight resolve without touching either store.
    pub fn sign_out(&self) {
        self.session.sign_out();
        self.cart.clear();
        self.wishlist.clear();
        sentry::configure_scope(|scope| scope.set_user(None));
        add_breadcrumb("auth", "Signed out", None);
        info!("Signed out, local collections cleared");
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Fail fast for anonymous callers. Returns the session generation.
    fn ensure_session(
        &self,
        op: Operation,
        product_id: &ProductId,
    ) -> Result<u64, MutationError> {
        let generation = self.session.generation();
        if self.session.is_authenticated() {
            return Ok(generation);
        }
        info!(operation = op.name(), "Sign-in required");
        self.resolve(op, product_id, Notice::sign_in_required());
        Err(MutationError::NotAuthenticated)
    }

    /// Phases 2 and 3: issue the write, then confirm or revert.
    async fn commit(
        &self,
        op: Operation,
        kind: CollectionKind,
        product_id: &ProductId,
        tentative: Tentative,
        write: impl Future<Output = Result<Ack, WriteFailure>>,
    ) -> Result<Collection, MutationError> {
        let _queue_slot = match self.sync.write_ordering {
            WriteOrdering::Serialized => Some(self.write_locks.acquire(kind, product_id).await),
            WriteOrdering::Concurrent => None,
        };

        let result = write.await;
        let current = self.session.is_current(tentative.generation);
        if !current {
            debug!(operation = op.name(), "Session changed, leaving local state alone");
        }

        match result {
            Ok(ack) => {
                debug!(operation = op.name(), message = ?ack.message, "Write confirmed");
                if current && self.sync.refetch_on_success {
                    self.reconcile(kind, tentative.generation).await;
                    if op == Operation::MoveToCart {
                        self.reconcile(CollectionKind::Wishlist, tentative.generation)
                            .await;
                    }
                }
                self.resolve(op, product_id, Notice::success(op.success_message()));
                Ok(self.store(kind).get())
            }
            Err(WriteFailure { error, partial }) => {
                warn!(
                    operation = op.name(),
                    error = %error,
                    partial,
                    "Write failed, reverting"
                );
                if current {
                    self.revert(kind, product_id, &tentative, partial).await;
                }
                self.resolve(op, product_id, Notice::failure(op.failure_message(&error)));
                Err(MutationError::from(error))
            }
        }
    }

    /// Undo a tentative change after its write failed.
    ///
    /// Only the mutated product's line goes back to its pre-mutation state.
    /// When that line moved on since the tentative apply (another mutation
    /// on the same product) or the write partly went through, the server
    /// copy is fetched instead, falling back to the line restore.
    async fn revert(
        &self,
        kind: CollectionKind,
        product_id: &ProductId,
        tentative: &Tentative,
        partial: bool,
    ) {
        let Applied { before, after } = &tentative.applied;
        let store = self.store(kind);

        let mut contended = partial;
        if !partial {
            store.apply(|current| {
                if current.get(product_id) != after.get(product_id) {
                    contended = true;
                    return false;
                }
                current.restore_line(product_id, before)
            });
        }
        if !contended || self.reconcile(kind, tentative.generation).await {
            return;
        }

        if self.session.is_current(tentative.generation) {
            store.apply(|current| current.restore_line(product_id, before));
        }
    }

    /// Replace the store with the server copy. Returns whether that happened.
    ///
    /// The copy is dropped when the session changed since `generation`.
    async fn reconcile(&self, kind: CollectionKind, generation: u64) -> bool {
        match self.remote.fetch(kind).await {
            Ok(collection) if self.session.is_current(generation) => {
                self.store(kind).replace(collection);
                true
            }
            Ok(_) => {
                debug!(kind = %kind, "Session changed during refetch, discarding result");
                false
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Refetch failed, keeping local state");
                false
            }
        }
    }

    /// Emit the single notice for a resolved mutation.
    fn resolve(&self, op: Operation, product_id: &ProductId, notice: Notice) {
        add_breadcrumb(
            "storefront",
            &notice.message,
            Some(&[
                ("operation", op.name()),
                ("product_id", product_id.as_str()),
            ]),
        );
        self.notifier.emit(notice);
    }
}
