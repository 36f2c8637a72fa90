//! Optimistic cart mutations against the in-memory backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use bazaar_core::{CollectionKind, CurrencyCode, ProductId};
use bazaar_integration_tests::{Call, FakeBackend, Failure, poll_once, product, signed_in};
use bazaar_storefront::config::WriteOrdering;
use bazaar_storefront::error::MutationError;
use bazaar_storefront::notice::NoticeKind;
use bazaar_storefront::views::CollectionView;
use rust_decimal::Decimal;

const CART: CollectionKind = CollectionKind::Cart;

fn p(id: &str) -> ProductId {
    ProductId::new(id)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_failed_increment_reverts_to_exact_snapshot() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_cart_item("P1", 2),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    let before = controller.refresh(CART).await.unwrap();
    assert_eq!(before.total_price(), Decimal::from(200));

    let mut notices = controller.subscribe_notices();
    backend.hold_writes();
    backend.fail_next_write(Failure::Status(400, "Out of stock".to_string()));

    let p1 = p("P1");
    let mut increment = Box::pin(controller.increment(&p1));
    assert!(poll_once(&mut increment).await.is_none());

    // Tentative state is visible while the write is in flight
    let tentative = controller.store(CART).get();
    assert_eq!(tentative.get(&p1).unwrap().quantity, 3);
    assert_eq!(tentative.total_price(), Decimal::from(300));

    backend.release_writes(1);
    let err = increment.await.unwrap_err();
    assert_eq!(err, MutationError::RemoteWrite("Out of stock".to_string()));

    assert_eq!(controller.store(CART).get(), before);

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.kind, NoticeKind::Failure);
    assert_eq!(notice.message, "Out of stock");
    assert!(notices.try_recv().is_err());

    // No refetch after a failed write
    assert_eq!(
        backend.calls(),
        vec![Call::Fetch(CART), Call::Increment(p1)]
    );
}

#[tokio::test]
async fn test_decrement_last_unit_empties_cart() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Mug", 50)
            .with_cart_item("P1", 1),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();
    let mut notices = controller.subscribe_notices();

    backend.hold_writes();
    let p1 = p("P1");
    let mut decrement = Box::pin(controller.decrement(&p1));
    assert!(poll_once(&mut decrement).await.is_none());

    let tentative = controller.store(CART).get();
    assert!(tentative.is_empty());
    assert_eq!(tentative.total_price(), Decimal::ZERO);

    backend.release_writes(1);
    let cart = decrement.await.unwrap();
    assert!(cart.is_empty());
    assert!(backend.server_collection(CART).is_empty());

    // Confirmed by a refetch after the write
    assert_eq!(backend.calls().last(), Some(&Call::Fetch(CART)));

    let view = CollectionView::new(&controller.store(CART).get(), CurrencyCode::INR);
    assert!(view.is_empty);
    assert_eq!(view.empty_message(), "Your cart is empty!");

    assert_eq!(notices.try_recv().unwrap().message, "Quantity decreased");
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_totals_match_lines_after_mixed_sequence() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_product("P2", "Case", 30)
            .with_cart_item("P1", 1),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();

    controller.add_to_cart(&product(&backend, "P2")).await.unwrap();
    controller.increment(&p("P1")).await.unwrap();
    controller.increment(&p("P2")).await.unwrap();
    let cart = controller.decrement(&p("P1")).await.unwrap();

    assert_eq!(cart.get(&p("P1")).unwrap().quantity, 1);
    assert_eq!(cart.get(&p("P2")).unwrap().quantity, 2);
    assert_eq!(cart.total_price(), Decimal::from(160));
    assert!(cart.is_consistent());
    assert_eq!(cart, backend.server_collection(CART));
}

#[tokio::test]
async fn test_decrement_never_leaves_zero_quantity_lines() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_cart_item("P1", 2),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();

    controller.decrement(&p("P1")).await.unwrap();
    let cart = controller.decrement(&p("P1")).await.unwrap();

    assert!(cart.items().iter().all(|item| item.quantity > 0));
    assert!(!cart.contains(&p("P1")));
}

#[tokio::test]
async fn test_remove_absent_product_is_noop() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_cart_item("P1", 1),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    let before = controller.refresh(CART).await.unwrap();
    let mut notices = controller.subscribe_notices();

    let after = controller.remove_item(CART, &p("P9")).await.unwrap();
    assert_eq!(after, before);
    let after = controller.decrement(&p("P9")).await.unwrap();
    assert_eq!(after, before);

    assert!(backend.writes().is_empty());
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_increment_absent_product_fails_without_write() {
    let backend = Arc::new(FakeBackend::new().with_product("P1", "Phone", 100));
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    let mut notices = controller.subscribe_notices();

    let err = controller.increment(&p("P1")).await.unwrap_err();
    assert_eq!(
        err,
        MutationError::NotInCollection {
            kind: CART,
            product_id: p("P1"),
        }
    );
    assert!(backend.writes().is_empty());

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.kind, NoticeKind::Failure);
    assert_eq!(notice.message, "Error while adding the product");
}

// =============================================================================
// Add / Remove
// =============================================================================

#[tokio::test]
async fn test_add_existing_product_increments() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_cart_item("P1", 1),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();
    let mut notices = controller.subscribe_notices();

    let cart = controller.add_to_cart(&product(&backend, "P1")).await.unwrap();

    assert_eq!(cart.get(&p("P1")).unwrap().quantity, 2);
    assert_eq!(backend.writes(), vec![Call::Add(CART, p("P1"))]);
    assert_eq!(notices.try_recv().unwrap().message, "Product added to cart");
}

#[tokio::test]
async fn test_network_failure_reverts_add() {
    let backend = Arc::new(FakeBackend::new().with_product("P1", "Phone", 100));
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    let mut notices = controller.subscribe_notices();
    backend.fail_next_write(Failure::Network);

    let err = controller
        .add_to_cart(&product(&backend, "P1"))
        .await
        .unwrap_err();

    assert!(matches!(err, MutationError::Network(_)));
    assert!(err.is_remote());
    assert!(controller.store(CART).get().is_empty());
    assert_eq!(notices.try_recv().unwrap().message, "Error adding to cart");
}

#[tokio::test]
async fn test_remove_cart_line_sends_one_call_per_unit() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_product("P2", "Case", 30)
            .with_cart_item("P1", 3)
            .with_cart_item("P2", 1),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();
    let mut notices = controller.subscribe_notices();

    let cart = controller.remove_item(CART, &p("P1")).await.unwrap();

    assert!(!cart.contains(&p("P1")));
    assert_eq!(cart.total_price(), Decimal::from(30));
    assert_eq!(backend.writes(), vec![Call::RemoveUnit(CART, p("P1")); 3]);
    assert_eq!(cart, backend.server_collection(CART));

    assert_eq!(notices.try_recv().unwrap().message, "Product removed from cart");
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_partial_remove_resyncs_from_server() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_cart_item("P1", 3),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();
    let mut notices = controller.subscribe_notices();

    backend.pass_next_write();
    backend.fail_next_write(Failure::Status(500, "Internal Server Error".to_string()));

    let err = controller.remove_item(CART, &p("P1")).await.unwrap_err();
    assert_eq!(
        err,
        MutationError::RemoteWrite("Internal Server Error".to_string())
    );

    // One unit went through, so the local copy follows the server
    let cart = controller.store(CART).get();
    assert_eq!(cart.get(&p("P1")).unwrap().quantity, 2);
    assert_eq!(cart, backend.server_collection(CART));

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.kind, NoticeKind::Failure);
    assert_eq!(notice.message, "Internal Server Error");
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_failed_refetch_keeps_tentative_state() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_cart_item("P1", 1),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();
    let mut notices = controller.subscribe_notices();

    backend.fail_next_fetch(Failure::Network);
    let cart = controller.increment(&p("P1")).await.unwrap();

    assert_eq!(cart.get(&p("P1")).unwrap().quantity, 2);
    assert_eq!(cart, backend.server_collection(CART));
    assert_eq!(notices.try_recv().unwrap().kind, NoticeKind::Success);
}

#[tokio::test]
async fn test_store_subscribers_see_tentative_and_confirmed_snapshots() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_cart_item("P1", 1),
    );
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();

    let mut updates = controller.store(CART).subscribe();
    updates.borrow_and_update();

    backend.hold_writes();
    let p1 = p("P1");
    let mut increment = Box::pin(controller.increment(&p1));
    assert!(poll_once(&mut increment).await.is_none());

    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().get(&p1).unwrap().quantity, 2);

    backend.release_writes(1);
    increment.await.unwrap();
    assert!(updates.has_changed().unwrap());
}

// =============================================================================
// Overlapping Mutations
// =============================================================================

fn two_line_backend() -> Arc<FakeBackend> {
    Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_product("P2", "Case", 10)
            .with_cart_item("P1", 2)
            .with_cart_item("P2", 1),
    )
}

#[tokio::test]
async fn test_overlapping_failures_on_different_products_both_revert() {
    let backend = two_line_backend();
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    let before = controller.refresh(CART).await.unwrap();
    assert_eq!(before.total_price(), Decimal::from(210));

    backend.hold_writes();
    backend.fail_next_write(Failure::Status(400, "Out of stock".to_string()));
    backend.fail_next_write(Failure::Status(400, "Out of stock".to_string()));

    let (p1, p2) = (p("P1"), p("P2"));
    let mut first = Box::pin(controller.increment(&p1));
    assert!(poll_once(&mut first).await.is_none());
    let mut second = Box::pin(controller.increment(&p2));
    assert!(poll_once(&mut second).await.is_none());
    assert_eq!(controller.store(CART).get().total_price(), Decimal::from(320));

    backend.release_writes(2);
    let (first, second) = tokio::join!(first, second);
    assert!(first.unwrap_err().is_remote());
    assert!(second.unwrap_err().is_remote());

    let cart = controller.store(CART).get();
    assert_eq!(cart, before);
    assert_eq!(cart, backend.server_collection(CART));
    assert!(cart.is_consistent());
}

#[tokio::test]
async fn test_failure_keeps_other_products_tentative_change() {
    let backend = two_line_backend();
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh(CART).await.unwrap();

    backend.hold_writes();
    backend.fail_next_write(Failure::Network);

    let (p1, p2) = (p("P1"), p("P2"));
    let mut first = Box::pin(controller.increment(&p1));
    assert!(poll_once(&mut first).await.is_none());
    let mut second = Box::pin(controller.increment(&p2));
    assert!(poll_once(&mut second).await.is_none());

    // Only the first write is let through, and it fails
    backend.release_writes(1);
    assert!(first.await.is_err());

    let cart = controller.store(CART).get();
    assert_eq!(cart.get(&p1).unwrap().quantity, 2);
    assert_eq!(cart.get(&p2).unwrap().quantity, 2);
    assert_eq!(cart.total_price(), Decimal::from(220));

    backend.release_writes(1);
    second.await.unwrap();
    assert_eq!(controller.store(CART).get(), backend.server_collection(CART));
    assert_eq!(
        controller.store(CART).get().total_price(),
        Decimal::from(220)
    );
}
