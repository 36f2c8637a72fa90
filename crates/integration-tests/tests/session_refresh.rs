//! Sign-in, sign-out and full refreshes.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use bazaar_core::{CollectionKind, ProductId};
use bazaar_integration_tests::{
    Call, FakeBackend, Failure, anonymous, poll_once, product, signed_in,
};
use bazaar_storefront::config::WriteOrdering;
use bazaar_storefront::error::{FetchError, MutationError};
use rust_decimal::Decimal;
use secrecy::SecretString;

fn backend() -> Arc<FakeBackend> {
    Arc::new(
        FakeBackend::new()
            .with_product("P1", "Phone", 100)
            .with_product("P2", "Watch", 1999)
            .with_cart_item("P1", 2)
            .with_wishlist_item("P2"),
    )
}

#[tokio::test]
async fn test_sign_in_loads_both_collections() {
    let backend = backend();
    let controller = anonymous(&backend);

    let (cart, wishlist) = controller
        .sign_in(SecretString::from("fresh-session-token".to_string()))
        .await
        .unwrap();

    assert!(controller.session().is_authenticated());
    assert_eq!(cart.total_price(), Decimal::from(200));
    assert!(wishlist.contains(&ProductId::new("P2")));
    assert_eq!(controller.store(CollectionKind::Cart).get(), cart);
    assert_eq!(controller.store(CollectionKind::Wishlist).get(), wishlist);
}

#[tokio::test]
async fn test_sign_out_discards_local_state() {
    let backend = backend();
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh_all().await.unwrap();

    controller.sign_out();

    assert!(!controller.session().is_authenticated());
    assert!(controller.store(CollectionKind::Cart).get().is_empty());
    assert!(controller.store(CollectionKind::Wishlist).get().is_empty());
    assert_eq!(
        controller
            .add_to_cart(&product(&backend, "P1"))
            .await
            .unwrap_err(),
        MutationError::NotAuthenticated
    );
}

#[tokio::test]
async fn test_failed_write_after_sign_out_keeps_stores_cleared() {
    let backend = backend();
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh_all().await.unwrap();
    backend.hold_writes();
    backend.fail_next_write(Failure::Status(401, "Unauthorized".to_string()));

    let p1 = ProductId::new("P1");
    let mut increment = Box::pin(controller.increment(&p1));
    assert!(poll_once(&mut increment).await.is_none());
    assert_eq!(
        controller.store(CollectionKind::Cart).get().total_price(),
        Decimal::from(300)
    );

    controller.sign_out();
    backend.release_writes(1);
    assert!(increment.await.is_err());

    assert!(!controller.session().is_authenticated());
    assert!(controller.store(CollectionKind::Cart).get().is_empty());
    assert!(controller.store(CollectionKind::Wishlist).get().is_empty());
}

#[tokio::test]
async fn test_confirmed_write_after_sign_out_skips_refetch() {
    let backend = backend();
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    controller.refresh_all().await.unwrap();
    backend.hold_writes();

    let p1 = ProductId::new("P1");
    let mut increment = Box::pin(controller.increment(&p1));
    assert!(poll_once(&mut increment).await.is_none());

    controller.sign_out();
    backend.release_writes(1);
    let cart = increment.await.unwrap();

    assert!(cart.is_empty());
    assert!(controller.store(CollectionKind::Cart).get().is_empty());
    assert_eq!(backend.calls().last(), Some(&Call::Increment(p1)));
}

#[tokio::test]
async fn test_anonymous_refresh_is_rejected() {
    let backend = backend();
    let controller = anonymous(&backend);

    assert_eq!(
        controller.refresh(CollectionKind::Cart).await.unwrap_err(),
        FetchError::NotAuthenticated
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_all_keeps_both_stores() {
    let backend = backend();
    let controller = signed_in(&backend, WriteOrdering::Concurrent);
    let (cart, wishlist) = controller.refresh_all().await.unwrap();

    backend.fail_next_fetch(Failure::Network);
    let err = controller.refresh_all().await.unwrap_err();

    assert!(matches!(err, FetchError::Network(_)));
    assert_eq!(controller.store(CollectionKind::Cart).get(), cart);
    assert_eq!(controller.store(CollectionKind::Wishlist).get(), wishlist);
}

#[tokio::test]
async fn test_refresh_maps_backend_errors() {
    let backend = backend();
    let controller = signed_in(&backend, WriteOrdering::Concurrent);

    backend.fail_next_fetch(Failure::Status(500, "Internal Server Error".to_string()));
    assert_eq!(
        controller.refresh(CollectionKind::Wishlist).await.unwrap_err(),
        FetchError::Remote("Internal Server Error".to_string())
    );
    assert!(controller.store(CollectionKind::Wishlist).get().is_empty());
}
