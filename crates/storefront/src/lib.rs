//! Bazaar storefront client library.
//!
//! Keeps a local copy of the signed-in customer's cart and wishlist and
//! mutates it optimistically: every change is visible immediately, sent to
//! the REST backend, then confirmed by a refetch or reverted on failure.
//!
//! # Architecture
//!
//! - [`store::CollectionStore`] holds one collection and publishes snapshots
//! - [`controller::MutationController`] runs the apply/write/resolve cycle
//! - [`remote::RestClient`] talks to the backend with `reqwest`
//! - [`catalog::Catalog`] caches product details with `moka`
//! - [`notice::Notifier`] broadcasts one user-facing notice per mutation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod notice;
pub mod remote;
pub mod session;
pub mod state;
pub mod store;
pub mod views;
