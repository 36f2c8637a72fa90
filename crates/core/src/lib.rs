//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `storefront` - Cart and wishlist state kept in sync with the REST backend
//! - `cli` - Command-line driver for the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no HTTP
//! clients, no async. Collection mutations here are the synchronous
//! "tentative apply" step used by the storefront controller.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, line items and collections

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
