//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod collection;
pub mod id;
pub mod price;

pub use collection::{
    Collection, CollectionKind, Decremented, Inserted, LineItem, OnExisting, ProductSnapshot,
};
pub use id::*;
pub use price::{CurrencyCode, Price, UnknownCurrency};
