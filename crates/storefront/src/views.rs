//! Read-side view data derived from collection snapshots.
//!
//! Views never mutate anything. They are recomputed whenever a store
//! publishes a new snapshot.

use bazaar_core::{Collection, CollectionKind, CurrencyCode, LineItem, Price, ProductId};
use rust_decimal::Decimal;
use serde::Serialize;

/// Line item display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItemView {
    pub product_id: String,
    pub title: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Collection display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionView {
    pub kind: CollectionKind,
    pub items: Vec<LineItemView>,
    pub total: String,
    /// Distinct lines, shown in the header badge.
    pub item_count: usize,
    pub total_quantity: u64,
    /// Empty-state condition.
    pub is_empty: bool,
}

impl CollectionView {
    /// Build display data for a snapshot.
    #[must_use]
    pub fn new(collection: &Collection, currency: CurrencyCode) -> Self {
        Self {
            kind: collection.kind(),
            items: collection
                .items()
                .iter()
                .map(|item| LineItemView::new(item, currency))
                .collect(),
            total: format_price(collection.total_price(), currency),
            item_count: collection.len(),
            total_quantity: collection.total_quantity(),
            is_empty: collection.is_empty(),
        }
    }

    /// Message shown in place of an empty collection.
    #[must_use]
    pub const fn empty_message(&self) -> &'static str {
        match self.kind {
            CollectionKind::Cart => "Your cart is empty!",
            CollectionKind::Wishlist => "Your wishlist is empty!",
        }
    }

    /// Badge count, hidden when zero.
    #[must_use]
    pub const fn badge(&self) -> Option<usize> {
        if self.item_count == 0 {
            None
        } else {
            Some(self.item_count)
        }
    }
}

impl LineItemView {
    fn new(item: &LineItem, currency: CurrencyCode) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            title: item
                .title
                .clone()
                .unwrap_or_else(|| item.product_id.to_string()),
            quantity: item.quantity,
            price: format_price(item.unit_price, currency),
            line_price: format_price(item.line_total(), currency),
            image: item.image.clone(),
        }
    }
}

/// Format an amount as a price string (e.g. "₹199.00").
#[must_use]
pub fn format_price(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}

/// Whether the heart icon for a product should be filled.
#[must_use]
pub fn is_wishlisted(wishlist: &Collection, product_id: &ProductId) -> bool {
    wishlist.contains(product_id)
}
