//! Cart and wishlist collections.
//!
//! A [`Collection`] is an ordered list of [`LineItem`]s plus an aggregate
//! total. The cart and the wishlist share this model; the wishlist is
//! presence-only, so its items always have a quantity of 1.
//!
//! Every mutation here is synchronous and infallible. The storefront
//! controller uses them as the "tentative apply" step before the backend
//! confirms a write, so they must keep these invariants on their own:
//!
//! - a product appears at most once per collection,
//! - every item has `quantity >= 1` (reaching 0 removes the item),
//! - `total_price` tracks `unit_price * quantity` across all items.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use super::id::ProductId;

/// Which server-owned collection a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Cart,
    Wishlist,
}

impl CollectionKind {
    /// Lowercase name, also used as the REST path prefix.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }

    /// Whether items of this kind carry a quantity.
    #[must_use]
    pub const fn has_quantity(&self) -> bool {
        matches!(self, Self::Cart)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product data captured at the moment it is added to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    /// Product ID.
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// Unit price at the time of the snapshot.
    pub unit_price: Decimal,
    /// Image URL.
    pub image: Option<String>,
}

/// One product entry within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    /// The underlying product.
    pub product_id: ProductId,
    /// Quantity, always at least 1.
    pub quantity: u32,
    /// Price snapshot per unit. May drift from the live product price.
    pub unit_price: Decimal,
    /// Product title, when the backend supplied one.
    pub title: Option<String>,
    /// Product image URL, when the backend supplied one.
    pub image: Option<String>,
}

impl LineItem {
    /// Create a line item with quantity 1 from a product snapshot.
    #[must_use]
    pub fn from_snapshot(product: &ProductSnapshot) -> Self {
        Self {
            product_id: product.id.clone(),
            quantity: 1,
            unit_price: product.unit_price,
            title: Some(product.title.clone()),
            image: product.image.clone(),
        }
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// What [`Collection::insert`] does when the product is already present.
///
/// This is the caller's decision: the cart treats a repeated add as one more
/// unit, the wishlist ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExisting {
    /// Leave the existing item untouched.
    Ignore,
    /// Add one unit to the existing item (cart only).
    Increment,
}

/// Result of [`Collection::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// A new line was appended.
    Added,
    /// An existing line gained one unit.
    Incremented,
    /// The product was present and nothing changed.
    Unchanged,
}

/// Result of [`Collection::decrement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decremented {
    /// The product was not in the collection.
    Absent,
    /// The quantity went down by one.
    Decreased,
    /// The quantity was 1, so the line was removed.
    Removed,
}

/// An ordered set of line items plus an aggregate total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    kind: CollectionKind,
    items: Vec<LineItem>,
    total_price: Decimal,
}

impl Collection {
    /// An empty collection.
    #[must_use]
    pub const fn empty(kind: CollectionKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            total_price: Decimal::ZERO,
        }
    }

    /// Build a collection from raw items, computing the total locally.
    ///
    /// Items with a zero quantity are dropped and repeated products are
    /// merged into the first occurrence, so the result always satisfies the
    /// collection invariants. Wishlist quantities are clamped to 1.
    #[must_use]
    pub fn from_items(kind: CollectionKind, raw: impl IntoIterator<Item = LineItem>) -> Self {
        let mut items: Vec<LineItem> = Vec::new();
        for mut item in raw {
            if item.quantity == 0 {
                continue;
            }
            if !kind.has_quantity() {
                item.quantity = 1;
            }
            match items.iter_mut().find(|i| i.product_id == item.product_id) {
                Some(existing) if kind.has_quantity() => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                Some(_) => {}
                None => items.push(item),
            }
        }

        let mut collection = Self {
            kind,
            items,
            total_price: Decimal::ZERO,
        };
        collection.total_price = collection.computed_total();
        collection
    }

    /// Replace the total with a server-supplied value.
    #[must_use]
    pub const fn with_total(mut self, total_price: Decimal) -> Self {
        self.total_price = total_price;
        self
    }

    /// The kind of collection.
    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Line items in display order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// The aggregate total.
    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.total_price
    }

    /// Whether the collection has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct line items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Sum of quantities across all items.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Look up an item by product.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    /// Whether the product is present.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// `sum(unit_price * quantity)` over all items.
    #[must_use]
    pub fn computed_total(&self) -> Decimal {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Whether `total_price` agrees with the items.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total_price == self.computed_total()
    }

    fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.items.iter().position(|i| &i.product_id == product_id)
    }

    /// Add one unit of an existing item.
    ///
    /// Returns `false` if the item is absent or already at `u32::MAX`. On a
    /// wishlist this is a presence check only.
    pub fn increment(&mut self, product_id: &ProductId) -> bool {
        let has_quantity = self.kind.has_quantity();
        let Some(item) = self.items.iter_mut().find(|i| &i.product_id == product_id) else {
            return false;
        };
        if has_quantity {
            let Some(quantity) = item.quantity.checked_add(1) else {
                return false;
            };
            item.quantity = quantity;
            self.total_price += item.unit_price;
        }
        true
    }

    /// Remove one unit of an item, dropping the line when it reaches zero.
    pub fn decrement(&mut self, product_id: &ProductId) -> Decremented {
        let Some(index) = self.position(product_id) else {
            return Decremented::Absent;
        };
        let Some(item) = self.items.get_mut(index) else {
            return Decremented::Absent;
        };
        self.total_price -= item.unit_price;
        if item.quantity > 1 {
            item.quantity -= 1;
            Decremented::Decreased
        } else {
            self.items.remove(index);
            Decremented::Removed
        }
    }

    /// Insert a product, or apply `on_existing` when it is already present.
    pub fn insert(&mut self, product: &ProductSnapshot, on_existing: OnExisting) -> Inserted {
        if self.contains(&product.id) {
            return match on_existing {
                OnExisting::Increment if self.kind.has_quantity() => {
                    self.increment(&product.id);
                    Inserted::Incremented
                }
                _ => Inserted::Unchanged,
            };
        }

        let item = LineItem::from_snapshot(product);
        self.total_price += item.line_total();
        self.items.push(item);
        Inserted::Added
    }

    /// Delete the item for a product, returning it if it was present.
    pub fn remove(&mut self, product_id: &ProductId) -> Option<LineItem> {
        let index = self.position(product_id)?;
        let item = self.items.remove(index);
        self.total_price -= item.line_total();
        Some(item)
    }

    /// Make one product's line match `source`, leaving every other line
    /// alone. Returns whether anything changed.
    ///
    /// A line missing here but present in `source` is put back at its index
    /// in `source` (or appended). The total moves by the line difference.
    pub fn restore_line(&mut self, product_id: &ProductId, source: &Self) -> bool {
        let wanted = source.get(product_id);
        if self.get(product_id) == wanted {
            return false;
        }

        let current = self.position(product_id);
        if let Some(index) = current {
            let item = self.items.remove(index);
            self.total_price -= item.line_total();
        }
        if let Some(item) = wanted {
            let index = current
                .or_else(|| source.position(product_id))
                .unwrap_or(self.items.len())
                .min(self.items.len());
            self.total_price += item.line_total();
            self.items.insert(index, item.clone());
        }
        true
    }
}
