//! Wire types for the REST backend and their conversion to domain types.
//!
//! Every response is wrapped as `{"message": ..., "data": ...}`. Collections
//! come back as a document with a `products` array whose `productId` is
//! usually populated with the product itself; an unpopulated reference is a
//! bare id string. A missing or null `data` means the customer has no cart
//! or wishlist yet.

use bazaar_core::{Collection, CollectionKind, LineItem, ProductId, ProductSnapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Response envelope.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub(super) fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}

/// Request body for every write.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProductBody<'a> {
    pub product_id: &'a str,
}

/// A product document.
#[derive(Debug, Deserialize)]
pub(super) struct RawProduct {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
}

impl From<RawProduct> for ProductSnapshot {
    fn from(raw: RawProduct) -> Self {
        Self {
            id: ProductId::new(raw.id),
            title: raw.title.unwrap_or_default(),
            unit_price: raw.price.unwrap_or_default(),
            image: raw.image,
        }
    }
}

/// `productId` is either populated or a bare reference.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawProductRef {
    Populated(RawProduct),
    Id(String),
}

/// One entry of a collection's `products` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawLine {
    pub product_id: RawProductRef,
    pub quantity: Option<u32>,
    pub price: Option<Decimal>,
}

/// A cart or wishlist document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawCollectionDoc {
    #[serde(default)]
    pub products: Vec<RawLine>,
    pub total_price: Option<Decimal>,
}

/// Collection payload: a document, or an empty list when nothing exists yet.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawCollection {
    Doc(RawCollectionDoc),
    Lines(Vec<RawLine>),
}

fn convert_line(raw: RawLine) -> LineItem {
    let (product_id, product_price, title, image) = match raw.product_id {
        RawProductRef::Populated(product) => {
            (product.id, product.price, product.title, product.image)
        }
        RawProductRef::Id(id) => (id, None, None, None),
    };

    LineItem {
        product_id: ProductId::new(product_id),
        quantity: raw.quantity.unwrap_or(1),
        // Cart lines snapshot the price when added; wishlist lines only
        // carry the live product price.
        unit_price: raw.price.or(product_price).unwrap_or_default(),
        title,
        image,
    }
}

/// Convert a collection payload into a domain collection.
///
/// A server-supplied `totalPrice` wins over the locally computed total.
pub(super) fn convert_collection(kind: CollectionKind, raw: Option<RawCollection>) -> Collection {
    match raw {
        None => Collection::empty(kind),
        Some(RawCollection::Lines(lines)) => {
            Collection::from_items(kind, lines.into_iter().map(convert_line))
        }
        Some(RawCollection::Doc(doc)) => {
            let collection =
                Collection::from_items(kind, doc.products.into_iter().map(convert_line));
            match doc.total_price {
                Some(total) if kind.has_quantity() => collection.with_total(total),
                _ => collection,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn decode(kind: CollectionKind, json: &str) -> Collection {
        let envelope: Envelope<RawCollection> = serde_json::from_str(json).unwrap();
        convert_collection(kind, envelope.data)
    }

    #[test]
    fn test_decode_populated_cart() {
        let cart = decode(
            CollectionKind::Cart,
            r#"{
                "message": "cart fetched",
                "data": {
                    "_id": "c1",
                    "userId": "u1",
                    "products": [
                        {
                            "productId": {
                                "_id": "P1",
                                "title": "Phone",
                                "price": 120,
                                "image": "https://img/p1.png",
                                "description": "A phone"
                            },
                            "quantity": 2,
                            "price": 100
                        },
                        {
                            "productId": {"_id": "P2", "title": "Case", "price": 9.5},
                            "quantity": 1,
                            "price": 9.5
                        }
                    ],
                    "totalPrice": 209.5
                }
            }"#,
        );

        assert_eq!(cart.len(), 2);
        let p1 = cart.get(&ProductId::new("P1")).unwrap();
        assert_eq!(p1.quantity, 2);
        assert_eq!(p1.unit_price, Decimal::from(100));
        assert_eq!(p1.title.as_deref(), Some("Phone"));
        assert_eq!(cart.total_price(), Decimal::new(2095, 1));
        assert!(cart.is_consistent());
    }

    #[test]
    fn test_decode_wishlist_takes_product_price() {
        let wishlist = decode(
            CollectionKind::Wishlist,
            r#"{"data": {"products": [{"productId": {"_id": "P7", "title": "Watch", "price": 1999}}]}}"#,
        );
        let item = wishlist.get(&ProductId::new("P7")).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, Decimal::from(1999));
        assert_eq!(wishlist.total_price(), Decimal::from(1999));
    }

    #[test]
    fn test_decode_unpopulated_reference() {
        let cart = decode(
            CollectionKind::Cart,
            r#"{"data": {"products": [{"productId": "P3", "quantity": 3, "price": "5.25"}]}}"#,
        );
        let item = cart.get(&ProductId::new("P3")).unwrap();
        assert!(item.title.is_none());
        assert_eq!(cart.total_price(), Decimal::new(1575, 2));
    }

    #[test]
    fn test_decode_missing_data_is_empty() {
        assert!(decode(CollectionKind::Cart, r#"{"message": "Cart not found"}"#).is_empty());
        assert!(decode(CollectionKind::Cart, r#"{"data": null}"#).is_empty());
        assert!(decode(CollectionKind::Wishlist, r#"{"data": []}"#).is_empty());
    }

    #[test]
    fn test_error_body_message_fallbacks() {
        let body: ErrorBody = serde_json::from_str(r#"{"message": "Out of stock"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Out of stock"));

        let body: ErrorBody = serde_json::from_str(r#"{"error": "jwt expired"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("jwt expired"));

        let body: ErrorBody = serde_json::from_str(r#"{"message": "  "}"#).unwrap();
        assert!(body.into_message().is_none());
    }

    #[test]
    fn test_product_body_is_camel_case() {
        let json = serde_json::to_string(&ProductBody { product_id: "P1" }).unwrap();
        assert_eq!(json, r#"{"productId":"P1"}"#);
    }

    #[test]
    fn test_raw_product_to_snapshot() {
        let raw: RawProduct =
            serde_json::from_str(r#"{"_id": "P1", "title": "Laptop", "price": 45000}"#).unwrap();
        let snapshot = ProductSnapshot::from(raw);
        assert_eq!(snapshot.id, ProductId::new("P1"));
        assert_eq!(snapshot.unit_price, Decimal::from(45000));
        assert!(snapshot.image.is_none());
    }
}
