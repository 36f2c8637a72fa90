//! Wishlist commands.

use bazaar_core::{CollectionKind, ProductId};
use bazaar_storefront::state::AppState;
use clap::Subcommand;

use super::{CommandError, mutate, show, sync};
use crate::output::Output;

#[derive(Subcommand)]
pub enum WishlistAction {
    /// Show the wishlist
    Show,
    /// Add a product to the wishlist
    Add {
        /// Product id
        product_id: String,
    },
    /// Remove a product from the wishlist
    Remove {
        /// Product id
        product_id: String,
    },
    /// Add the product if missing, remove it otherwise
    Toggle {
        /// Product id
        product_id: String,
    },
    /// Move a wishlisted product into the cart
    MoveToCart {
        /// Product id
        product_id: String,
    },
}

/// Run a wishlist command.
///
/// # Errors
///
/// Returns an error if loading, the mutation or output fails.
pub async fn run(
    state: &AppState,
    action: WishlistAction,
    output: Output,
) -> Result<(), CommandError> {
    const KIND: CollectionKind = CollectionKind::Wishlist;
    let controller = state.controller();

    match action {
        WishlistAction::Show => show(state, KIND, output).await,
        WishlistAction::Add { product_id } => {
            let product = state.catalog().product(&ProductId::new(product_id)).await?;
            sync(state, KIND).await?;
            mutate(state, KIND, output, controller.add_to_wishlist(&product)).await
        }
        WishlistAction::Remove { product_id } => {
            let product_id = ProductId::new(product_id);
            sync(state, KIND).await?;
            mutate(state, KIND, output, controller.remove_item(KIND, &product_id)).await
        }
        WishlistAction::Toggle { product_id } => {
            let product = state.catalog().product(&ProductId::new(product_id)).await?;
            sync(state, KIND).await?;
            mutate(state, KIND, output, controller.toggle_wishlist(&product)).await
        }
        WishlistAction::MoveToCart { product_id } => {
            let product = state.catalog().product(&ProductId::new(product_id)).await?;
            sync(state, CollectionKind::Cart).await?;
            mutate(
                state,
                CollectionKind::Cart,
                output,
                controller.move_to_cart(&product),
            )
            .await
        }
    }
}
