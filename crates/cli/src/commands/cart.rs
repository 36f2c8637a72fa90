//! Cart commands.

use bazaar_core::{CollectionKind, ProductId};
use bazaar_storefront::state::AppState;
use clap::Subcommand;

use super::{CommandError, mutate, show, sync};
use crate::output::Output;

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the cart
    Show,
    /// Add a product (one more unit if already in the cart)
    Add {
        /// Product id
        product_id: String,
    },
    /// Add one unit of a cart product
    Incr {
        /// Product id
        product_id: String,
    },
    /// Remove one unit of a cart product
    Decr {
        /// Product id
        product_id: String,
    },
    /// Remove a product from the cart
    Remove {
        /// Product id
        product_id: String,
    },
}

/// Run a cart command.
///
/// # Errors
///
/// Returns an error if loading, the mutation or output fails.
pub async fn run(state: &AppState, action: CartAction, output: Output) -> Result<(), CommandError> {
    const KIND: CollectionKind = CollectionKind::Cart;
    let controller = state.controller();

    match action {
        CartAction::Show => show(state, KIND, output).await,
        CartAction::Add { product_id } => {
            let product = state.catalog().product(&ProductId::new(product_id)).await?;
            sync(state, KIND).await?;
            mutate(state, KIND, output, controller.add_to_cart(&product)).await
        }
        CartAction::Incr { product_id } => {
            let product_id = ProductId::new(product_id);
            sync(state, KIND).await?;
            mutate(state, KIND, output, controller.increment(&product_id)).await
        }
        CartAction::Decr { product_id } => {
            let product_id = ProductId::new(product_id);
            sync(state, KIND).await?;
            mutate(state, KIND, output, controller.decrement(&product_id)).await
        }
        CartAction::Remove { product_id } => {
            let product_id = ProductId::new(product_id);
            sync(state, KIND).await?;
            mutate(state, KIND, output, controller.remove_item(KIND, &product_id)).await
        }
    }
}
