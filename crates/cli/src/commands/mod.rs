//! Subcommand implementations.

pub mod cart;
pub mod wishlist;

use std::future::Future;

use bazaar_core::{Collection, CollectionKind};
use bazaar_storefront::error::{FetchError, MutationError};
use bazaar_storefront::remote::ApiError;
use bazaar_storefront::state::AppState;
use thiserror::Error;

use crate::output::Output;

/// Errors surfaced by a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Load the server copy of a collection so local mutations start from it.
///
/// Anonymous sessions skip this; the mutation itself reports the sign-in.
pub async fn sync(state: &AppState, kind: CollectionKind) -> Result<(), CommandError> {
    if state.session().is_authenticated() {
        state.controller().refresh(kind).await?;
    }
    Ok(())
}

/// Print a freshly fetched collection.
pub async fn show(
    state: &AppState,
    kind: CollectionKind,
    output: Output,
) -> Result<(), CommandError> {
    state.controller().refresh(kind).await?;
    output.view(&state.view(kind))
}

/// Await a mutation, print its notice, then the resulting collection.
pub async fn mutate(
    state: &AppState,
    kind: CollectionKind,
    output: Output,
    mutation: impl Future<Output = Result<Collection, MutationError>>,
) -> Result<(), CommandError> {
    let mut notices = state.controller().subscribe_notices();
    let result = mutation.await;

    while let Ok(notice) = notices.try_recv() {
        output.notice(&notice)?;
    }

    result?;
    output.view(&state.view(kind))
}
