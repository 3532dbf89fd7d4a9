use entity_store::StoreError;
use thiserror::Error;

/// Errors returned by fallible commit sync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity store failed.
    #[error("Store: {0}")]
    Store(#[from] StoreError),

    /// A sync pass ended without reporting, because its task was cancelled or panicked.
    #[error("Sync pass was interrupted")]
    Interrupted,
}
