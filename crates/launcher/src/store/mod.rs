//! Remote item store collaborator.
//!
//! The shopping list lives in a remote per-user document collection. The
//! [`ItemStore`] trait is the seam the shopping-list controller is written
//! against; [`rest::RestItemStore`] is the production implementation and
//! tests use an in-module mock.
//!
//! The store assigns document ids on create and acknowledges every
//! mutation; local state is only ever updated from an acknowledgment.

pub mod rest;

pub use rest::RestItemStore;

use thiserror::Error;

use wise_launcher_core::{ItemId, ItemPatch, NewItem, ShoppingItem, UserId};

/// Errors that can occur when talking to the item store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store returned a non-success status.
    #[error("store backend error {status}: {message}")]
    Backend { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("json parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Referenced document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),
}

/// Per-user document collection operations.
///
/// Items are scoped to the owning user; there is no cross-user visibility.
#[allow(async_fn_in_trait)] // callers use concrete stores, not dyn
pub trait ItemStore: Send + Sync {
    /// Fetch every item in the user's collection. No ordering is implied.
    async fn list_all(&self, user: &UserId) -> Result<Vec<ShoppingItem>, StoreError>;

    /// Create a document and return its store-assigned id.
    async fn create(&self, user: &UserId, fields: &NewItem) -> Result<ItemId, StoreError>;

    /// Apply a field-level partial update to one document.
    async fn update_fields(
        &self,
        user: &UserId,
        id: &ItemId,
        patch: &ItemPatch,
    ) -> Result<(), StoreError>;

    /// Delete one document.
    async fn delete(&self, user: &UserId, id: &ItemId) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound("doc-123".to_string());
        assert_eq!(err.to_string(), "document not found: doc-123");

        let err = StoreError::Backend {
            status: 502,
            message: "upstream unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store backend error 502: upstream unavailable"
        );
    }
}
