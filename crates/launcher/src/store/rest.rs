//! REST client for the remote item store.
//!
//! Documents live in a per-user collection at
//! `{base}/v1/users/{uid}/shoppingItems`. The client authenticates with the
//! backend API key and exchanges the `wise-launcher-core` item types as
//! JSON. No responses are cached: the controller's in-memory list is the
//! only derived copy and must mirror the remote collection.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use wise_launcher_core::{ItemId, ItemPatch, NewItem, ShoppingItem, UserId};

use crate::config::BackendConfig;
use crate::store::{ItemStore, StoreError};

/// API key header understood by the store backend.
const API_KEY_HEADER: &str = "X-Wise-Api-Key";

/// Client for the remote item store.
#[derive(Clone)]
pub struct RestItemStore {
    inner: Arc<RestItemStoreInner>,
}

struct RestItemStoreInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl RestItemStore {
    /// Create a new item store client.
    #[must_use]
    pub fn new(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(RestItemStoreInner {
                client,
                base_url: config.store_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
            }),
        }
    }

    fn collection_url(&self, user: &UserId) -> String {
        format!("{}/v1/users/{}/shoppingItems", self.inner.base_url, user)
    }

    fn document_url(&self, user: &UserId, id: &ItemId) -> String {
        format!("{}/{}", self.collection_url(user), id)
    }

    /// Execute a request and decode the response body.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<T, StoreError> {
        let mut request = self
            .inner
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, self.inner.api_key.expose_secret());

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(url));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(200).collect::<String>(),
                "Item store returned non-success status"
            );
            return Err(StoreError::Backend {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        // Acknowledgment-only responses (update/delete) may have no body
        let effective = if response_text.is_empty() {
            "{}"
        } else {
            &response_text
        };

        Ok(serde_json::from_str(effective)?)
    }
}

impl ItemStore for RestItemStore {
    #[instrument(skip(self), fields(user = %user))]
    async fn list_all(&self, user: &UserId) -> Result<Vec<ShoppingItem>, StoreError> {
        let response: ListResponse = self
            .execute(Method::GET, self.collection_url(user), None)
            .await?;
        Ok(response.items)
    }

    #[instrument(skip(self, fields), fields(user = %user, name = %fields.name))]
    async fn create(&self, user: &UserId, fields: &NewItem) -> Result<ItemId, StoreError> {
        let response: CreateResponse = self
            .execute(
                Method::POST,
                self.collection_url(user),
                Some(serde_json::to_value(fields)?),
            )
            .await?;
        Ok(response.id)
    }

    #[instrument(skip(self, patch), fields(user = %user, id = %id))]
    async fn update_fields(
        &self,
        user: &UserId,
        id: &ItemId,
        patch: &ItemPatch,
    ) -> Result<(), StoreError> {
        let _ack: Ack = self
            .execute(
                Method::PATCH,
                self.document_url(user, id),
                Some(serde_json::to_value(patch)?),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user, id = %id))]
    async fn delete(&self, user: &UserId, id: &ItemId) -> Result<(), StoreError> {
        let _ack: Ack = self
            .execute(Method::DELETE, self.document_url(user, id), None)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Collection listing envelope.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ShoppingItem>,
}

/// Create acknowledgment carrying the store-assigned id.
#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: ItemId,
}

/// Body-less acknowledgment for update and delete.
#[derive(Debug, Default, Deserialize)]
struct Ack {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> RestItemStore {
        let config = BackendConfig {
            project: "wise-test".to_string(),
            api_key: SecretString::from("k9Qz!mP2@vL5#xR8"),
            identity_url: "https://identity.wiseapps.dev/wise-test".to_string(),
            store_url: "https://store.wiseapps.dev/wise-test/".to_string(),
            federated_provider: "google.com".to_string(),
        };
        RestItemStore::new(&config, reqwest::Client::new())
    }

    #[test]
    fn test_collection_url_shape() {
        let store = test_store();
        assert_eq!(
            store.collection_url(&UserId::new("u-1")),
            "https://store.wiseapps.dev/wise-test/v1/users/u-1/shoppingItems"
        );
    }

    #[test]
    fn test_document_url_shape() {
        let store = test_store();
        assert_eq!(
            store.document_url(&UserId::new("u-1"), &ItemId::new("doc-9")),
            "https://store.wiseapps.dev/wise-test/v1/users/u-1/shoppingItems/doc-9"
        );
    }

    #[test]
    fn test_list_response_tolerates_missing_items() {
        let response: ListResponse = serde_json::from_str("{}").expect("deserialize");
        assert!(response.items.is_empty());
    }
}
