//! Shopping-list item model and mutation payloads.
//!
//! `ShoppingItem` is the document shape stored in the remote per-user
//! collection. Mutations never modify a `ShoppingItem` speculatively:
//! creates go through [`NewItem`] and partial updates through [`ItemPatch`],
//! and local copies are only updated from an acknowledged payload.

use serde::{Deserialize, Serialize};

use crate::types::id::ItemId;

/// Group name used for items with no (or blank) supermarket.
pub const GENERAL_SUPERMARKET: &str = "General";

/// Normalize a user-supplied supermarket name.
///
/// Trims surrounding whitespace and substitutes [`GENERAL_SUPERMARKET`] when
/// the result is empty.
#[must_use]
pub fn normalize_supermarket(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        GENERAL_SUPERMARKET.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// A single entry on the shopping list.
///
/// The `id` is assigned by the item store on create and is unique within the
/// owning user's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    /// Store-assigned document id.
    pub id: ItemId,
    /// Item name, non-empty after trimming.
    pub name: String,
    /// How many to buy; always at least 1.
    pub quantity: u32,
    /// Whether the item has been picked up.
    pub purchased: bool,
    /// Supermarket section this item belongs to.
    ///
    /// Stored documents may omit the field; it deserializes to
    /// [`GENERAL_SUPERMARKET`] in that case.
    #[serde(default = "default_supermarket")]
    pub supermarket: String,
}

fn default_supermarket() -> String {
    GENERAL_SUPERMARKET.to_owned()
}

/// Fields for a new shopping-list document.
///
/// The store assigns the id; everything else is fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    /// Item name, already trimmed.
    pub name: String,
    /// Initial quantity, at least 1.
    pub quantity: u32,
    /// New items always start unpurchased.
    pub purchased: bool,
    /// Normalized supermarket name.
    pub supermarket: String,
}

impl NewItem {
    /// Attach a store-assigned id, producing the item to hold locally.
    #[must_use]
    pub fn into_item(self, id: ItemId) -> ShoppingItem {
        ShoppingItem {
            id,
            name: self.name,
            quantity: self.quantity,
            purchased: self.purchased,
            supermarket: self.supermarket,
        }
    }
}

/// Field-level partial update for a stored item.
///
/// Each mutation constructs exactly one patch; only the present fields are
/// serialized, so the store never sees (and never overwrites) untouched
/// fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    /// New purchased flag, if the mutation changes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased: Option<bool>,
    /// New quantity, if the mutation changes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl ItemPatch {
    /// Patch that flips only the purchased flag.
    #[must_use]
    pub const fn purchased(value: bool) -> Self {
        Self {
            purchased: Some(value),
            quantity: None,
        }
    }

    /// Patch that changes only the quantity.
    #[must_use]
    pub const fn quantity(value: u32) -> Self {
        Self {
            purchased: None,
            quantity: Some(value),
        }
    }

    /// Apply the acknowledged patch to a local item.
    pub fn apply_to(&self, item: &mut ShoppingItem) {
        if let Some(purchased) = self.purchased {
            item.purchased = purchased;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_supermarket_blank_defaults_to_general() {
        assert_eq!(normalize_supermarket(""), GENERAL_SUPERMARKET);
        assert_eq!(normalize_supermarket("   "), GENERAL_SUPERMARKET);
    }

    #[test]
    fn test_normalize_supermarket_trims() {
        assert_eq!(normalize_supermarket("  Costco "), "Costco");
    }

    #[test]
    fn test_item_missing_supermarket_deserializes_to_general() {
        let item: ShoppingItem = serde_json::from_str(
            r#"{"id":"doc-1","name":"Milk","quantity":2,"purchased":false}"#,
        )
        .expect("deserialize");
        assert_eq!(item.supermarket, GENERAL_SUPERMARKET);
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = ItemPatch::purchased(true);
        let json = serde_json::to_value(&patch).expect("serialize");
        assert_eq!(json, serde_json::json!({"purchased": true}));

        let patch = ItemPatch::quantity(3);
        let json = serde_json::to_value(&patch).expect("serialize");
        assert_eq!(json, serde_json::json!({"quantity": 3}));
    }

    #[test]
    fn test_patch_apply_to() {
        let mut item = NewItem {
            name: "Milk".to_owned(),
            quantity: 1,
            purchased: false,
            supermarket: GENERAL_SUPERMARKET.to_owned(),
        }
        .into_item(ItemId::new("doc-1"));

        ItemPatch::purchased(true).apply_to(&mut item);
        assert!(item.purchased);
        assert_eq!(item.quantity, 1);

        ItemPatch::quantity(4).apply_to(&mut item);
        assert_eq!(item.quantity, 4);
        assert!(item.purchased);
    }
}
