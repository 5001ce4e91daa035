//! Core types for Wise Launcher.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod item;

pub use email::{Email, EmailError};
pub use id::*;
pub use item::{GENERAL_SUPERMARKET, ItemPatch, NewItem, ShoppingItem, normalize_supermarket};
