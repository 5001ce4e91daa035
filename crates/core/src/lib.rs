//! Wise Launcher Core - Shared types library.
//!
//! This crate provides common types used across the Wise Launcher components:
//! - `launcher` - The application-launcher web front end and WisePantry sub-app
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Both backend
//! collaborators (the identity provider and the per-user item store) exchange
//! these types as JSON.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers and emails, plus the
//!   shopping-list item model and its mutation payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
