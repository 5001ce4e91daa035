//! Application services.
//!
//! - [`auth`] - Auth session manager over the identity provider
//! - [`pantry`] - Shopping-list controller over the item store
//! - [`sessions`] - Per-user handle registry tying the two together

pub mod auth;
pub mod pantry;
pub mod sessions;
