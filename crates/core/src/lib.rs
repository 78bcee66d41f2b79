//! Dawa Core - Shared types library.
//!
//! This crate provides the types shared by every Dawa component:
//! - `storefront` - Client-side data layer (API client, cache, wishlist)
//! - `cli` - Command-line tools for inspecting a live backend
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs and the canonical [`Product`] record
//! - [`normalize`] - Mapping of heterogeneous API payloads into [`Product`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod normalize;
pub mod types;

pub use normalize::{normalize_product, normalize_products};
pub use types::*;
