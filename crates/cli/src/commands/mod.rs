//! CLI command implementations.

pub mod products;
pub mod wishlist;
