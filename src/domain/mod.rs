//! Domain layer for the routing cache
//!
//! This module contains the cache's models and error types.

pub mod errors;
pub mod models;

pub use errors::{CacheError, CacheResult};
