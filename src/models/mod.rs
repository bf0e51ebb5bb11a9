// src/models/mod.rs

//! Domain models for the harvester application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod meta;
mod record;

// Re-export all public types
pub use config::{
    Config, FeedConfig, FetchConfig, HarvestConfig, ListingSelectors, ServerConfig, StoreConfig,
};
pub use meta::MetaTag;
pub use record::{DESCRIPTION_PLACEHOLDER, Record, fingerprint};
