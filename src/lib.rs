//! meeseeks - Rick and Morty catalog crawler and cache
//!
//! Crawls the public Rick and Morty API into a local SQLite cache and answers
//! lookups from the cache first, falling back to the API.
//!
//! ## Key Concepts
//!
//! - **Crawl**: sequential, resumable import starting after the highest cached episode
//! - **Seek**: a lookup by resource kind and criterion (id, name, code, dimension)
//! - **Target**: which side answered, the local store or the remote API
//! - **Unit of work**: one open transaction + identity map, committed per batch

pub mod cli;
pub mod config;
pub mod core;
pub mod remote;

pub use core::crawl::{CrawlReport, CrawlSettings, Crawler, StopReason};
pub use core::model::{Character, Episode, Kind, Location, LocationRef, Record};
pub use core::seek::{Criterion, Lookup, Seek, SeekError, Seeker, Target};
pub use core::storage::Store;
pub use remote::{ApiError, Catalog, CatalogClient};
