//! Core module - Business logic
//!
//! Records, the SQLite cache, lookups and the crawler.

pub mod crawl;
pub mod model;
pub mod seek;
pub mod storage;
