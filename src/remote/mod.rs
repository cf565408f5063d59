//! Remote catalog module
//!
//! Provides the HTTP client for the Rick and Morty catalog API and the
//! [`Catalog`] trait the rest of the crate talks to.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod types;

use async_trait::async_trait;

pub use client::CatalogClient;
pub use error::ApiError;
pub use types::*;

/// Read access to the remote catalog
///
/// A 404 from the API surfaces as `None` or an empty `Vec`; callers decide
/// whether a miss is fatal.
#[async_trait(?Send)]
pub trait Catalog {
    /// Fetch an episode by remote id
    async fn episode(&self, id: i64) -> Result<Option<ApiEpisode>, ApiError>;

    /// Fetch a character by remote id
    async fn character(&self, id: i64) -> Result<Option<ApiCharacter>, ApiError>;

    /// Fetch a location by remote id
    async fn location(&self, id: i64) -> Result<Option<ApiLocation>, ApiError>;

    /// Fetch several characters in one request; unknown ids are left out
    async fn characters(&self, ids: &[i64]) -> Result<Vec<ApiCharacter>, ApiError>;

    /// Filter episodes by name and/or code
    async fn find_episodes(&self, filter: &EpisodeFilter) -> Result<Vec<ApiEpisode>, ApiError>;

    /// Filter locations by name and/or dimension
    async fn find_locations(&self, filter: &LocationFilter) -> Result<Vec<ApiLocation>, ApiError>;

    /// Filter characters by name
    async fn find_characters(&self, filter: &CharacterFilter)
        -> Result<Vec<ApiCharacter>, ApiError>;

    /// Total number of episodes the API reports
    async fn episode_count(&self) -> Result<Option<u64>, ApiError>;
}
