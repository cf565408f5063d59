//! Catalog HTTP client
//!
//! Async client for the Rick and Morty REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use url::Url;

use super::error::{ApiError, NotFoundExt};
use super::types::*;
use super::Catalog;
use crate::config::ApiConfig;

/// Default user agent
const USER_AGENT: &str = concat!("meeseeks/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the remote catalog
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
    max_pages: usize,
}

impl CatalogClient {
    /// Create new client from API config
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout_secs, config.max_pages)
    }

    /// Create new client with explicit parameters
    pub fn new(base_url: &str, timeout_secs: u64, max_pages: usize) -> Result<Self> {
        // `Url::join` replaces the last segment unless the base ends with a slash
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid catalog API url: {}", base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            max_pages: max_pages.max(1),
        })
    }

    /// Base url every endpoint is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL for an endpoint
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Build a filtered collection URL
    fn filter_url(&self, resource: &str, filter: &impl Filter) -> Result<Url, ApiError> {
        let mut url = self.url(resource)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filter.pairs() {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET a url and decode its JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        tracing::debug!(%url, "GET");

        let resp = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        tracing::debug!(%url, %status, "response");

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::UnexpectedShape {
            endpoint: url.path().to_string(),
            reason: e.to_string(),
        })
    }

    /// Walk a paged collection through `info.next`, up to `max_pages` pages
    async fn get_all_pages<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, ApiError> {
        let mut results = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page: Page<T> = match self.get_json(url).await.found()? {
                Some(page) => page,
                // the API answers 404 for an empty filter result
                None => break,
            };
            results.extend(page.results);
            pages += 1;

            if pages >= self.max_pages {
                if page.info.next.is_some() {
                    tracing::warn!(
                        pages,
                        total = page.info.count,
                        "stopped following result pages at the configured limit"
                    );
                }
                break;
            }

            next = match page.info.next {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    ApiError::InvalidUrl(format!("{}: {}", link, e))
                })?),
                None => None,
            };
        }

        Ok(results)
    }
}

#[async_trait(?Send)]
impl Catalog for CatalogClient {
    async fn episode(&self, id: i64) -> Result<Option<ApiEpisode>, ApiError> {
        let url = self.url(&format!("episode/{}", id))?;
        self.get_json(url).await.found()
    }

    async fn character(&self, id: i64) -> Result<Option<ApiCharacter>, ApiError> {
        let url = self.url(&format!("character/{}", id))?;
        self.get_json(url).await.found()
    }

    async fn location(&self, id: i64) -> Result<Option<ApiLocation>, ApiError> {
        let url = self.url(&format!("location/{}", id))?;
        self.get_json(url).await.found()
    }

    async fn characters(&self, ids: &[i64]) -> Result<Vec<ApiCharacter>, ApiError> {
        match ids {
            [] => Ok(Vec::new()),
            [id] => Ok(self.character(*id).await?.into_iter().collect()),
            _ => {
                let list = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                let url = self.url(&format!("character/{}", list))?;
                let found: Option<OneOrMany<ApiCharacter>> = self.get_json(url).await.found()?;
                Ok(found.map(OneOrMany::into_vec).unwrap_or_default())
            }
        }
    }

    async fn find_episodes(&self, filter: &EpisodeFilter) -> Result<Vec<ApiEpisode>, ApiError> {
        let url = self.filter_url("episode", filter)?;
        self.get_all_pages(url).await
    }

    async fn find_locations(&self, filter: &LocationFilter) -> Result<Vec<ApiLocation>, ApiError> {
        let url = self.filter_url("location", filter)?;
        self.get_all_pages(url).await
    }

    async fn find_characters(
        &self,
        filter: &CharacterFilter,
    ) -> Result<Vec<ApiCharacter>, ApiError> {
        let url = self.filter_url("character", filter)?;
        self.get_all_pages(url).await
    }

    async fn episode_count(&self) -> Result<Option<u64>, ApiError> {
        let url = self.url("episode")?;
        let page: Option<Page<IgnoredAny>> = self.get_json(url).await.found()?;
        Ok(page.map(|p| p.info.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = CatalogClient::new("https://rickandmortyapi.com/api", 5, 10).unwrap();
        assert_eq!(
            client.url("episode/3").unwrap().as_str(),
            "https://rickandmortyapi.com/api/episode/3"
        );

        let client = CatalogClient::new("https://rickandmortyapi.com/api///", 5, 10).unwrap();
        assert_eq!(
            client.url("character/1,2").unwrap().as_str(),
            "https://rickandmortyapi.com/api/character/1,2"
        );
    }

    #[test]
    fn test_filter_url_encodes_values() {
        let client = CatalogClient::new("https://rickandmortyapi.com/api", 5, 10).unwrap();
        let filter = LocationFilter {
            name: Some("Earth (C-137)".to_string()),
            dimension: None,
        };
        let url = client.filter_url("location", &filter).unwrap();
        assert_eq!(url.path(), "/api/location");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![("name".to_string(), "Earth (C-137)".to_string())]
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(CatalogClient::new("not a url", 5, 10).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // nothing listens on the discard port
        let client = CatalogClient::new("http://127.0.0.1:9/api", 2, 1).unwrap();
        let err = client.episode(1).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
