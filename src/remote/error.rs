//! Catalog API client error types.

/// Errors from the remote catalog API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API answered 404. Mapped to `None` / empty at the [`super::Catalog`] boundary.
    #[error("resource not found")]
    NotFound,

    /// Rate limited by the catalog API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The body matched none of the shapes the API is known to return.
    #[error("unexpected response shape from {endpoint}: {reason}")]
    UnexpectedShape { endpoint: String, reason: String },

    /// A url could not be built or parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited | ApiError::Timeout | ApiError::Network(_) => true,
            ApiError::Http { status } => *status >= 500,
            ApiError::NotFound | ApiError::UnexpectedShape { .. } | ApiError::InvalidUrl(_) => {
                false
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }
}

/// Turn the `NotFound` signal into absence.
pub(crate) trait NotFoundExt<T> {
    fn found(self) -> Result<Option<T>, ApiError>;
}

impl<T> NotFoundExt<T> for Result<T, ApiError> {
    fn found(self) -> Result<Option<T>, ApiError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(ApiError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::RateLimited.is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::Http { status: 503 }.is_transient());
        assert!(!ApiError::Http { status: 400 }.is_transient());
        assert!(!ApiError::NotFound.is_transient());
        assert!(!ApiError::UnexpectedShape {
            endpoint: "episode/1".to_string(),
            reason: "missing field `id`".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_not_found_becomes_none() {
        let missing: Result<u32, ApiError> = Err(ApiError::NotFound);
        assert!(matches!(missing.found(), Ok(None)));

        let present: Result<u32, ApiError> = Ok(7);
        assert!(matches!(present.found(), Ok(Some(7))));

        let broken: Result<u32, ApiError> = Err(ApiError::Http { status: 500 });
        assert!(matches!(broken.found(), Err(ApiError::Http { status: 500 })));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Http { status: 502 };
        assert_eq!(err.to_string(), "HTTP error: 502");

        let err = ApiError::UnexpectedShape {
            endpoint: "character/1,2".to_string(),
            reason: "expected array".to_string(),
        };
        assert!(err.to_string().contains("character/1,2"));
    }
}
