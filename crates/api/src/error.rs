use {camper_oauth::AuthError, thiserror::Error, url::Url};

/// A page fetch failed; the whole aggregation is abandoned.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: Url, status: u16, body: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    MalformedBody {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} has no array field {field:?}")]
    MissingItemsField { url: Url, field: String },

    #[error("invalid next link {link:?} on {url}: {source}")]
    InvalidNextLink {
        url: Url,
        link: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    /// The HTTP status for status failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Everything a single API operation can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to encode result: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("invalid endpoint {path:?}: {source}")]
    InvalidEndpoint {
        path: String,
        #[source]
        source: url::ParseError,
    },
}
