//! Authenticated Basecamp 3 API access with `Link`-header pagination.

pub mod client;
pub mod error;
pub mod link;
pub mod page;
pub mod paginate;
pub mod response;

pub use {
    client::{ApiClient, http_client},
    error::{ApiError, FetchError},
    page::PageBody,
    paginate::{AggregatedResult, PageAggregator},
    response::tool_response,
};
