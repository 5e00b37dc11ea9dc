use std::sync::Arc;

use {
    camper_config::Settings,
    camper_oauth::AuthHeaderProvider,
    reqwest::Method,
    serde_json::Value,
    tracing::debug,
    url::Url,
};

use crate::{
    error::{ApiError, FetchError},
    paginate::{AggregatedResult, PageAggregator, check_status, read_body},
};

/// HTTP client carrying the configured request timeout.
pub fn http_client(settings: &Settings) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
}

/// Authenticated access to one Basecamp account.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    auth: Arc<AuthHeaderProvider>,
    pages: PageAggregator,
    base_url: Url,
}

impl ApiClient {
    /// Requests go to `{api_base_url}/{account_id}/`.
    pub async fn new(
        settings: &Settings,
        auth: Arc<AuthHeaderProvider>,
        http: reqwest::Client,
    ) -> Result<Self, ApiError> {
        let account_id = auth.store().current().await.account_id;
        let mut root = settings.api_base_url.clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let base_url = root
            .join(&format!("{account_id}/"))
            .map_err(|source| ApiError::InvalidEndpoint {
                path: account_id.clone(),
                source,
            })?;

        Ok(Self {
            pages: PageAggregator::new(http.clone()),
            http,
            auth,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` under the account and append the non-empty filters.
    pub fn endpoint<K, V>(
        &self,
        path: &str,
        filters: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Url, ApiError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| ApiError::InvalidEndpoint {
                path: path.to_string(),
                source,
            })?;
        let filters: Vec<_> = filters
            .into_iter()
            .filter(|(_, v)| !v.as_ref().is_empty())
            .collect();
        if !filters.is_empty() {
            url.query_pairs_mut().extend_pairs(filters);
        }
        Ok(url)
    }

    /// Every item of a paginated collection.
    pub async fn list<K, V>(
        &self,
        path: &str,
        filters: impl IntoIterator<Item = (K, V)>,
        items_field: Option<&str>,
    ) -> Result<AggregatedResult, ApiError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = self.endpoint(path, filters)?;
        let headers = self.auth.headers().await?;
        Ok(self.pages.fetch_all(&url, &headers, items_field).await?)
    }

    pub async fn get<K, V>(
        &self,
        path: &str,
        filters: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Value, ApiError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = self.endpoint(path, filters)?;
        self.send(Method::GET, url, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = self.endpoint(path, NO_FILTERS)?;
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = self.endpoint(path, NO_FILTERS)?;
        self.send(Method::PUT, url, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(path, NO_FILTERS)?;
        self.send(Method::DELETE, url, None).await
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, ApiError> {
        let headers = self.auth.headers().await?;
        debug!(%method, url = %url, "api request");

        let mut request = self.http.request(method, url.clone()).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;
        let response = check_status(&url, response).await?;
        Ok(read_body(&url, response).await?)
    }
}

const NO_FILTERS: [(&str, &str); 0] = [];
