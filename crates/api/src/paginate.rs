//! Sequential `Link`-header pagination.

use {
    reqwest::{Response, header::HeaderMap},
    serde::Serialize,
    serde_json::{Map, Value},
    tracing::debug,
    url::Url,
};

use crate::{
    error::FetchError,
    link::next_link,
    page::{MissingField, PageBody},
};

/// Every item of a paginated collection, in server order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub items: Vec<Value>,
    pub count: usize,
    pub pages: usize,
    /// Query parameters of the URL the aggregation started from, in order.
    /// Repeated keys are kept.
    pub filters: Vec<(String, String)>,
}

impl AggregatedResult {
    /// `{ "total_<kind>": n, "filters": {..}, "<kind>": [..] }`
    ///
    /// A filter given more than once is listed as an array of its values.
    pub fn summary(self, kind: &str) -> Value {
        let mut filters = Map::new();
        for (key, value) in self.filters {
            match filters.get_mut(&key) {
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                },
                None => {
                    filters.insert(key, Value::String(value));
                },
            }
        }

        let mut out = Map::new();
        out.insert(format!("total_{kind}"), Value::from(self.count));
        out.insert("filters".into(), Value::Object(filters));
        out.insert(kind.to_string(), Value::Array(self.items));
        Value::Object(out)
    }
}

/// Follows `rel="next"` links until the collection is exhausted.
#[derive(Debug, Clone)]
pub struct PageAggregator {
    http: reqwest::Client,
}

impl PageAggregator {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch every page starting at `initial_url`.
    ///
    /// Any failing page fails the whole call; nothing partial is returned.
    pub async fn fetch_all(
        &self,
        initial_url: &Url,
        headers: &HeaderMap,
        items_field: Option<&str>,
    ) -> Result<AggregatedResult, FetchError> {
        let mut result = AggregatedResult {
            filters: initial_url.query_pairs().into_owned().collect(),
            ..Default::default()
        };
        let mut next = Some(initial_url.clone());

        while let Some(url) = next.take() {
            let response = self
                .http
                .get(url.clone())
                .headers(headers.clone())
                .send()
                .await
                .map_err(|source| FetchError::Transport {
                    url: url.clone(),
                    source,
                })?;
            let response = check_status(&url, response).await?;
            let link = next_link(response.headers());
            let body = read_body(&url, response).await?;

            let page = PageBody::classify(body, items_field).map_err(|MissingField(field)| {
                FetchError::MissingItemsField {
                    url: url.clone(),
                    field,
                }
            })?;
            let items = page.into_items();
            result.pages += 1;
            debug!(
                url = %url,
                page = result.pages,
                items = items.len(),
                has_next = link.is_some(),
                "fetched page"
            );
            result.items.extend(items);

            next = link
                .map(|link| {
                    url.join(&link)
                        .map_err(|source| FetchError::InvalidNextLink {
                            url: url.clone(),
                            link,
                            source,
                        })
                })
                .transpose()?;
        }

        result.count = result.items.len();
        Ok(result)
    }
}

/// Turn a non-success response into [`FetchError::Status`] with its body.
pub(crate) async fn check_status(url: &Url, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        url: url.clone(),
        status: status.as_u16(),
        body,
    })
}

/// Decode a response body; an empty body is `null`.
pub(crate) async fn read_body(url: &Url, response: Response) -> Result<Value, FetchError> {
    let text = response
        .text()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|source| FetchError::MalformedBody {
        url: url.clone(),
        source,
    })
}
