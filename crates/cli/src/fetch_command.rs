use std::sync::Arc;

use {
    anyhow::Result,
    camper_api::{AggregatedResult, ApiClient, ApiError, tool_response},
    clap::Args,
    serde_json::Value,
};

use crate::context::Context;

#[derive(Args)]
pub struct FetchArgs {
    /// Path relative to the account, e.g. `projects.json`.
    path: String,

    /// Query filter, repeatable.
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Field holding the items when pages are JSON objects.
    #[arg(long)]
    items_field: Option<String>,

    /// Wrap the items as `{"total_<kind>", "filters", "<kind>"}`.
    #[arg(long)]
    kind: Option<String>,

    /// Fetch one resource instead of following pagination.
    #[arg(long, conflicts_with_all = ["items_field", "kind"])]
    single: bool,
}

pub async fn handle_fetch(args: FetchArgs) -> Result<()> {
    let ctx = Context::load()?;
    let api = ApiClient::new(&ctx.settings, Arc::clone(&ctx.auth), ctx.http.clone()).await?;

    let filters: Vec<(&str, &str)> = args
        .filters
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let result = if args.single {
        api.get(&args.path, filters).await
    } else {
        let listed = api
            .list(&args.path, filters, args.items_field.as_deref())
            .await;
        render_listing(listed, args.kind.as_deref())
    };
    println!("{}", tool_response(result));
    Ok(())
}

fn render_listing(
    listed: Result<AggregatedResult, ApiError>,
    kind: Option<&str>,
) -> Result<Value, ApiError> {
    let aggregated = listed?;
    match kind {
        Some(kind) => Ok(aggregated.summary(kind)),
        None => serde_json::to_value(aggregated).map_err(ApiError::Encoding),
    }
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter name in {raw:?}"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
