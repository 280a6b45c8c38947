//! Paginated list fetch
//!
//! List endpoints return one page of records plus an opaque continuation
//! cursor. [`list_all`] follows the cursor until the server stops returning
//! one, accumulating every page in server order. A failure on any page aborts
//! the whole fetch; pages already received are discarded. Retry of quota
//! errors happens below this layer, in the transport.

use crate::gcp::client::GcpClient;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// One page of results
pub struct ListPage {
    pub items: Vec<Value>,
    pub next_token: Option<String>,
}

/// Fetch every page from a list endpoint.
///
/// `items_key` names the array field of the response body (dot paths
/// supported); `params` are extra query parameters such as `filter`.
pub async fn list_all(
    client: &GcpClient,
    url: &str,
    items_key: &str,
    params: &[(&str, &str)],
) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = list_page(client, url, items_key, params, page_token.as_deref()).await?;
        all_items.extend(page.items);

        match page.next_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(all_items)
}

/// Fetch a single page
pub async fn list_page(
    client: &GcpClient,
    url: &str,
    items_key: &str,
    params: &[(&str, &str)],
    page_token: Option<&str>,
) -> Result<ListPage> {
    let mut request_url = Url::parse(url).with_context(|| format!("invalid list URL {}", url))?;

    {
        let mut query = request_url.query_pairs_mut();
        for (key, value) in params {
            if !value.is_empty() {
                query.append_pair(key, value);
            }
        }
        if let Some(token) = page_token {
            query.append_pair("pageToken", token);
        }
    }

    let response = client
        .get(request_url.as_str(), client.timeouts().read)
        .await
        .with_context(|| format!("error listing {}", items_key))?;

    let items = extract_items(&response, items_key);
    let next_token = response
        .get("nextPageToken")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(ListPage { items, next_token })
}

/// Extract the named array from a response body using a dot-notation path
fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}
