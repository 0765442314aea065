//! Confluence REST gateway.
//!
//! Wraps the two content operations the form tools need (fetch, update) with
//! Basic authentication, a bounded timeout, and translation of HTTP failures
//! into [`McpError`]. One outbound call per operation, no retries; retry
//! policy belongs to the caller.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::error::{McpError, Result};

/// Confluence credentials, resolved once at startup and read-only thereafter.
#[derive(Clone)]
pub struct Credentials {
    /// Site base URL, e.g. `https://your-domain.atlassian.net/wiki`.
    pub base_url: String,
    /// Account email used for Basic auth.
    pub username: String,
    /// API token used for Basic auth.
    pub api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// A page's storage-format content at one fetched version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// Confluence content id.
    pub page_id: String,
    /// Page title; the update endpoint requires it to be echoed back.
    pub title: String,
    /// Version counter owned by the wiki.
    pub version: i64,
    /// Storage-format markup of the page body.
    pub body_markup: String,
}

/// The two Confluence operations the form tools consume.
///
/// Implemented by [`ConfluenceGateway`] for real traffic and by in-memory
/// fakes in tests.
#[allow(async_fn_in_trait)]
pub trait ConfluenceApi {
    /// Fetch a page's current storage markup and version.
    async fn fetch_page(&self, page_id: &str) -> Result<PageContent>;

    /// Write new storage markup for a page fetched at `fetched_version`.
    ///
    /// Fails with [`McpError::VersionConflict`] if another writer moved the
    /// page past `fetched_version` in the meantime.
    async fn update_page(
        &self,
        page_id: &str,
        title: &str,
        body_markup: &str,
        fetched_version: i64,
    ) -> Result<PageContent>;
}

/// REST content representation, trimmed to the fields the tools use.
#[derive(Debug, Deserialize)]
struct ContentResponse {
    id: String,
    title: String,
    version: VersionInfo,
    body: Option<ContentBody>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    number: i64,
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    storage: Option<StorageFormat>,
}

#[derive(Debug, Deserialize)]
struct StorageFormat {
    value: String,
}

/// HTTP gateway to the Confluence content API.
pub struct ConfluenceGateway {
    client: reqwest::Client,
    base_url: String,
}

impl ConfluenceGateway {
    /// Build a gateway with Basic auth default headers and a request timeout.
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let auth = format!("{}:{}", credentials.username, credentials.api_token);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&auth);

        let mut auth_header = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| McpError::Internal(format!("invalid auth header: {e}")))?;
        auth_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_header);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| McpError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn content_url(&self, page_id: &str) -> String {
        format!("{}/rest/api/content/{}", self.base_url, page_id)
    }
}

impl ConfluenceApi for ConfluenceGateway {
    async fn fetch_page(&self, page_id: &str) -> Result<PageContent> {
        tracing::debug!(page_id, "fetching page content");

        let response = self
            .client
            .get(self.content_url(page_id))
            .query(&[("expand", "body.storage,version")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status.as_u16(), page_id, body));
        }

        let content: ContentResponse = response.json().await.map_err(|e| McpError::Upstream {
            status: status.as_u16(),
            message: format!("malformed content response: {e}"),
        })?;
        let body_markup = content
            .body
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .ok_or_else(|| McpError::Upstream {
                status: status.as_u16(),
                message: "content response missing body.storage".to_string(),
            })?;

        Ok(PageContent {
            page_id: content.id,
            title: content.title,
            version: content.version.number,
            body_markup,
        })
    }

    async fn update_page(
        &self,
        page_id: &str,
        title: &str,
        body_markup: &str,
        fetched_version: i64,
    ) -> Result<PageContent> {
        tracing::debug!(page_id, fetched_version, "updating page content");

        // The REST API expresses "I fetched at version N" by submitting N+1;
        // the wiki rejects the write with 409 if the page moved past N.
        let payload = serde_json::json!({
            "id": page_id,
            "type": "page",
            "title": title,
            "version": { "number": fetched_version + 1 },
            "body": {
                "storage": {
                    "value": body_markup,
                    "representation": "storage"
                }
            }
        });

        let response = self
            .client
            .put(self.content_url(page_id))
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.as_u16() == 409 {
            return Err(McpError::VersionConflict {
                page_id: page_id.to_string(),
                fetched_version,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status.as_u16(), page_id, body));
        }

        let content: ContentResponse = response.json().await.map_err(|e| McpError::Upstream {
            status: status.as_u16(),
            message: format!("malformed update response: {e}"),
        })?;
        let returned_markup = content
            .body
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .unwrap_or_else(|| body_markup.to_string());

        Ok(PageContent {
            page_id: content.id,
            title: content.title,
            version: content.version.number,
            body_markup: returned_markup,
        })
    }
}

fn transport_error(err: reqwest::Error) -> McpError {
    if err.is_timeout() {
        McpError::Timeout(err.to_string())
    } else {
        McpError::Upstream {
            status: 0,
            message: err.to_string(),
        }
    }
}

/// Map a non-2xx response to the failure taxonomy.
fn http_error(status: u16, page_id: &str, body: String) -> McpError {
    match status {
        404 => McpError::PageNotFound(page_id.to_string()),
        401 | 403 => McpError::AuthRejected { status },
        _ => McpError::Upstream {
            status,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_the_taxonomy() {
        assert!(matches!(
            http_error(404, "123", String::new()),
            McpError::PageNotFound(id) if id == "123"
        ));
        assert!(matches!(
            http_error(401, "123", String::new()),
            McpError::AuthRejected { status: 401 }
        ));
        assert!(matches!(
            http_error(403, "123", String::new()),
            McpError::AuthRejected { status: 403 }
        ));
        assert!(matches!(
            http_error(500, "123", "boom".to_string()),
            McpError::Upstream { status: 500, message } if message == "boom"
        ));
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let creds = Credentials {
            base_url: "https://example.atlassian.net/wiki".to_string(),
            username: "bot@example.com".to_string(),
            api_token: "ATATT-secret".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("ATATT-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
