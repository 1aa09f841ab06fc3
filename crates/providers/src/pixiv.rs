use crate::description::{clean_artist_name, HtmlCleaner};
use crate::{DescriptionRecord, MetadataSource, ProviderError, ARTIST_PREFIX, NOT_FOUND_SENTINEL};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PixivConfig {
    pub api_url: String,
    pub artwork_url: String,
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_backoff: Duration,
    pub request_delay: Duration,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub headers: HashMap<String, String>,
}

#[derive(Clone)]
pub struct PixivClient {
    client: Client,
    cleaner: HtmlCleaner,
    cfg: Arc<PixivConfig>,
}

impl PixivClient {
    pub fn new(cfg: PixivConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &cfg.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "skipping invalid request header"),
            }
        }

        let mut builder = Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .gzip(true);
        if cfg.http_proxy.is_none() && cfg.https_proxy.is_none() {
            // Proxying is opt-in through configuration only.
            builder = builder.no_proxy();
        }
        if let Some(proxy) = &cfg.http_proxy {
            builder = builder.proxy(
                Proxy::http(proxy).map_err(|e| ProviderError::RequestFailed(e.to_string()))?,
            );
        }
        if let Some(proxy) = &cfg.https_proxy {
            builder = builder.proxy(
                Proxy::https(proxy).map_err(|e| ProviderError::RequestFailed(e.to_string()))?,
            );
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            cleaner: HtmlCleaner::new()?,
            cfg: Arc::new(cfg),
        })
    }

    /// Fetches the illust endpoint, returning `None` when the item is gone.
    async fn fetch_body(&self, identifier: &str) -> Result<Option<String>, ProviderError> {
        let url = format!("{}{}", self.cfg.api_url, identifier);
        if !self.cfg.request_delay.is_zero() {
            tokio::time::sleep(self.cfg.request_delay).await;
        }

        let attempts = self.cfg.retry_count.max(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    warn!(identifier, "remote returned 404");
                    return Ok(None);
                }
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .text()
                        .await
                        .map(Some)
                        .map_err(|e| ProviderError::RequestFailed(e.to_string()));
                }
                Ok(resp) if is_transient(resp.status()) => {
                    last = format!("status {}", resp.status());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
                    debug!(%status, body = ?body, "non-retryable response");
                    return Err(ProviderError::Status {
                        status: status.as_u16(),
                        url,
                    });
                }
                Err(e) => last = e.to_string(),
            }
            if attempt < attempts {
                debug!(attempt, attempts, url = %url, "request failed, retrying");
                tokio::time::sleep(self.cfg.retry_backoff).await;
            }
        }
        Err(ProviderError::Exhausted { attempts, last })
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait::async_trait]
impl MetadataSource for PixivClient {
    async fn fetch_tags(&self, identifier: &str) -> Result<Vec<String>, ProviderError> {
        match self.fetch_body(identifier).await? {
            Some(body) => parse_tags(&body),
            None => Ok(vec![NOT_FOUND_SENTINEL.to_string()]),
        }
    }

    async fn fetch_description(
        &self,
        identifier: &str,
    ) -> Result<DescriptionRecord, ProviderError> {
        match self.fetch_body(identifier).await? {
            Some(body) => parse_description(&body, &self.cleaner),
            None => Ok(DescriptionRecord::not_found()),
        }
    }

    fn origin_url(&self, identifier: &str) -> String {
        format!("{}{}", self.cfg.artwork_url, identifier)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    body: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IllustBody {
    #[serde(default)]
    illust_title: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    bookmark_count: i64,
    #[serde(default)]
    illust_comment: String,
    #[serde(default)]
    tags: TagBlock,
}

#[derive(Deserialize, Default)]
struct TagBlock {
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    tag: String,
    #[serde(default)]
    translation: Option<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    en: Option<String>,
}

fn parse_body(raw: &str) -> Result<IllustBody, ProviderError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
    if envelope.error {
        return Err(ProviderError::Remote(envelope.message));
    }
    serde_json::from_value(envelope.body).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Artist tag first, then each tag preceded by its English translation;
/// the result is sorted and deduplicated.
pub fn parse_tags(raw: &str) -> Result<Vec<String>, ProviderError> {
    let body = parse_body(raw)?;
    let mut tags = vec![format!(
        "{}{}",
        ARTIST_PREFIX,
        clean_artist_name(&body.user_name)
    )];
    for entry in body.tags.tags {
        if let Some(en) = entry.translation.and_then(|t| t.en) {
            tags.push(en);
        }
        tags.push(entry.tag);
    }
    tags.sort();
    tags.dedup();
    Ok(tags)
}

pub fn parse_description(
    raw: &str,
    cleaner: &HtmlCleaner,
) -> Result<DescriptionRecord, ProviderError> {
    let body = parse_body(raw)?;
    Ok(DescriptionRecord {
        title: body.illust_title,
        author: clean_artist_name(&body.user_name),
        author_id: body.user_id,
        popularity_count: body.bookmark_count,
        comment: cleaner.clean(&body.illust_comment),
    })
}
