use providers::pixiv::PixivConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub batch: BatchConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "billfish.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub write_tags: bool,
    pub write_notes: bool,
    pub skip_existing: bool,
    /// First file (by id order) to process.
    pub offset: i64,
    /// Number of files to process; 0 means everything after `offset`.
    pub limit: i64,
    pub tag_workers: usize,
    pub note_workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_tags: true,
            write_notes: true,
            skip_existing: true,
            offset: 0,
            limit: 0,
            tag_workers: 8,
            note_workers: 8,
        }
    }
}

/// Row counts at which each write buffer is flushed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub tags: usize,
    pub associations: usize,
    pub notes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            tags: 20,
            associations: 50,
            notes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_url: String,
    pub artwork_url: String,
    pub request_timeout_secs: u64,
    pub retry_count: u32,
    pub retry_backoff_ms: u64,
    pub request_delay_ms: u64,
    pub use_proxy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let headers = [
            ("Host", "www.pixiv.net"),
            ("referer", "https://www.pixiv.net/"),
            ("origin", "https://accounts.pixiv.net"),
            ("accept-language", "zh-CN,zh;q=0.9"),
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0.2924.87 Safari/537.36",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            api_url: "https://www.pixiv.net/ajax/illust/".to_string(),
            artwork_url: "https://www.pixiv.net/artworks/".to_string(),
            request_timeout_secs: 5,
            retry_count: 5,
            retry_backoff_ms: 500,
            request_delay_ms: 100,
            use_proxy: false,
            http_proxy: None,
            https_proxy: None,
            headers,
        }
    }
}

impl SourceConfig {
    pub fn to_pixiv_config(&self) -> PixivConfig {
        let proxy = |p: &Option<String>| {
            if self.use_proxy {
                p.clone().filter(|s| !s.is_empty())
            } else {
                None
            }
        };
        PixivConfig {
            api_url: self.api_url.clone(),
            artwork_url: self.artwork_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry_count: self.retry_count,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            request_delay: Duration::from_millis(self.request_delay_ms),
            http_proxy: proxy(&self.http_proxy),
            https_proxy: proxy(&self.https_proxy),
            headers: self.headers.clone().into_iter().collect(),
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("TAGSYNC").separator("__"));
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

/// Default configuration rendered as TOML.
pub fn default_toml() -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(&AppConfig::default())?)
}
