use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content API base URL required")]
    MissingBaseUrl,
    #[error("request to {path} failed with HTTP {status}")]
    Status { path: String, status: u16 },
}

/// One video record as served by `/v1/content`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<Thumbnails>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embed: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub medium: Option<Thumbnail>,
    #[serde(default)]
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: Option<String>,
}

impl ContentItem {
    pub fn thumbnail_url(&self) -> Option<&str> {
        let thumbs = self.thumbnails.as_ref();
        let medium = thumbs
            .and_then(|t| t.medium.as_ref())
            .and_then(|t| t.url.as_deref());
        let default = thumbs
            .and_then(|t| t.default.as_ref())
            .and_then(|t| t.url.as_deref());
        non_empty(self.thumb.as_deref())
            .or_else(|| non_empty(medium))
            .or_else(|| non_empty(default))
    }

    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref())
            .map(|title| title.lines().next().unwrap_or(title))
            .unwrap_or("(untitled)")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A page of listing results plus the cursor to resume from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<ContentItem>,
    #[serde(default, rename = "nextCursor", deserialize_with = "blank_as_none")]
    pub next_cursor: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|cursor| !cursor.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CategoryListing {
    #[serde(default, deserialize_with = "null_as_empty")]
    items: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub topic: Option<String>,
    pub language: String,
    pub limit: u32,
    pub cursor: Option<String>,
}

impl Default for ContentQuery {
    fn default() -> Self {
        Self {
            topic: None,
            language: DEFAULT_LANGUAGE.to_string(),
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

impl ContentQuery {
    fn into_params(self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(topic) = self.topic.filter(|t| !t.trim().is_empty()) {
            params.push(("topic".into(), topic));
        }
        let language = if self.language.trim().is_empty() {
            DEFAULT_LANGUAGE.to_string()
        } else {
            self.language
        };
        params.push(("language".into(), language));
        params.push((
            "limit".into(),
            self.limit.clamp(1, MAX_PAGE_SIZE).to_string(),
        ));
        if let Some(cursor) = self.cursor.filter(|c| !c.trim().is_empty()) {
            params.push(("cursor".into(), cursor));
        }
        params
    }
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!(ContentError::MissingBaseUrl);
        }
        if config.user_agent.trim().is_empty() {
            bail!("content client user agent required");
        }
        let base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("parse content API base URL {:?}", config.base_url))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("build content HTTP client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn list_content(&self, query: ContentQuery) -> Result<ContentPage> {
        let mut url = self.endpoint("v1/content")?;
        url.query_pairs_mut().extend_pairs(query.into_params());
        self.get_json(url, "/v1/content")
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let url = self.endpoint("v1/categories")?;
        let listing: CategoryListing = self.get_json(url, "/v1/categories")?;
        Ok(listing.items)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .with_context(|| format!("build URL for {path}"))
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, path: &str) -> Result<T> {
        log::debug!("GET {url}");
        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .with_context(|| format!("request {path}"))?;
        let status = response.status();
        log::debug!("{} {url}", status.as_u16());
        if !status.is_success() {
            bail!(ContentError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response
            .bytes()
            .with_context(|| format!("read {path} response"))?;
        serde_json::from_slice(&body).with_context(|| format!("decode {path} response"))
    }
}
