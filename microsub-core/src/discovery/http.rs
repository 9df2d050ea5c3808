use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::{Entry, Feed};
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::adapters::AdapterError;
use crate::discovery::{DiscoveredFeed, FeedDiscovery};
use crate::normalize::{strip_tags, Author, Post};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on `<link rel="alternate">` feeds fetched from one page.
const MAX_ALTERNATES: usize = 5;

const FEED_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/feed+json",
    "application/json",
];

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid regex")
});

/// Feed discovery over HTTP.
///
/// A URL that parses as RSS, Atom or JSON Feed is its own single feed.
/// Otherwise it is read as an HTML page and every advertised alternate feed
/// is fetched.
pub struct HttpDiscovery {
    client: reqwest::Client,
}

impl HttpDiscovery {
    pub fn new() -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("microsub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdapterError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<(Url, Vec<u8>), AdapterError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AdapterError::Network(format!("Failed to fetch {url}: {e}")))?;

        let final_url = response.url().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AdapterError::Network(format!("Failed to read response body: {e}")))?;

        Ok((final_url, bytes.to_vec()))
    }
}

#[async_trait]
impl FeedDiscovery for HttpDiscovery {
    async fn discover(&self, url: &str) -> Result<Vec<DiscoveredFeed>, AdapterError> {
        let (page_url, body) = self.get(url).await?;

        if let Ok(feed) = parse_feed(url, &body) {
            return Ok(vec![feed]);
        }

        let html = String::from_utf8_lossy(&body);
        let links = alternate_links(&html, &page_url);
        debug!(url = %url, found = links.len(), "Discovered alternate feed links");

        let mut feeds = Vec::new();
        for link in links.into_iter().take(MAX_ALTERNATES) {
            match self.fetch(&link).await {
                Ok(feed) => feeds.push(feed),
                Err(e) => warn!(url = %link, error = %e, "Skipping unreadable alternate feed"),
            }
        }
        Ok(feeds)
    }

    async fn fetch(&self, feed_url: &str) -> Result<DiscoveredFeed, AdapterError> {
        let (_, body) = self.get(feed_url).await?;
        parse_feed(feed_url, &body)
    }
}

pub fn parse_feed(url: &str, body: &[u8]) -> Result<DiscoveredFeed, AdapterError> {
    let feed = feed_rs::parser::parse(body)
        .map_err(|e| AdapterError::Parse(format!("Failed to parse feed: {e}")))?;
    Ok(convert_feed(url, feed))
}

fn convert_feed(url: &str, feed: Feed) -> DiscoveredFeed {
    DiscoveredFeed {
        url: url.to_string(),
        title: feed.title.map(|t| t.content.trim().to_string()).filter(|t| !t.is_empty()),
        photo: feed.icon.or(feed.logo).map(|image| image.uri),
        entries: feed.entries.into_iter().map(convert_entry).collect(),
    }
}

fn convert_entry(entry: Entry) -> Post {
    let permalink = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone());

    let body = entry.content.as_ref().and_then(|c| c.body.clone());
    let summary = entry.summary.map(|s| s.content);
    // With a full body the summary becomes the excerpt; otherwise it is the body.
    let (content_html, excerpt) = match body {
        Some(body) => (Some(body), summary.map(|s| strip_tags(&s))),
        None => (summary, None),
    };

    let thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next();

    Post {
        id: entry.id,
        published: entry.published.or(entry.updated),
        permalink,
        title: entry.title.map(|t| t.content),
        content_html,
        excerpt,
        author: entry.authors.into_iter().next().map(|person| Author {
            name: person.name,
            url: person.uri,
            photo: None,
        }),
        thumbnail,
        categories: entry
            .categories
            .into_iter()
            .map(|c| c.label.unwrap_or(c.term))
            .collect(),
        format: None,
    }
}

/// Absolute URLs of the feeds a page advertises through
/// `<link rel="alternate" type="...">`, deduplicated, in document order.
pub fn alternate_links(html: &str, base: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();

    for tag in LINK_TAG.find_iter(html) {
        let attrs: HashMap<String, String> = ATTRIBUTE
            .captures_iter(tag.as_str())
            .filter_map(|c| {
                let name = c.get(1)?.as_str().to_ascii_lowercase();
                let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?.as_str();
                Some((name, value.to_string()))
            })
            .collect();

        let is_alternate = attrs
            .get("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("alternate")));
        let is_feed = attrs
            .get("type")
            .is_some_and(|t| FEED_TYPES.contains(&t.trim().to_ascii_lowercase().as_str()));
        if !is_alternate || !is_feed {
            continue;
        }

        let Some(href) = attrs.get("href") else { continue };
        if let Ok(resolved) = base.join(href.trim()) {
            let resolved = resolved.to_string();
            if !links.contains(&resolved) {
                links.push(resolved);
            }
        }
    }

    links
}
