use async_trait::async_trait;

use crate::adapters::AdapterError;
use crate::normalize::Post;

#[cfg(feature = "adapter-feeds")]
pub mod http;

/// A feed found at, or linked from, a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredFeed {
    pub url: String,
    pub title: Option<String>,
    pub photo: Option<String>,
    pub entries: Vec<Post>,
}

/// The feed reader backend's narrow interface: find feeds and fetch them.
#[async_trait]
pub trait FeedDiscovery: Send + Sync {
    /// Whether the backend can currently be used.
    fn is_available(&self) -> bool {
        true
    }

    /// Feeds reachable from `url`, in document order. An empty list means
    /// nothing was found.
    async fn discover(&self, url: &str) -> Result<Vec<DiscoveredFeed>, AdapterError>;

    /// Fetch a known feed.
    async fn fetch(&self, feed_url: &str) -> Result<DiscoveredFeed, AdapterError>;
}
