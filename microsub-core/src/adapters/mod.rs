use async_trait::async_trait;
use thiserror::Error;

use crate::jf2::{Channel, FeedRef, Preview, SearchResults, Timeline};
use crate::merge::TimelineQuery;

pub mod feeds;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// The Microsub operations an adapter can take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Channels,
    Timeline,
    Following,
    Follow,
    Unfollow,
    Search,
    Preview,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Channels => "channels",
            Operation::Timeline => "timeline",
            Operation::Following => "following",
            Operation::Follow => "follow",
            Operation::Unfollow => "unfollow",
            Operation::Search => "search",
            Operation::Preview => "preview",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pluggable content backend.
///
/// Every operation receives the accumulator built by the adapters registered
/// before it and returns the accumulator for the next one. Returning the
/// argument untouched is a pass-through. List operations are expected to
/// append; single-result operations either pass `None`/the current value
/// through or replace it with a definitive answer.
///
/// Backend failures must not escape: log them and pass the accumulator on.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Unique identifier (e.g., "feeds"). Re-registering an id replaces the
    /// earlier adapter.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Whether the backend can currently serve requests. Checked before every
    /// dispatch; an unavailable adapter is skipped.
    fn is_available(&self) -> bool;

    /// Whether this adapter manages the feed at `url`. Used to claim unfollow.
    fn owns_feed(&self, _url: &str) -> bool {
        false
    }

    /// Whether this adapter is able to follow `url`.
    async fn can_handle_url(&self, _url: &str) -> bool {
        false
    }

    /// Capability flags. The five core operations are mandatory; search and
    /// preview are opt-in.
    fn supports(&self, op: Operation) -> bool {
        !matches!(op, Operation::Search | Operation::Preview)
    }

    async fn get_channels(&self, channels: Vec<Channel>, user_id: &str) -> Vec<Channel>;

    async fn get_timeline(
        &self,
        result: Option<Timeline>,
        channel: &str,
        query: &TimelineQuery,
    ) -> Option<Timeline>;

    async fn get_following(&self, result: Vec<FeedRef>, channel: &str, user_id: &str) -> Vec<FeedRef>;

    async fn follow(
        &self,
        result: Option<FeedRef>,
        channel: &str,
        url: &str,
        user_id: &str,
    ) -> Option<FeedRef>;

    async fn unfollow(
        &self,
        result: Option<bool>,
        channel: &str,
        url: &str,
        user_id: &str,
    ) -> Option<bool>;

    async fn search(&self, result: Option<SearchResults>, _query: &str, _user_id: &str) -> Option<SearchResults> {
        result
    }

    async fn preview(&self, result: Option<Preview>, _url: &str, _user_id: &str) -> Option<Preview> {
        result
    }

    /// Refresh backend content, e.g. poll followed feeds.
    async fn sync(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}
