use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::adapters::{Adapter, AdapterError, Operation};
use crate::discovery::{DiscoveredFeed, FeedDiscovery};
use crate::jf2::{Card, Channel, Entry, FeedRef, Preview, SearchResults, Timeline};
use crate::merge::TimelineQuery;
use crate::normalize::{post_to_jf2, Post};
use crate::store::{FeedStore, Subscription};

pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

/// A feed reader adapter: follows RSS/Atom/JSON feeds found through a
/// [`FeedDiscovery`] backend and serves their posts as timelines.
///
/// Feeds are filed into the adapter's own channels; requests for any other
/// channel pass through untouched.
pub struct FeedAdapter {
    id: String,
    name: String,
    channels: Vec<Channel>,
    preview_limit: usize,
    store: FeedStore,
    discovery: Arc<dyn FeedDiscovery>,
}

impl FeedAdapter {
    pub fn new(id: String, name: String, store: FeedStore, discovery: Arc<dyn FeedDiscovery>) -> Self {
        Self {
            id,
            name,
            channels: vec![
                Channel {
                    unread: Some(0),
                    ..Channel::new("notifications", "Notifications")
                },
                Channel::new("home", "Home"),
            ],
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            store,
            discovery,
        }
    }

    pub fn with_channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    fn has_channel(&self, uid: &str) -> bool {
        self.channels.iter().any(|c| c.uid == uid)
    }

    async fn discover(&self, url: &str) -> Option<Vec<DiscoveredFeed>> {
        match self.discovery.discover(url).await {
            Ok(feeds) => Some(feeds),
            Err(e) => {
                warn!(adapter = %self.id, url = %url, error = %e, "Feed discovery failed");
                None
            }
        }
    }

    /// Entry for a stored post. Posts without an author are credited to the
    /// feed they came from.
    fn to_jf2(&self, subscription: &Subscription, post: &Post) -> Entry {
        let mut entry = post_to_jf2(post, &format!("{}:{}", self.id, subscription.url));
        if entry.author.is_none() {
            if let Some(title) = &subscription.title {
                entry.author = Some(Card {
                    url: Some(subscription.url.clone()),
                    photo: subscription.photo.clone(),
                    ..Card::new(title.clone())
                });
            }
        }
        entry
    }
}

fn feed_ref(subscription: &Subscription) -> FeedRef {
    FeedRef {
        name: subscription.title.clone(),
        photo: subscription.photo.clone(),
        ..FeedRef::new(subscription.url.clone())
    }
}

fn is_http_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Turn a search query into a URL to discover from. Bare domains get an
/// `https://` prefix; free-text queries yield `None`.
pub fn query_to_url(query: &str) -> Option<String> {
    let query = query.trim();
    if query.is_empty() || query.contains(char::is_whitespace) {
        return None;
    }
    if is_http_url(query) {
        return Some(query.to_string());
    }
    if query.contains("://") || !query.contains('.') {
        return None;
    }
    let candidate = format!("https://{query}");
    is_http_url(&candidate).then_some(candidate)
}

#[async_trait]
impl Adapter for FeedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.discovery.is_available()
    }

    fn owns_feed(&self, url: &str) -> bool {
        self.store.subscription(url).is_some()
    }

    async fn can_handle_url(&self, url: &str) -> bool {
        self.discovery.is_available() && is_http_url(url)
    }

    fn supports(&self, _op: Operation) -> bool {
        true
    }

    async fn get_channels(&self, mut channels: Vec<Channel>, _user_id: &str) -> Vec<Channel> {
        channels.extend(self.channels.iter().cloned());
        channels
    }

    async fn get_timeline(
        &self,
        result: Option<Timeline>,
        channel: &str,
        query: &TimelineQuery,
    ) -> Option<Timeline> {
        if !self.has_channel(channel) {
            return result;
        }

        let mut timeline = result.unwrap_or_default();
        timeline.items.extend(
            self.store
                .posts(channel, query)
                .iter()
                .map(|(subscription, post)| self.to_jf2(subscription, post)),
        );
        Some(timeline)
    }

    async fn get_following(&self, mut result: Vec<FeedRef>, channel: &str, _user_id: &str) -> Vec<FeedRef> {
        result.extend(self.store.subscriptions(Some(channel)).iter().map(feed_ref));
        result
    }

    async fn follow(
        &self,
        result: Option<FeedRef>,
        channel: &str,
        url: &str,
        user_id: &str,
    ) -> Option<FeedRef> {
        if result.is_some() || !self.has_channel(channel) || !self.can_handle_url(url).await {
            return result;
        }

        if let Some(existing) = self.store.subscription(url) {
            if existing.channel == channel {
                debug!(adapter = %self.id, url = %url, "Already following");
                return Some(feed_ref(&existing));
            }
        }

        let Some(feed) = self.discover(url).await.and_then(|feeds| feeds.into_iter().next()) else {
            debug!(adapter = %self.id, url = %url, "No feed found, passing through");
            return result;
        };

        let added = self
            .store
            .subscribe(channel, &feed.url, feed.title.clone(), feed.photo.clone());
        let posts = self.store.add_posts(&feed.url, feed.entries);
        info!(
            adapter = %self.id,
            user = %user_id,
            channel = %channel,
            url = %feed.url,
            added,
            posts,
            "Followed feed"
        );

        Some(FeedRef {
            name: feed.title,
            photo: feed.photo,
            ..FeedRef::new(feed.url)
        })
    }

    async fn unfollow(
        &self,
        result: Option<bool>,
        _channel: &str,
        url: &str,
        user_id: &str,
    ) -> Option<bool> {
        if result.is_some() || !self.owns_feed(url) {
            return result;
        }

        let removed = self.store.unsubscribe(url);
        info!(adapter = %self.id, user = %user_id, url = %url, removed, "Unfollowed feed");
        Some(removed)
    }

    async fn search(&self, result: Option<SearchResults>, query: &str, _user_id: &str) -> Option<SearchResults> {
        if result.is_some() {
            return result;
        }
        let Some(url) = query_to_url(query) else {
            return result;
        };

        let results = self
            .discover(&url)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|feed| FeedRef {
                name: feed.title,
                photo: feed.photo,
                ..FeedRef::new(feed.url)
            })
            .collect();
        Some(SearchResults { results })
    }

    async fn preview(&self, result: Option<Preview>, url: &str, _user_id: &str) -> Option<Preview> {
        if result.is_some() {
            return result;
        }
        let Some(feed) = self.discover(url).await.and_then(|feeds| feeds.into_iter().next()) else {
            return result;
        };

        let subscription = Subscription {
            url: feed.url.clone(),
            channel: String::new(),
            title: feed.title.clone(),
            photo: feed.photo.clone(),
            active: false,
        };
        let items = feed
            .entries
            .iter()
            .take(self.preview_limit)
            .map(|post| self.to_jf2(&subscription, post))
            .collect();
        Some(Preview { items })
    }

    async fn sync(&self) -> Result<(), AdapterError> {
        let subscriptions = self.store.subscriptions(None);
        let mut failures = 0;

        for subscription in &subscriptions {
            match self.discovery.fetch(&subscription.url).await {
                Ok(feed) => {
                    let added = self.store.add_posts(&subscription.url, feed.entries);
                    debug!(adapter = %self.id, url = %subscription.url, added, "Refreshed feed");
                }
                Err(e) => {
                    failures += 1;
                    warn!(adapter = %self.id, url = %subscription.url, error = %e, "Failed to refresh feed");
                }
            }
        }

        if failures > 0 && failures == subscriptions.len() {
            return Err(AdapterError::Backend(format!("All {failures} feeds failed to refresh")));
        }
        Ok(())
    }
}
