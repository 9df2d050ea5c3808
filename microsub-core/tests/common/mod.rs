#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use microsub_core::normalize::Post;
use microsub_core::{
    Adapter, AdapterError, Channel, DiscoveredFeed, Entry, FeedAdapter, FeedDiscovery, FeedRef,
    FeedStore, Operation, Preview, Registry, Router, SearchResults, Timeline, TimelineQuery,
};

/// Answers every operation with a fixed, definitive value.
pub struct TestAdapter;

#[async_trait]
impl Adapter for TestAdapter {
    fn id(&self) -> &str {
        "test-adapter"
    }

    fn name(&self) -> &str {
        "Test Adapter"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn get_channels(&self, mut channels: Vec<Channel>, _user_id: &str) -> Vec<Channel> {
        channels.push(Channel::new("notifications", "Notifications"));
        channels.push(Channel::new("home", "Home"));
        channels
    }

    async fn get_timeline(&self, _result: Option<Timeline>, _channel: &str, _query: &TimelineQuery) -> Option<Timeline> {
        Some(Timeline {
            items: vec![Entry::new("test-1").url("https://example.com/post/1")],
            paging: None,
        })
    }

    async fn get_following(&self, mut result: Vec<FeedRef>, _channel: &str, _user_id: &str) -> Vec<FeedRef> {
        result.push(FeedRef::new("https://example.com/feed"));
        result
    }

    async fn follow(&self, _result: Option<FeedRef>, _channel: &str, url: &str, _user_id: &str) -> Option<FeedRef> {
        Some(FeedRef::new(url))
    }

    async fn unfollow(&self, _result: Option<bool>, _channel: &str, _url: &str, _user_id: &str) -> Option<bool> {
        Some(true)
    }
}

/// Adds one channel and one followed feed; passes everything else through.
pub struct SecondAdapter;

#[async_trait]
impl Adapter for SecondAdapter {
    fn id(&self) -> &str {
        "second-adapter"
    }

    fn name(&self) -> &str {
        "Second Adapter"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn get_channels(&self, mut channels: Vec<Channel>, _user_id: &str) -> Vec<Channel> {
        channels.push(Channel::new("second-channel", "Second Channel"));
        channels
    }

    async fn get_timeline(&self, result: Option<Timeline>, _channel: &str, _query: &TimelineQuery) -> Option<Timeline> {
        result
    }

    async fn get_following(&self, mut result: Vec<FeedRef>, _channel: &str, _user_id: &str) -> Vec<FeedRef> {
        result.push(FeedRef::new("https://second.example/feed"));
        result
    }

    async fn follow(&self, result: Option<FeedRef>, _channel: &str, _url: &str, _user_id: &str) -> Option<FeedRef> {
        result
    }

    async fn unfollow(&self, result: Option<bool>, _channel: &str, _url: &str, _user_id: &str) -> Option<bool> {
        result
    }
}

/// Resolves only when nobody before it has, with a recognisable value.
pub struct FallbackAdapter;

#[async_trait]
impl Adapter for FallbackAdapter {
    fn id(&self) -> &str {
        "fallback"
    }

    fn name(&self) -> &str {
        "Fallback"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn supports(&self, _op: Operation) -> bool {
        true
    }

    async fn get_channels(&self, channels: Vec<Channel>, _user_id: &str) -> Vec<Channel> {
        channels
    }

    async fn get_timeline(&self, result: Option<Timeline>, _channel: &str, _query: &TimelineQuery) -> Option<Timeline> {
        result.or_else(|| {
            Some(Timeline {
                items: vec![Entry::new("fallback-1")],
                paging: None,
            })
        })
    }

    async fn get_following(&self, result: Vec<FeedRef>, _channel: &str, _user_id: &str) -> Vec<FeedRef> {
        result
    }

    async fn follow(&self, result: Option<FeedRef>, _channel: &str, _url: &str, _user_id: &str) -> Option<FeedRef> {
        result.or_else(|| Some(FeedRef::new("https://fallback.example/feed")))
    }

    async fn unfollow(&self, result: Option<bool>, _channel: &str, _url: &str, _user_id: &str) -> Option<bool> {
        result.or(Some(false))
    }

    async fn search(&self, result: Option<SearchResults>, _query: &str, _user_id: &str) -> Option<SearchResults> {
        result.or_else(|| {
            Some(SearchResults {
                results: vec![FeedRef::new("https://fallback.example/feed")],
            })
        })
    }

    async fn preview(&self, result: Option<Preview>, _url: &str, _user_id: &str) -> Option<Preview> {
        result
    }
}

/// An adapter whose availability can be switched at runtime and which counts
/// how often it is asked for channels.
pub struct ToggleAdapter {
    pub id: String,
    pub available: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
}

impl ToggleAdapter {
    pub fn new(id: &str) -> Self {
        ToggleAdapter {
            id: id.to_string(),
            available: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Adapter for ToggleAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Toggle"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get_channels(&self, mut channels: Vec<Channel>, _user_id: &str) -> Vec<Channel> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        channels.push(Channel::new(format!("{}-channel", self.id), "Toggle"));
        channels
    }

    async fn get_timeline(&self, result: Option<Timeline>, _channel: &str, _query: &TimelineQuery) -> Option<Timeline> {
        result
    }

    async fn get_following(&self, result: Vec<FeedRef>, _channel: &str, _user_id: &str) -> Vec<FeedRef> {
        result
    }

    async fn follow(&self, result: Option<FeedRef>, _channel: &str, _url: &str, _user_id: &str) -> Option<FeedRef> {
        result
    }

    async fn unfollow(&self, result: Option<bool>, _channel: &str, _url: &str, _user_id: &str) -> Option<bool> {
        result
    }

    async fn sync(&self) -> Result<(), AdapterError> {
        Err(AdapterError::Backend(format!("{} cannot sync", self.id)))
    }
}

/// In-memory discovery backend keyed by URL.
#[derive(Default)]
pub struct MockDiscovery {
    feeds: Mutex<HashMap<String, Vec<DiscoveredFeed>>>,
    failing: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl MockDiscovery {
    pub fn new() -> Self {
        MockDiscovery::default()
    }

    /// Serve `feed` at its own URL and at every page URL in `pages`.
    pub fn with_feed(self, feed: DiscoveredFeed, pages: &[&str]) -> Self {
        {
            let mut feeds = self.feeds.lock().unwrap();
            for url in pages.iter().copied().chain([feed.url.as_str()]) {
                feeds.entry(url.to_string()).or_default().push(feed.clone());
            }
        }
        self
    }

    /// Replace what is served at `url`, e.g. to simulate new posts.
    pub fn set_feed(&self, feed: DiscoveredFeed) {
        self.feeds.lock().unwrap().insert(feed.url.clone(), vec![feed]);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedDiscovery for MockDiscovery {
    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    async fn discover(&self, url: &str) -> Result<Vec<DiscoveredFeed>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(url) {
            return Err(AdapterError::Network(format!("connection refused: {url}")));
        }
        Ok(self.feeds.lock().unwrap().get(url).cloned().unwrap_or_default())
    }

    async fn fetch(&self, feed_url: &str) -> Result<DiscoveredFeed, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(feed_url) {
            return Err(AdapterError::Network(format!("connection refused: {feed_url}")));
        }
        self.feeds
            .lock()
            .unwrap()
            .get(feed_url)
            .and_then(|feeds| feeds.first().cloned())
            .ok_or_else(|| AdapterError::Network(format!("404: {feed_url}")))
    }
}

/// A post published at midnight UTC on `date` (YYYY-MM-DD).
pub fn post(id: &str, date: &str) -> Post {
    let day = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    Post {
        id: id.to_string(),
        published: Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap())),
        permalink: Some(format!("https://blog.example/{id}")),
        title: Some(format!("Post {id}")),
        content_html: Some(format!("<p>Body of {id}</p>")),
        ..Post::default()
    }
}

pub fn feed(url: &str, title: &str, posts: Vec<Post>) -> DiscoveredFeed {
    DiscoveredFeed {
        url: url.to_string(),
        title: Some(title.to_string()),
        photo: None,
        entries: posts,
    }
}

pub fn feed_adapter(discovery: Arc<MockDiscovery>) -> FeedAdapter {
    FeedAdapter::new("feeds".into(), "Feeds".into(), FeedStore::new(), discovery)
}

pub fn router(adapters: Vec<Arc<dyn Adapter>>) -> Router {
    let mut registry = Registry::new();
    for adapter in adapters {
        registry.register(adapter);
    }
    Router::new(registry)
}
