use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::merge::{window, TimelineQuery};
use crate::normalize::Post;

/// A followed feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub url: String,
    pub channel: String,
    pub title: Option<String>,
    pub photo: Option<String>,
    pub active: bool,
}

#[derive(Default)]
struct Inner {
    // feed url -> subscription, in follow order
    subscriptions: Vec<Subscription>,
    // feed url -> posts fetched from it
    posts: HashMap<String, Vec<Post>>,
}

/// In-memory subscription and post storage for the feed adapter.
///
/// Unfollowing deactivates a subscription; its posts stay stored but drop out
/// of timelines until the feed is followed again.
#[derive(Clone, Default)]
pub struct FeedStore {
    inner: Arc<RwLock<Inner>>,
}

impl FeedStore {
    pub fn new() -> Self {
        FeedStore::default()
    }

    /// Follow `url` in `channel`. Returns `false` when an identical active
    /// subscription already exists. Re-following an inactive or differently
    /// filed feed reactivates it in the requested channel.
    pub fn subscribe(&self, channel: &str, url: &str, title: Option<String>, photo: Option<String>) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.subscriptions.iter_mut().find(|s| s.url == url) {
            Some(existing) if existing.active && existing.channel == channel => false,
            Some(existing) => {
                existing.channel = channel.to_string();
                existing.active = true;
                if title.is_some() {
                    existing.title = title;
                }
                if photo.is_some() {
                    existing.photo = photo;
                }
                true
            }
            None => {
                inner.subscriptions.push(Subscription {
                    url: url.to_string(),
                    channel: channel.to_string(),
                    title,
                    photo,
                    active: true,
                });
                true
            }
        }
    }

    /// Deactivate the subscription for `url`. Returns `false` if there was no
    /// active subscription.
    pub fn unsubscribe(&self, url: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.subscriptions.iter_mut().find(|s| s.url == url && s.active) {
            Some(existing) => {
                existing.active = false;
                true
            }
            None => false,
        }
    }

    pub fn subscription(&self, url: &str) -> Option<Subscription> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscriptions
            .iter()
            .find(|s| s.url == url && s.active)
            .cloned()
    }

    /// Active subscriptions, optionally limited to one channel.
    pub fn subscriptions(&self, channel: Option<&str>) -> Vec<Subscription> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscriptions
            .iter()
            .filter(|s| s.active && channel.map_or(true, |c| s.channel == c))
            .cloned()
            .collect()
    }

    /// Store posts fetched from `feed_url`, skipping ids already stored for
    /// that feed. Returns how many were added.
    pub fn add_posts(&self, feed_url: &str, posts: Vec<Post>) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let stored = inner.posts.entry(feed_url.to_string()).or_default();
        let mut known: HashSet<String> = stored.iter().map(|p| p.id.clone()).collect();

        let before = stored.len();
        for post in posts {
            if known.insert(post.id.clone()) {
                stored.push(post);
            }
        }
        stored.len() - before
    }

    /// One page of posts from the active feeds filed under `channel`, each
    /// paired with the feed it came from.
    pub fn posts(&self, channel: &str, query: &TimelineQuery) -> Vec<(Subscription, Post)> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let candidates: Vec<(Subscription, Post)> = inner
            .subscriptions
            .iter()
            .filter(|s| s.active && s.channel == channel)
            .flat_map(|s| {
                inner
                    .posts
                    .get(&s.url)
                    .into_iter()
                    .flatten()
                    .map(move |p| (s.clone(), p.clone()))
            })
            .collect();

        window(candidates, query, |(_, post)| post.published)
    }
}
