use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapters::{Adapter, Operation};
use crate::error::MicrosubError;
use crate::jf2::{Channel, FeedRef, Paging, Preview, SearchResults, Timeline};
use crate::merge::{merge_and_sort, Cursor, TimelineQuery};
use crate::registry::{AdapterInfo, Registry};

/// Outcome of [`Router::sync_all`].
#[derive(Debug, Default)]
pub struct SyncReport {
    /// How many adapters synced successfully
    pub synced: usize,
    /// Failures from individual adapters (adapter_id, error)
    pub errors: Vec<(String, String)>,
}

/// Dispatches Microsub operations across every registered adapter.
///
/// Each operation is a fold over the adapters in registration order. Adapters
/// run one after another; none starts before the previous one has returned.
pub struct Router {
    registry: Registry,
}

impl Router {
    pub fn new(registry: Registry) -> Self {
        Router { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn adapters(&self) -> Vec<AdapterInfo> {
        self.registry.summaries()
    }

    pub async fn channels(&self, user_id: &str) -> Vec<Channel> {
        let op = Operation::Channels;
        fold_list(&self.participants(op), op, |adapter, acc| async move {
            adapter.get_channels(acc, user_id).await
        })
        .await
    }

    pub async fn timeline(&self, channel: &str, query: &TimelineQuery) -> Result<Timeline, MicrosubError> {
        if channel.is_empty() {
            return Err(MicrosubError::InvalidRequest("Missing channel".into()));
        }
        if query.limit == 0 {
            return Err(MicrosubError::InvalidRequest("limit must be at least 1".into()));
        }
        if let Some(cursor) = query.invalid_cursor() {
            return Err(MicrosubError::InvalidRequest(format!("Invalid paging cursor: {cursor}")));
        }

        let op = Operation::Timeline;
        let participants = self.require(op)?;
        let timeline = fold_single(&participants, op, |adapter, acc| async move {
            adapter.get_timeline(acc, channel, query).await
        })
        .await
        .ok_or_else(|| MicrosubError::NotFound(format!("Unknown channel: {channel}")))?;

        Ok(finalize_timeline(timeline, query))
    }

    pub async fn following(&self, channel: &str, user_id: &str) -> Vec<FeedRef> {
        let op = Operation::Following;
        fold_list(&self.participants(op), op, |adapter, acc| async move {
            adapter.get_following(acc, channel, user_id).await
        })
        .await
    }

    pub async fn follow(&self, channel: &str, url: &str, user_id: &str) -> Result<FeedRef, MicrosubError> {
        if channel.is_empty() {
            return Err(MicrosubError::InvalidRequest("Missing channel".into()));
        }
        validate_url(url)?;

        let op = Operation::Follow;
        let participants = self.require(op)?;
        fold_single(&participants, op, |adapter, acc| async move {
            adapter.follow(acc, channel, url, user_id).await
        })
        .await
        .ok_or_else(|| MicrosubError::NotFound(format!("No adapter could follow {url}")))
    }

    pub async fn unfollow(&self, channel: &str, url: &str, user_id: &str) -> Result<bool, MicrosubError> {
        if url.is_empty() {
            return Err(MicrosubError::InvalidRequest("Missing url".into()));
        }

        let op = Operation::Unfollow;
        let participants = self.require(op)?;
        fold_single(&participants, op, |adapter, acc| async move {
            adapter.unfollow(acc, channel, url, user_id).await
        })
        .await
        .ok_or_else(|| MicrosubError::NotFound(format!("No adapter manages {url}")))
    }

    pub async fn search(&self, query: &str, user_id: &str) -> Result<SearchResults, MicrosubError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MicrosubError::InvalidRequest("Missing query".into()));
        }

        let op = Operation::Search;
        let participants = self.require(op)?;
        let results = fold_single(&participants, op, |adapter, acc| async move {
            adapter.search(acc, query, user_id).await
        })
        .await;
        Ok(results.unwrap_or_default())
    }

    pub async fn preview(&self, url: &str, user_id: &str) -> Result<Preview, MicrosubError> {
        validate_url(url)?;

        let op = Operation::Preview;
        let participants = self.require(op)?;
        fold_single(&participants, op, |adapter, acc| async move {
            adapter.preview(acc, url, user_id).await
        })
        .await
        .ok_or_else(|| MicrosubError::NotFound(format!("Nothing to preview at {url}")))
    }

    /// Run every available adapter's sync. One failure does not stop the rest.
    pub async fn sync_all(&self) -> SyncReport {
        let mut report = SyncReport::default();

        for adapter in self.registry.adapters() {
            if !adapter.is_available() {
                debug!(adapter = %adapter.id(), "Adapter unavailable, skipping sync");
                continue;
            }
            match adapter.sync().await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    warn!(adapter = %adapter.id(), error = %e, "Failed to sync adapter, skipping");
                    report.errors.push((adapter.id().to_string(), e.to_string()));
                }
            }
        }

        report
    }

    /// Adapters taking part in `op` for this dispatch. Availability is
    /// checked here, once per dispatch.
    fn participants(&self, op: Operation) -> Vec<Arc<dyn Adapter>> {
        self.registry
            .adapters()
            .iter()
            .filter(|adapter| {
                if !adapter.supports(op) {
                    return false;
                }
                let available = adapter.is_available();
                if !available {
                    debug!(adapter = %adapter.id(), %op, "Adapter unavailable, passing through");
                }
                available
            })
            .cloned()
            .collect()
    }

    fn require(&self, op: Operation) -> Result<Vec<Arc<dyn Adapter>>, MicrosubError> {
        let participants = self.participants(op);
        if participants.is_empty() {
            return Err(MicrosubError::NotImplemented(format!(
                "No active adapter supports {op}"
            )));
        }
        Ok(participants)
    }
}

async fn fold_list<T, F, Fut>(participants: &[Arc<dyn Adapter>], op: Operation, mut step: F) -> Vec<T>
where
    F: FnMut(Arc<dyn Adapter>, Vec<T>) -> Fut,
    Fut: Future<Output = Vec<T>>,
{
    let mut acc = Vec::new();
    for adapter in participants {
        let before = acc.len();
        acc = step(adapter.clone(), acc).await;
        debug!(adapter = %adapter.id(), %op, before, after = acc.len(), "Folded adapter");
    }
    acc
}

async fn fold_single<T, F, Fut>(participants: &[Arc<dyn Adapter>], op: Operation, mut step: F) -> Option<T>
where
    F: FnMut(Arc<dyn Adapter>, Option<T>) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut acc = None;
    for adapter in participants {
        let unset = acc.is_none();
        acc = step(adapter.clone(), acc).await;
        if unset && acc.is_some() {
            debug!(adapter = %adapter.id(), %op, "Adapter resolved result");
        }
    }
    acc
}

fn validate_url(url: &str) -> Result<(), MicrosubError> {
    if url.is_empty() {
        return Err(MicrosubError::InvalidRequest("Missing url".into()));
    }
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(MicrosubError::InvalidRequest(format!("Not an http(s) URL: {url}"))),
    }
}

/// Merge the combined items into one page and derive paging cursors when no
/// adapter supplied them.
fn finalize_timeline(mut timeline: Timeline, query: &TimelineQuery) -> Timeline {
    let mut items = merge_and_sort(std::mem::take(&mut timeline.items));
    let ascending = matches!(query.cursor(), Some(Cursor::Before(_)));

    if items.len() > query.limit {
        // A `before` page is the slice closest to the cursor, i.e. the oldest.
        if ascending {
            items = items.split_off(items.len() - query.limit);
        } else {
            items.truncate(query.limit);
        }
    }
    if ascending {
        items.reverse();
    }

    if timeline.paging.is_none() {
        let (newest, oldest) = if ascending {
            (items.last(), items.first())
        } else {
            (items.first(), items.last())
        };
        let paging = Paging {
            before: newest.and_then(|e| e.published.clone()),
            after: if items.len() >= query.limit {
                oldest.and_then(|e| e.published.clone())
            } else {
                None
            },
        };
        if paging.before.is_some() || paging.after.is_some() {
            timeline.paging = Some(paging);
        }
    }

    timeline.items = items;
    timeline
}
