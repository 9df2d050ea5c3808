//! Timeline merging: deduplication, chronological ordering and cursor windows.

use std::cmp::Reverse;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::jf2::Entry;

pub const DEFAULT_LIMIT: usize = 20;

/// Parse a `published` value. Naive forms are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn published_at(entry: &Entry) -> Option<DateTime<Utc>> {
    entry.published.as_deref().and_then(parse_timestamp)
}

/// Keep the first entry for every non-empty `_id`. Entries without an id are
/// always kept.
pub fn dedupe_by_id(items: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| match item.id.as_deref() {
            Some(id) if !id.is_empty() => seen.insert(id.to_string()),
            _ => true,
        })
        .collect()
}

/// Stable sort, newest first. Entries without a parseable timestamp go last.
pub fn sort_by_published_desc(items: &mut [Entry]) {
    items.sort_by_cached_key(|item| Reverse(published_at(item)));
}

/// Dedupe, then sort. The order matters: the first-seen duplicate survives
/// even when a later copy carries a newer timestamp.
pub fn merge_and_sort(items: Vec<Entry>) -> Vec<Entry> {
    let mut items = dedupe_by_id(items);
    sort_by_published_desc(&mut items);
    items
}

/// Cursor and page size for a timeline request.
///
/// `after` asks for items strictly older than the cursor (newest first);
/// `before` asks for items strictly newer than the cursor and walks forward
/// in ascending order. When both are set `before` wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    pub after: Option<String>,
    pub before: Option<String>,
    pub limit: usize,
}

impl Default for TimelineQuery {
    fn default() -> Self {
        TimelineQuery {
            after: None,
            before: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl TimelineQuery {
    pub fn with_limit(limit: usize) -> Self {
        TimelineQuery {
            limit,
            ..TimelineQuery::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn cursor(&self) -> Option<Cursor> {
        if let Some(before) = self.before.as_deref().and_then(parse_timestamp) {
            return Some(Cursor::Before(before));
        }
        self.after
            .as_deref()
            .and_then(parse_timestamp)
            .map(Cursor::After)
    }

    /// The first cursor value that is present but cannot be parsed.
    pub fn invalid_cursor(&self) -> Option<&str> {
        [self.before.as_deref(), self.after.as_deref()]
            .into_iter()
            .flatten()
            .find(|c| parse_timestamp(c).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    After(DateTime<Utc>),
    Before(DateTime<Utc>),
}

/// Select one page of `items` according to `query`.
pub fn window<T>(
    items: Vec<T>,
    query: &TimelineQuery,
    published: impl Fn(&T) -> Option<DateTime<Utc>>,
) -> Vec<T> {
    let mut keyed: Vec<(Option<DateTime<Utc>>, T)> =
        items.into_iter().map(|item| (published(&item), item)).collect();

    match query.cursor() {
        Some(Cursor::After(cursor)) => {
            keyed.retain(|(ts, _)| matches!(ts, Some(ts) if *ts < cursor));
            keyed.sort_by_key(|(ts, _)| Reverse(*ts));
        }
        Some(Cursor::Before(cursor)) => {
            keyed.retain(|(ts, _)| matches!(ts, Some(ts) if *ts > cursor));
            keyed.sort_by_key(|(ts, _)| *ts);
        }
        None => keyed.sort_by_key(|(ts, _)| Reverse(*ts)),
    }

    keyed
        .into_iter()
        .take(query.limit)
        .map(|(_, item)| item)
        .collect()
}
