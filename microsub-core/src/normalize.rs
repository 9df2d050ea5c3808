//! Mapping of backend-native post records to jf2 entries.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::jf2::{Card, Content, Entry};

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// Author details a backend knows about a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub url: Option<String>,
    pub photo: Option<String>,
}

/// A content record as stored or fetched by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Post {
    /// Backend identifier, unique within its source.
    pub id: String,
    pub published: Option<DateTime<Utc>>,
    pub permalink: Option<String>,
    pub title: Option<String>,
    pub content_html: Option<String>,
    pub excerpt: Option<String>,
    pub author: Option<Author>,
    pub thumbnail: Option<String>,
    pub categories: Vec<String>,
    /// Post kind such as "note", "article" or "photo".
    pub format: Option<String>,
}

/// Remove markup: `<script>`/`<style>` blocks with their bodies, then every
/// remaining tag. The result is trimmed.
pub fn strip_tags(html: &str) -> String {
    let without_blocks = SCRIPT_STYLE.replace_all(html, "");
    TAG.replace_all(&without_blocks, "").trim().to_string()
}

/// Build a jf2 entry for `post`, tagging its id with `source`.
pub fn post_to_jf2(post: &Post, source: &str) -> Entry {
    let mut entry = Entry::new(format!("{source}:{}", post.id));

    entry.published = post
        .published
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false));

    let permalink = post.permalink.as_deref().filter(|p| !p.is_empty());
    entry.url = permalink.map(str::to_string);

    let title = post.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    // Titles derived from the link itself add nothing.
    entry.name = title.filter(|t| Some(*t) != permalink).map(str::to_string);

    entry.content = post
        .content_html
        .as_deref()
        .filter(|html| !html.trim().is_empty())
        .map(|html| Content {
            html: html.to_string(),
            text: strip_tags(html),
        });

    entry.summary = post
        .excerpt
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty() && Some(*e) != title)
        .map(str::to_string);

    entry.author = post.author.as_ref().map(|author| Card {
        url: author.url.clone(),
        photo: author.photo.clone(),
        ..Card::new(author.name.clone())
    });

    entry.photo = post.thumbnail.clone();
    if !post.categories.is_empty() {
        entry.category = Some(post.categories.clone());
    }
    entry.post_type = post.format.clone();

    entry
}
