//! News item model and the normalization rules applied to raw feed items.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum length of a cleaned description, in characters.
pub const DESCRIPTION_LIMIT: usize = 150;

/// Category whose default image is used for unknown categories.
pub const BASELINE_CATEGORY: &str = "Tech News";

const DEFAULT_IMAGES: &[(&str, &str)] = &[
    (
        "Tech News",
        "https://images.unsplash.com/photo-1677442136019-21780ecad995?w=400",
    ),
    (
        "Research",
        "https://images.unsplash.com/photo-1620712943543-bcc4688e7485?w=400",
    ),
    (
        "Business",
        "https://images.unsplash.com/photo-1531746790731-6c087fecd65a?w=400",
    ),
    (
        "Industry",
        "https://images.unsplash.com/photo-1639762681485-074b7f938ba0?w=400",
    ),
];

/// Units used by [`time_ago`], largest first.
const INTERVALS: &[(&str, i64)] = &[
    ("year", 31_536_000),
    ("month", 2_592_000),
    ("week", 604_800),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
];

/// A configured origin of news items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    BASELINE_CATEGORY.to_string()
}

impl FeedSource {
    pub fn new(name: &str, url: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
        }
    }
}

/// An item as delivered by a feed client, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub thumbnail: Option<String>,
    pub enclosure_link: Option<String>,
}

/// A normalized news item, attributable to exactly one [`FeedSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub category: String,
    pub thumbnail: String,
}

impl NewsItem {
    /// Normalizes a raw item. Returns `None` for items without a link.
    pub fn from_raw(raw: RawItem, source: &FeedSource) -> Option<Self> {
        let link = non_empty(raw.link)?;

        let title = raw.title.unwrap_or_default();
        let description = non_empty(raw.description)
            .or(non_empty(raw.content))
            .map(|html| clean_description(&html))
            .unwrap_or_default();
        let thumbnail = non_empty(raw.thumbnail)
            .or(non_empty(raw.enclosure_link))
            .unwrap_or_else(|| default_image(&source.category).to_string());

        Some(Self {
            title,
            description,
            link,
            published_at: raw.published,
            source_name: source.name.clone(),
            category: source.category.clone(),
            thumbnail,
        })
    }

    /// Image to swap in when the thumbnail fails to load.
    pub fn fallback_image(&self) -> &'static str {
        default_image(&self.category)
    }

    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        match self.published_at {
            Some(published) => time_ago(now, published),
            None => "Just now".to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

/// Strips HTML tags and bounds the text to [`DESCRIPTION_LIMIT`] characters,
/// appending `...` when it had to be cut.
pub fn clean_description(html: &str) -> String {
    let text = tag_pattern().replace_all(html, "").replace("&nbsp;", " ");
    let text = text.trim();

    if text.chars().count() > DESCRIPTION_LIMIT {
        let mut cut: String = text.chars().take(DESCRIPTION_LIMIT).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

/// Default image for a category, falling back to the baseline category.
pub fn default_image(category: &str) -> &'static str {
    let lookup = |name: &str| {
        DEFAULT_IMAGES
            .iter()
            .find(|(c, _)| *c == name)
            .map(|(_, url)| *url)
    };

    lookup(category)
        .or_else(|| lookup(BASELINE_CATEGORY))
        .unwrap_or_default()
}

/// Formats the age of `published` relative to `now` in its largest whole unit.
pub fn time_ago(now: DateTime<Utc>, published: DateTime<Utc>) -> String {
    let seconds = (now - published).num_seconds();

    for (unit, unit_seconds) in INTERVALS {
        let count = seconds / unit_seconds;
        if count >= 1 {
            let plural = if count > 1 { "s" } else { "" };
            return format!("{} {}{} ago", count, unit, plural);
        }
    }

    "Just now".to_string()
}

/// Parses the date formats seen in feed payloads. Unknown formats yield `None`.
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
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
    // The conversion service reports naive UTC timestamps
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
