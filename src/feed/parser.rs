use super::dates::{recency_threshold, resolve_date};
use super::model::{Entry, Feed, FeedCollection};
use super::normalizer::{FeedNormalizer, FeedRsNormalizer, NormalizedFeed, RawEntry};
use super::source::{HttpSource, OpenedStream};
use crate::render::{CleanError, ContextCleaner, TextCleaner};
use chrono::{DateTime, Utc};

/// Default recency window for [`FeedParser::fetch`], in days.
pub const DEFAULT_AGE_DAYS: f64 = 1.0;

/// Fetches one feed and turns it into a cleaned, recency-filtered [`Feed`].
///
/// The URL is opened when the parser is created. A failure there is logged
/// and remembered rather than returned: [`fetch`](Self::fetch) then yields
/// `None`. The open stream is owned by the parser and released when `fetch`
/// consumes it, or when the parser is dropped unfetched.
pub struct FeedParser {
    id: String,
    url: String,
    stream: Option<OpenedStream>,
    normalizer: Box<dyn FeedNormalizer + Send + Sync>,
    cleaner: Box<dyn TextCleaner + Send + Sync>,
}

impl FeedParser {
    pub async fn open(source: &HttpSource, id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        let url = url.into();

        let stream = match source.open(&url).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(feed = %id, url = %url, error = %e, "Cannot read feed");
                None
            }
        };

        Self {
            id,
            url,
            stream,
            normalizer: Box::new(FeedRsNormalizer),
            cleaner: Box::new(ContextCleaner::default()),
        }
    }

    pub fn with_normalizer(mut self, normalizer: impl FeedNormalizer + Send + Sync + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn with_cleaner(mut self, cleaner: impl TextCleaner + Send + Sync + 'static) -> Self {
        self.cleaner = Box::new(cleaner);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The URL as given, before redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether opening the URL succeeded.
    pub fn is_available(&self) -> bool {
        self.stream.is_some()
    }

    /// Reads, normalizes, filters and cleans the feed.
    ///
    /// Keeps entries dated no earlier than `age_days` before now (fractions
    /// allowed). Returns `None` if the URL could not be opened, the body could
    /// not be read, or the body is not a feed. Cleaning problems never abort the
    /// fetch; they blank the affected field.
    pub async fn fetch(self, age_days: f64) -> Option<Feed> {
        self.fetch_at(age_days, Utc::now()).await
    }

    async fn fetch_at(self, age_days: f64, now: DateTime<Utc>) -> Option<Feed> {
        let Self {
            id,
            stream,
            normalizer,
            cleaner,
            ..
        } = self;

        let Some(stream) = stream else {
            tracing::debug!(feed = %id, "No usable source, skipping fetch");
            return None;
        };

        let final_url = stream.url().to_string();
        let bytes = match stream.read_to_end().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(feed = %id, url = %final_url, error = %e, "Failed to read feed body");
                return None;
            }
        };

        let normalized = match normalizer.parse(&bytes) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::warn!(feed = %id, url = %final_url, error = %e, "Failed to parse feed");
                return None;
            }
        };

        let feed = clean_feed(normalized, &final_url, age_days, now, cleaner.as_ref());
        tracing::info!(feed = %id, entries = feed.entries().len(), "Fetched feed");
        Some(feed)
    }
}

/// Fetches `(id, url)` pairs one after another into a collection keyed by id.
///
/// Feeds that cannot be fetched are logged and left out; an id given twice
/// keeps its first position and the later result.
pub async fn fetch_all<'a>(
    source: &HttpSource,
    feeds: impl IntoIterator<Item = (&'a str, &'a str)>,
    age_days: f64,
) -> FeedCollection {
    let mut collection = FeedCollection::new();
    for (id, url) in feeds {
        match FeedParser::open(source, id, url).await.fetch(age_days).await {
            Some(feed) => {
                collection.insert_feed(id, feed);
            }
            None => tracing::info!(feed = %id, "Skipping feed with no result"),
        }
    }
    collection
}

impl std::fmt::Debug for FeedParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedParser")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

/// Filters `normalized` to entries not older than `age_days` before `now` and
/// cleans every text field.
pub(crate) fn clean_feed(
    normalized: NormalizedFeed,
    fallback_url: &str,
    age_days: f64,
    now: DateTime<Utc>,
    cleaner: &dyn TextCleaner,
) -> Feed {
    let NormalizedFeed {
        title,
        description,
        url,
        entries,
    } = normalized;

    let threshold = recency_threshold(now, age_days);
    let total = entries.len();

    let entries: Vec<Entry> = entries
        .into_iter()
        .filter(|entry| resolve_date(entry, now) >= threshold)
        .map(|entry| clean_entry(&entry, cleaner))
        .collect();

    tracing::debug!(
        kept = entries.len(),
        dropped = total - entries.len(),
        threshold = %threshold,
        "Applied recency filter"
    );

    let url = url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| fallback_url.to_string());

    Feed::new(
        clean_field("title", title.as_deref(), |t| cleaner.convert_generic(t)),
        clean_field("description", description.as_deref(), |d| {
            cleaner.convert_generic(d)
        }),
        url,
        entries,
    )
}

fn clean_entry(entry: &RawEntry, cleaner: &dyn TextCleaner) -> Entry {
    Entry::new(
        clean_field("entry title", entry.title.as_deref(), |t| cleaner.convert_html(t)),
        clean_field("entry content", Some(entry_body(entry)), |c| {
            cleaner.convert_html(c)
        }),
    )
}

/// The item's dedicated content, or its description when the content is absent or empty.
fn entry_body(entry: &RawEntry) -> &str {
    entry
        .content
        .as_deref()
        .filter(|content| !content.is_empty())
        .or(entry.description.as_deref())
        .unwrap_or("")
}

/// Cleans one field. Absent input and cleaning failures both yield an empty string.
fn clean_field(
    field: &'static str,
    raw: Option<&str>,
    convert: impl FnOnce(&str) -> Result<String, CleanError>,
) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    convert(raw).unwrap_or_else(|e| {
        tracing::warn!(field, error = %e, "Failed to clean field, leaving it empty");
        String::new()
    })
}
