use feed_rs::model::{Feed as RsFeed, Link};
use feed_rs::parser;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("feed body is empty")]
    Empty,
    #[error("not a recognizable RSS/Atom feed: {0}")]
    Parse(String),
}

/// A feed in one uniform shape, whatever format it arrived in.
///
/// Every field is raw, uncleaned text and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// A feed item before filtering and cleaning.
///
/// Dates are kept as strings; resolving them is the pipeline's job (see
/// [`resolve_date`](super::dates::resolve_date)).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub date_published: Option<String>,
    pub last_updated: Option<String>,
}

/// Turns a raw feed body into a [`NormalizedFeed`].
pub trait FeedNormalizer {
    fn parse(&self, bytes: &[u8]) -> Result<NormalizedFeed, NormalizeError>;
}

/// [`FeedNormalizer`] backed by `feed-rs` (RSS 0.9x/1.0/2.0, Atom, JSON Feed).
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedRsNormalizer;

impl FeedNormalizer for FeedRsNormalizer {
    fn parse(&self, bytes: &[u8]) -> Result<NormalizedFeed, NormalizeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(NormalizeError::Empty);
        }

        let feed = parser::parse(bytes).map_err(|e| NormalizeError::Parse(e.to_string()))?;
        Ok(normalize(feed))
    }
}

fn normalize(feed: RsFeed) -> NormalizedFeed {
    let url = channel_link(&feed.links);

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| RawEntry {
            title: entry.title.map(|t| t.content),
            content: entry.content.and_then(|c| c.body),
            description: entry.summary.map(|s| s.content),
            date_published: entry.published.map(|dt| dt.to_rfc3339()),
            last_updated: entry.updated.map(|dt| dt.to_rfc3339()),
        })
        .collect();

    NormalizedFeed {
        title: feed.title.map(|t| t.content),
        description: feed.description.map(|d| d.content),
        url,
        entries,
    }
}

/// The site link of a feed: the first un-typed or `alternate` link, else the first link.
fn channel_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}
