//! Fetching a feed and reducing it to recent, cleaned entries.
//!
//! The pipeline runs once per [`FeedParser`]:
//!
//! 1. [`source`] opens the URL over HTTP (single attempt)
//! 2. [`normalizer`] maps RSS/Atom into one shape using `feed-rs`
//! 3. [`dates`] resolves each entry's date and applies the recency window
//! 4. the [`TextCleaner`](crate::render::TextCleaner) turns every text field
//!    into document-ready text
//!
//! # Example
//!
//! ```ignore
//! use rssfeed::feed::{FeedCollection, FeedParser, HttpSource};
//!
//! let source = HttpSource::new(reqwest::Client::new());
//! let mut feeds = FeedCollection::new();
//! if let Some(feed) = FeedParser::open(&source, "rust", url).await.fetch(1.0).await {
//!     feeds.insert_feed("rust", feed);
//! }
//! ```

pub mod dates;
mod model;
pub mod normalizer;
mod parser;
pub mod source;

pub use model::{Entry, Feed, FeedCollection};
pub use normalizer::{FeedNormalizer, FeedRsNormalizer, NormalizeError, NormalizedFeed, RawEntry};
pub use parser::{fetch_all, FeedParser, DEFAULT_AGE_DAYS};
pub use source::{FetchError, HttpSource, OpenedStream};
