//! # rssfeed
//!
//! Fetches RSS/Atom feeds, keeps the recent entries, and typesets them as one
//! ConTeXt document.
//!
//! ```text
//! HttpSource → FeedNormalizer → recency filter → TextCleaner → FeedFormatter
//! ```
//!
//! - [`feed`]: fetching, normalizing, date filtering and cleaning one feed
//! - [`render`]: ConTeXt escaping, text cleaning, and document assembly
//! - [`config`]: the optional TOML configuration file
//! - [`util`]: URL validation

pub mod config;
pub mod feed;
pub mod render;
pub mod util;
