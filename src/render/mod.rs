//! Turning cleaned feeds into a ConTeXt document.
//!
//! - [`cleaner`] - Raw feed text (HTML or Markdown) to ConTeXt text
//! - [`formatter`] - Assembles chapters for every entry into one document
//! - [`context`] - Escaping and the writer both of the above build on

pub mod cleaner;
pub mod context;
pub mod formatter;

pub use cleaner::{CleanError, ContextCleaner, TextCleaner};
pub use formatter::{escape_title, FeedFormatter, DEFAULT_TITLE};
