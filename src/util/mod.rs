//! Utility functions shared by the fetch pipeline and the driver.
//!
//! - **URL validation**: scheme checks plus an optional private-host guard
//!   applied before any feed is opened.

mod url_validator;

pub use url_validator::{validate_feed_url, HostPolicy, UrlValidationError};
