#![forbid(unsafe_code)]

//! Screenshot-rendering endpoint URLs.
//!
//! The service is addressed as
//! `{endpoint}/get/width/{width}/crop/{crop}/{urlencode(source_url)}` and
//! returns a top-aligned raster of the page. Any failure to load it is handled
//! by the placeholder fallback, so nothing here is fallible.

use crate::config::ResolverConfig;

/// Build a screenshot request URL for `source_url`.
#[must_use]
pub fn screenshot_url(endpoint: &str, width: u32, crop: u32, source_url: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    let encoded = urlencoding::encode(source_url);
    format!("{endpoint}/get/width/{width}/crop/{crop}/{encoded}")
}

/// Build a screenshot request URL using the configured endpoint and size.
#[must_use]
pub fn screenshot_url_for(config: &ResolverConfig, source_url: &str) -> String {
    screenshot_url(
        &config.screenshot_endpoint,
        config.screenshot_width,
        config.screenshot_crop,
        source_url,
    )
}
