#![forbid(unsafe_code)]

//! Preview slots: one embeddable URL with its fallbacks.

use core::fmt;

use crate::config::ResolverConfig;
use crate::screenshot::screenshot_url_for;

/// Index of a slot in the [`PreviewResolver`](crate::PreviewResolver) that
/// owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Errors from building a [`PreviewSlot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// `data-url` was missing or blank.
    EmptySourceUrl,
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySourceUrl => write!(f, "preview slot has an empty source URL"),
        }
    }
}

impl std::error::Error for SlotError {}

/// One embeddable preview, read from the page at load time.
///
/// Immutable once built. The screenshot URL and placeholder text are optional
/// on the page; missing values are derived from the [`ResolverConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSlot {
    source_url: String,
    screenshot_url: Option<String>,
    placeholder_text: Option<String>,
}

impl PreviewSlot {
    /// Build a slot for `source_url`, which must not be blank.
    pub fn new(source_url: impl Into<String>) -> Result<Self, SlotError> {
        let source_url = source_url.into();
        if source_url.trim().is_empty() {
            return Err(SlotError::EmptySourceUrl);
        }
        Ok(Self {
            source_url,
            screenshot_url: None,
            placeholder_text: None,
        })
    }

    /// Use a pre-captured screenshot instead of the rendering endpoint.
    /// Blank values are ignored.
    #[must_use]
    pub fn with_screenshot(mut self, url: impl Into<String>) -> Self {
        self.screenshot_url = non_blank(url.into());
        self
    }

    /// Placeholder text for this slot. Blank values are ignored.
    #[must_use]
    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = non_blank(text.into());
        self
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The explicitly configured screenshot, if any.
    #[must_use]
    pub fn screenshot_url(&self) -> Option<&str> {
        self.screenshot_url.as_deref()
    }

    /// The explicitly configured placeholder text, if any.
    #[must_use]
    pub fn placeholder_text(&self) -> Option<&str> {
        self.placeholder_text.as_deref()
    }

    /// Image source used when the embed falls back.
    #[must_use]
    pub fn screenshot_src(&self, config: &ResolverConfig) -> String {
        match &self.screenshot_url {
            Some(url) => url.clone(),
            None => screenshot_url_for(config, &self.source_url),
        }
    }

    /// Text shown on the terminal placeholder.
    #[must_use]
    pub fn placeholder_label<'a>(&'a self, config: &'a ResolverConfig) -> &'a str {
        self.placeholder_text
            .as_deref()
            .unwrap_or(&config.placeholder_text)
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
