#![forbid(unsafe_code)]

//! Resolver configuration.
//!
//! Built in Rust with [`ResolverConfig::default`] and the `with_*` methods, or
//! loaded from a JSON object passed by the page (all fields optional, missing
//! fields keep their defaults):
//!
//! ```json
//! { "embed_timeout_ms": 5000, "screenshot_endpoint": "https://image.thum.io" }
//! ```

use core::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Default embed deadline.
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_millis(6000);
/// Default viewer close transition.
pub const DEFAULT_CLOSE_TRANSITION: Duration = Duration::from_millis(400);
pub const DEFAULT_SCREENSHOT_ENDPOINT: &str = "https://image.thum.io";
pub const DEFAULT_SCREENSHOT_WIDTH: u32 = 800;
pub const DEFAULT_SCREENSHOT_CROP: u32 = 600;
pub const DEFAULT_PLACEHOLDER_ICON: &str = "fa-image";
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Aperçu indisponible";

/// Errors from loading or validating a [`ResolverConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Malformed JSON.
    Json(String),
    /// A duration that must be positive was zero.
    ZeroDuration(&'static str),
    /// A screenshot dimension was zero.
    ZeroDimension(&'static str),
    /// The screenshot endpoint was empty.
    EmptyEndpoint,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "config JSON error: {msg}"),
            Self::ZeroDuration(field) => write!(f, "{field} must be greater than zero"),
            Self::ZeroDimension(field) => write!(f, "{field} must be greater than zero"),
            Self::EmptyEndpoint => write!(f, "screenshot_endpoint must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Tunables for preview resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// How long an embed may stay silent before it is treated as timed out.
    pub embed_timeout: Duration,
    /// Base URL of the screenshot-rendering service.
    pub screenshot_endpoint: String,
    /// Rendered screenshot width in pixels.
    pub screenshot_width: u32,
    /// Crop height in pixels (top-aligned).
    pub screenshot_crop: u32,
    /// Icon class shown on the terminal placeholder.
    pub placeholder_icon: String,
    /// Placeholder text for slots that do not configure their own.
    pub placeholder_text: String,
    /// Delay before the viewer clears its blocked visual after closing.
    pub close_transition: Duration,
    /// Emit host-side diagnostics to the browser console.
    pub debug: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            screenshot_endpoint: DEFAULT_SCREENSHOT_ENDPOINT.to_string(),
            screenshot_width: DEFAULT_SCREENSHOT_WIDTH,
            screenshot_crop: DEFAULT_SCREENSHOT_CROP,
            placeholder_icon: DEFAULT_PLACEHOLDER_ICON.to_string(),
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
            close_transition: DEFAULT_CLOSE_TRANSITION,
            debug: false,
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_screenshot_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.screenshot_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_screenshot_size(mut self, width: u32, crop: u32) -> Self {
        self.screenshot_width = width;
        self.screenshot_crop = crop;
        self
    }

    #[must_use]
    pub fn with_placeholder(mut self, icon: impl Into<String>, text: impl Into<String>) -> Self {
        self.placeholder_icon = icon.into();
        self.placeholder_text = text.into();
        self
    }

    #[must_use]
    pub fn with_close_transition(mut self, delay: Duration) -> Self {
        self.close_transition = delay;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Check invariants the resolver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embed_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("embed_timeout_ms"));
        }
        if self.screenshot_endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.screenshot_width == 0 {
            return Err(ConfigError::ZeroDimension("screenshot_width"));
        }
        if self.screenshot_crop == 0 {
            return Err(ConfigError::ZeroDimension("screenshot_crop"));
        }
        Ok(())
    }

    /// Parse JSON overrides on top of the defaults, then validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        let config = raw.apply(Self::default());
        config.validate()?;
        Ok(config)
    }
}

/// Deserialization target; durations travel as milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    embed_timeout_ms: Option<u64>,
    #[serde(default)]
    screenshot_endpoint: Option<String>,
    #[serde(default)]
    screenshot_width: Option<u32>,
    #[serde(default)]
    screenshot_crop: Option<u32>,
    #[serde(default)]
    placeholder_icon: Option<String>,
    #[serde(default)]
    placeholder_text: Option<String>,
    #[serde(default)]
    close_transition_ms: Option<u64>,
    #[serde(default)]
    debug: Option<bool>,
}

impl RawConfig {
    fn apply(self, mut config: ResolverConfig) -> ResolverConfig {
        if let Some(ms) = self.embed_timeout_ms {
            config.embed_timeout = Duration::from_millis(ms);
        }
        if let Some(endpoint) = self.screenshot_endpoint {
            config.screenshot_endpoint = endpoint;
        }
        if let Some(width) = self.screenshot_width {
            config.screenshot_width = width;
        }
        if let Some(crop) = self.screenshot_crop {
            config.screenshot_crop = crop;
        }
        if let Some(icon) = self.placeholder_icon {
            config.placeholder_icon = icon;
        }
        if let Some(text) = self.placeholder_text {
            config.placeholder_text = text;
        }
        if let Some(ms) = self.close_transition_ms {
            config.close_transition = Duration::from_millis(ms);
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ResolverConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.embed_timeout, Duration::from_secs(6));
        assert_eq!(config.screenshot_width, 800);
        assert_eq!(config.screenshot_crop, 600);
    }

    #[test]
    fn empty_json_keeps_defaults() {
        assert_eq!(
            ResolverConfig::from_json("{}").unwrap(),
            ResolverConfig::default()
        );
    }

    #[test]
    fn json_overrides() {
        let config = ResolverConfig::from_json(
            r#"{"embed_timeout_ms":5000,"screenshot_endpoint":"https://shots.test","close_transition_ms":250,"debug":true}"#,
        )
        .unwrap();
        assert_eq!(config.embed_timeout, Duration::from_millis(5000));
        assert_eq!(config.screenshot_endpoint, "https://shots.test");
        assert_eq!(config.close_transition, Duration::from_millis(250));
        assert!(config.debug);
        assert_eq!(config.placeholder_text, DEFAULT_PLACEHOLDER_TEXT);
    }

    #[test]
    fn zero_timeout_rejected() {
        assert_eq!(
            ResolverConfig::from_json(r#"{"embed_timeout_ms":0}"#),
            Err(ConfigError::ZeroDuration("embed_timeout_ms"))
        );
    }

    #[test]
    fn blank_endpoint_rejected() {
        let config = ResolverConfig::default().with_screenshot_endpoint("  ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyEndpoint));
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(matches!(
            ResolverConfig::from_json(r#"{"timeout":5}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            ResolverConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
