#![forbid(unsafe_code)]

//! Page markup contract: selectors, attribute names, element ids, classes.
//!
//! Kept free of web-sys types so slot extraction is testable natively.

use vitrine_core::{PreviewSlot, SlotError, ViewerCard};

/// Inline preview containers, one embedded frame each.
pub const INLINE_SLOT_SELECTOR: &str = ".project-preview[data-url]";
/// Project cards that open in the full-page viewer.
pub const CARD_SELECTOR: &str = ".project-card[data-url]";
/// Links inside a card that must keep their own click behavior.
pub const CARD_LINK_SELECTOR: &str = ".project-link";

pub const ATTR_URL: &str = "data-url";
pub const ATTR_SCREENSHOT: &str = "data-screenshot";
pub const ATTR_PLACEHOLDER: &str = "data-placeholder";
pub const ATTR_TITLE: &str = "data-title";
/// Written on inline containers once resolved (`loaded`, `blocked`, ...).
pub const ATTR_OUTCOME: &str = "data-outcome";

pub const CLASS_FRAME: &str = "preview-frame";
pub const CLASS_SCREENSHOT: &str = "preview-screenshot";
pub const CLASS_PLACEHOLDER: &str = "preview-placeholder";
/// Viewer root while open.
pub const CLASS_OPEN: &str = "open";
/// Viewer blocked overlay while shown.
pub const CLASS_VISIBLE: &str = "visible";

/// Frame source used to tear an embed down.
pub const BLANK_SRC: &str = "about:blank";

/// Element ids of the viewer markup. Viewer mode is disabled unless all of
/// them are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerIds {
    pub root: &'static str,
    pub back: &'static str,
    pub frame: &'static str,
    pub title: &'static str,
    pub open_link: &'static str,
    pub blocked: &'static str,
    pub screenshot: &'static str,
    pub blocked_link: &'static str,
}

pub const VIEWER_IDS: ViewerIds = ViewerIds {
    root: "projectViewer",
    back: "viewerBack",
    frame: "viewerIframe",
    title: "viewerTitle",
    open_link: "viewerOpen",
    blocked: "viewerBlocked",
    screenshot: "viewerScreenshot",
    blocked_link: "viewerBlockedLink",
};

/// Raw `data-*` attributes read from a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotAttributes {
    pub url: Option<String>,
    pub screenshot: Option<String>,
    pub placeholder: Option<String>,
    pub title: Option<String>,
}

impl SlotAttributes {
    /// Build an inline preview slot.
    pub fn to_slot(&self) -> Result<PreviewSlot, SlotError> {
        let mut slot = PreviewSlot::new(self.url.clone().unwrap_or_default())?;
        if let Some(screenshot) = &self.screenshot {
            slot = slot.with_screenshot(screenshot.clone());
        }
        if let Some(placeholder) = &self.placeholder {
            slot = slot.with_placeholder_text(placeholder.clone());
        }
        Ok(slot)
    }

    /// Build a viewer card. The title defaults to the URL.
    pub fn to_card(&self) -> Result<ViewerCard, SlotError> {
        let slot = self.to_slot()?;
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(slot.source_url())
            .to_string();
        Ok(ViewerCard { slot, title })
    }
}

/// Class list for a placeholder icon (`fa-image` -> `fas fa-image`).
#[must_use]
pub fn icon_class(icon: &str) -> String {
    format!("fas {icon}")
}

/// Frame `src` for a presentation source. Empty means torn down.
#[must_use]
pub fn frame_src(src: &str) -> &str {
    if src.is_empty() { BLANK_SRC } else { src }
}

/// Whether a frame whose `src` attribute is `current` has to navigate to
/// `src`. `restarted` forces a reload of an unchanged source.
#[must_use]
pub fn needs_navigation(current: Option<&str>, src: &str, restarted: bool) -> bool {
    let target = frame_src(src);
    current != Some(target) || (restarted && target != BLANK_SRC)
}

/// Whether a `load` from a frame whose `src` attribute is `src_attribute`
/// is ours rather than the embedded page's: the frame was never pointed at
/// a source, or was torn down to `about:blank`. A blank document the page
/// itself ends up on is inspected like any other.
#[must_use]
pub fn is_teardown_load(src_attribute: Option<&str>) -> bool {
    matches!(src_attribute, None | Some(BLANK_SRC))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_source_maps_to_blank() {
        assert_eq!(frame_src(""), BLANK_SRC);
        assert_eq!(frame_src("https://a.test"), "https://a.test");
    }

    #[test]
    fn navigation_skips_unchanged_source() {
        assert!(!needs_navigation(Some("https://a.test"), "https://a.test", false));
        assert!(needs_navigation(Some("https://a.test"), "https://b.test", false));
        assert!(needs_navigation(None, "https://a.test", false));
        assert!(needs_navigation(Some("https://a.test"), "", false));
        assert!(!needs_navigation(Some(BLANK_SRC), "", false));
    }

    #[test]
    fn restarted_attempt_reloads_unchanged_source() {
        assert!(needs_navigation(Some("https://a.test"), "https://a.test", true));
        // Teardown never reloads a blank frame.
        assert!(!needs_navigation(Some(BLANK_SRC), "", true));
    }

    #[test]
    fn only_our_own_blank_loads_are_skipped() {
        assert!(is_teardown_load(Some(BLANK_SRC)));
        assert!(is_teardown_load(None));
        // A site that lands on about:blank by itself is still inspected.
        assert!(!is_teardown_load(Some("https://refuses.example.com")));
    }

    fn attrs(url: &str) -> SlotAttributes {
        SlotAttributes {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_url_is_rejected() {
        assert_eq!(
            SlotAttributes::default().to_slot(),
            Err(SlotError::EmptySourceUrl)
        );
    }

    #[test]
    fn optional_attributes_flow_into_slot() {
        let slot = SlotAttributes {
            screenshot: Some("shots/a.png".into()),
            placeholder: Some("Aperçu indisponible".into()),
            ..attrs("https://a.test")
        }
        .to_slot()
        .unwrap();
        assert_eq!(slot.screenshot_url(), Some("shots/a.png"));
        assert_eq!(slot.placeholder_text(), Some("Aperçu indisponible"));
    }

    #[test]
    fn card_title_defaults_to_url() {
        let card = attrs("https://a.test").to_card().unwrap();
        assert_eq!(card.title, "https://a.test");

        let card = SlotAttributes {
            title: Some("  Portfolio  ".into()),
            ..attrs("https://a.test")
        }
        .to_card()
        .unwrap();
        assert_eq!(card.title, "Portfolio");
    }

    #[test]
    fn icon_class_prefixes_family() {
        assert_eq!(icon_class("fa-image"), "fas fa-image");
    }
}
