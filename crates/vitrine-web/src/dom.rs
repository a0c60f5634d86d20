#![forbid(unsafe_code)]

//! DOM helpers: element construction, frame probing, and projection of
//! core presentation values onto elements. Only compiled on `wasm32`.

use js_sys::Reflect;
use vitrine_core::{AttemptId, ContentProbe, Presentation, ViewerView};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, HtmlAnchorElement, HtmlElement, HtmlIFrameElement, HtmlImageElement,
};

use crate::markup::{
    ATTR_PLACEHOLDER, ATTR_SCREENSHOT, ATTR_TITLE, ATTR_URL, CLASS_FRAME, CLASS_OPEN,
    CLASS_PLACEHOLDER, CLASS_SCREENSHOT, CLASS_VISIBLE, SlotAttributes, frame_src, icon_class,
    is_teardown_load, needs_navigation,
};

// ---------------------------------------------------------------------------
// Reading markup
// ---------------------------------------------------------------------------

pub(crate) fn slot_attributes(element: &Element) -> SlotAttributes {
    SlotAttributes {
        url: element.get_attribute(ATTR_URL),
        screenshot: element.get_attribute(ATTR_SCREENSHOT),
        placeholder: element.get_attribute(ATTR_PLACEHOLDER),
        title: element.get_attribute(ATTR_TITLE),
    }
}

pub(crate) fn query_all(document: &Document, selector: &str) -> Result<Vec<Element>, JsValue> {
    let list = document.query_selector_all(selector)?;
    let mut out = Vec::with_capacity(list.length() as usize);
    for i in 0..list.length() {
        if let Some(element) = list.get(i).and_then(|node| node.dyn_into::<Element>().ok()) {
            out.push(element);
        }
    }
    Ok(out)
}

pub(crate) fn by_id<T: JsCast>(document: &Document, id: &str) -> Option<T> {
    document.get_element_by_id(id)?.dyn_into::<T>().ok()
}

// ---------------------------------------------------------------------------
// Frame probing
// ---------------------------------------------------------------------------

/// Inspect a frame after its `load` event.
///
/// A getter that throws means the remote origin refused inspection, which is
/// reported as [`ContentProbe::CrossOriginDenied`]. Engines that return a
/// null `contentDocument` for cross-origin frames still throw from the
/// window's `document` getter, so that is tried second.
pub(crate) fn probe_frame(frame: &HtmlIFrameElement) -> ContentProbe {
    let document = match Reflect::get(frame, &JsValue::from_str("contentDocument")) {
        Ok(value) => value,
        Err(_) => return ContentProbe::CrossOriginDenied,
    };
    if !document.is_null() && !document.is_undefined() {
        return inspect_document(document);
    }
    let Some(window) = frame.content_window() else {
        return ContentProbe::Unavailable;
    };
    match Reflect::get(&window, &JsValue::from_str("document")) {
        Ok(document) => inspect_document(document),
        Err(_) => ContentProbe::CrossOriginDenied,
    }
}

fn inspect_document(value: JsValue) -> ContentProbe {
    let Ok(document) = value.dyn_into::<Document>() else {
        return ContentProbe::Unavailable;
    };
    match document.body() {
        Some(body) => ContentProbe::Accessible {
            body_empty: body.inner_html().is_empty(),
        },
        None => ContentProbe::Unavailable,
    }
}

/// Whether the frame's `load` belongs to its initial document or to our
/// own teardown. Such loads say nothing about the embedded page.
pub(crate) fn is_torn_down(frame: &HtmlIFrameElement) -> bool {
    is_teardown_load(frame.get_attribute("src").as_deref())
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub(crate) fn create_frame(
    document: &Document,
    title: &str,
) -> Result<HtmlIFrameElement, JsValue> {
    let frame = document
        .create_element("iframe")?
        .dyn_into::<HtmlIFrameElement>()?;
    frame.set_class_name(CLASS_FRAME);
    frame.set_title(title);
    Ok(frame)
}

pub(crate) fn create_screenshot(
    document: &Document,
    src: &str,
    alt: &str,
) -> Result<HtmlImageElement, JsValue> {
    let image = document
        .create_element("img")?
        .dyn_into::<HtmlImageElement>()?;
    image.set_class_name(CLASS_SCREENSHOT);
    image.set_alt(alt);
    image.set_src(src);
    Ok(image)
}

pub(crate) fn create_placeholder(
    document: &Document,
    icon: &str,
    text: &str,
) -> Result<Element, JsValue> {
    let placeholder = document.create_element("div")?;
    placeholder.set_class_name(CLASS_PLACEHOLDER);
    let glyph = document.create_element("i")?;
    glyph.set_class_name(&icon_class(icon));
    glyph.set_attribute("aria-hidden", "true")?;
    let label = document.create_element("span")?;
    label.set_text_content(Some(text));
    placeholder.append_child(&glyph)?;
    placeholder.append_child(&label)?;
    Ok(placeholder)
}

/// Navigate a frame if its `src` attribute differs, or unconditionally when
/// `restarted` and the source is live.
pub(crate) fn set_frame_src(frame: &HtmlIFrameElement, src: &str, restarted: bool) {
    if needs_navigation(frame.get_attribute("src").as_deref(), src, restarted) {
        frame.set_src(frame_src(src));
    }
}

// ---------------------------------------------------------------------------
// Viewer projection
// ---------------------------------------------------------------------------

/// The viewer's fixed elements.
pub(crate) struct ViewerElements {
    pub root: Element,
    pub frame: HtmlIFrameElement,
    pub title: Element,
    pub open_link: HtmlAnchorElement,
    pub blocked: Element,
    pub screenshot: HtmlImageElement,
    pub blocked_link: HtmlAnchorElement,
    /// Present only while the placeholder is shown.
    pub placeholder: Option<Element>,
    /// Attempt whose source the frame was last pointed at.
    pub projected_attempt: Option<AttemptId>,
}

impl ViewerElements {
    pub(crate) fn project(
        &mut self,
        document: &Document,
        view: &ViewerView,
    ) -> Result<(), JsValue> {
        self.root
            .class_list()
            .toggle_with_force(CLASS_OPEN, view.open)?;
        if let Some(body) = document.body() {
            set_scroll_locked(&body, view.scroll_locked)?;
        }
        if view.open {
            self.title.set_text_content(Some(&view.title));
            self.open_link.set_href(&view.link_href);
            self.blocked_link.set_href(&view.link_href);
        }
        let restarted = view.open && view.attempt != self.projected_attempt;
        set_frame_src(&self.frame, &view.frame_src, restarted);
        if view.open {
            self.projected_attempt = view.attempt;
        }

        match &view.fallback {
            None => {
                self.blocked.class_list().remove_1(CLASS_VISIBLE)?;
            }
            Some(Presentation::Screenshot { src }) => {
                if let Some(placeholder) = self.placeholder.take() {
                    placeholder.remove();
                }
                set_hidden(&self.screenshot, false)?;
                self.screenshot.set_alt(&view.title);
                self.screenshot.set_src(src);
                self.blocked.class_list().add_1(CLASS_VISIBLE)?;
            }
            Some(Presentation::Placeholder { icon, text }) => {
                set_hidden(&self.screenshot, true)?;
                if let Some(previous) = self.placeholder.take() {
                    previous.remove();
                }
                let placeholder = create_placeholder(document, icon, text)?;
                self.screenshot.after_with_node_1(&placeholder)?;
                self.placeholder = Some(placeholder);
                self.blocked.class_list().add_1(CLASS_VISIBLE)?;
            }
            Some(Presentation::Embed { .. }) => {}
        }
        Ok(())
    }
}

fn set_scroll_locked(body: &HtmlElement, locked: bool) -> Result<(), JsValue> {
    let style = body.style();
    if locked {
        style.set_property("overflow", "hidden")
    } else {
        style.remove_property("overflow").map(|_| ())
    }
}

fn set_hidden(element: &HtmlElement, hidden: bool) -> Result<(), JsValue> {
    let style = element.style();
    if hidden {
        style.set_property("display", "none")
    } else {
        style.remove_property("display").map(|_| ())
    }
}
