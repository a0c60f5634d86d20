#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Function, Promise};
use vitrine_web::VitrineHost;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{
    Blob, BlobPropertyBag, Document, Element, HtmlIFrameElement, MutationObserver,
    MutationObserverInit, Url, window,
};

wasm_bindgen_test_configure!(run_in_browser);

const VIEWER_MARKUP: &str = r##"
<div id="projectViewer">
  <button id="viewerBack">back</button>
  <h2 id="viewerTitle"></h2>
  <a id="viewerOpen" href="#">open</a>
  <iframe id="viewerIframe"></iframe>
  <div id="viewerBlocked">
    <img id="viewerScreenshot" alt="">
    <a id="viewerBlockedLink" href="#">visit</a>
  </div>
</div>
"##;

fn document() -> Document {
    window()
        .and_then(|w| w.document())
        .expect("browser document")
}

fn set_body(html: &str) {
    document().body().expect("body").set_inner_html(html);
}

fn query(selector: &str) -> Option<Element> {
    document().query_selector(selector).expect("valid selector")
}

/// Same-origin URL serving `html`.
fn html_url(html: &str) -> String {
    let parts = Array::of1(&JsValue::from_str(html));
    let options = BlobPropertyBag::new();
    options.set_type("text/html");
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options).expect("blob");
    Url::create_object_url_with_blob(&blob).expect("object url")
}

/// Wait for the next `load` of `frame`. Listeners added by the host run
/// first since they were registered earlier.
async fn next_load(frame: &HtmlIFrameElement) {
    let loaded = Promise::new(&mut |resolve, _reject| frame.set_onload(Some(&resolve)));
    JsFuture::from(loaded).await.expect("load event");
    frame.set_onload(None);
}

fn inline_frame() -> HtmlIFrameElement {
    query(".project-preview iframe")
        .expect("frame inserted")
        .dyn_into::<HtmlIFrameElement>()
        .expect("iframe element")
}

fn mounted(html: &str) -> VitrineHost {
    set_body(html);
    let host = VitrineHost::new(None).expect("default config");
    host.mount().expect("mount");
    host
}

#[wasm_bindgen_test]
fn mount_embeds_each_inline_preview() {
    set_body(
        r#"<div class="project-preview" data-url="https://one.example.invalid"></div>
           <div class="project-preview" data-url="   "></div>"#,
    );
    let host = VitrineHost::new(None).unwrap();
    assert_eq!(host.mount().unwrap(), 1);
    assert_eq!(host.slot_count(), 1);
    assert_eq!(host.slot_outcome(0), None);

    let frame = query(".project-preview iframe.preview-frame").expect("frame inserted");
    assert_eq!(
        frame.get_attribute("src").as_deref(),
        Some("https://one.example.invalid")
    );
    // Mounting twice does not duplicate anything.
    assert_eq!(host.mount().unwrap(), 1);
    assert_eq!(
        document()
            .query_selector_all(".project-preview iframe")
            .unwrap()
            .length(),
        1
    );
}

#[wasm_bindgen_test]
fn empty_body_swaps_in_screenshot() {
    let host = mounted(
        r#"<div class="project-preview" data-url="https://blocked.example.invalid"></div>"#,
    );
    assert!(host.push_encoded_signal(r#"{"kind":"load","slot":0,"attempt":1,"probe":"empty"}"#));

    assert_eq!(host.slot_outcome(0).as_deref(), Some("blocked"));
    assert!(query(".project-preview iframe").is_none());
    let image = query(".project-preview img.preview-screenshot").expect("screenshot shown");
    assert_eq!(
        image.get_attribute("src").as_deref(),
        Some("https://image.thum.io/get/width/800/crop/600/https%3A%2F%2Fblocked.example.invalid")
    );
    let container = query(".project-preview").unwrap();
    assert_eq!(
        container.get_attribute("data-outcome").as_deref(),
        Some("blocked")
    );
}

#[wasm_bindgen_test]
fn cross_origin_load_keeps_frame() {
    let host = mounted(r#"<div class="project-preview" data-url="https://x.example.invalid"></div>"#);
    host.push_encoded_signal(r#"{"kind":"load","slot":0,"attempt":1,"probe":"cross_origin"}"#);

    assert_eq!(host.slot_outcome(0).as_deref(), Some("loaded"));
    assert!(query(".project-preview iframe.preview-frame").is_some());
    assert!(query(".project-preview img").is_none());
}

#[wasm_bindgen_test]
fn failed_screenshot_shows_placeholder() {
    let host = mounted(
        r#"<div class="project-preview" data-url="https://down.example.invalid"
                data-placeholder="Aperçu indisponible"></div>"#,
    );
    host.push_encoded_signal(r#"{"kind":"error","slot":0,"attempt":1}"#);
    host.push_encoded_signal(r#"{"kind":"image_error","slot":0,"attempt":1}"#);

    assert_eq!(host.slot_outcome(0).as_deref(), Some("screenshot_failed"));
    assert!(query(".project-preview img").is_none());
    let placeholder = query(".project-preview .preview-placeholder").expect("placeholder shown");
    assert_eq!(
        placeholder.text_content().as_deref(),
        Some("Aperçu indisponible")
    );
    assert!(query(".preview-placeholder i.fas.fa-image").is_some());
}

#[wasm_bindgen_test]
fn viewer_opens_and_closes_on_escape() {
    let markup = format!(
        r#"<div class="project-card" data-url="https://app.example.invalid" data-title="App">
             <a class="project-link" href="https://github.com">code</a>
           </div>{VIEWER_MARKUP}"#
    );
    let host = mounted(&markup);
    let root = query("#projectViewer").unwrap();
    assert!(!host.is_viewer_open());

    assert!(host.push_encoded_signal(r#"{"kind":"open","card":0}"#));
    assert!(host.is_viewer_open());
    assert!(root.class_list().contains("open"));
    assert_eq!(
        query("#viewerTitle").unwrap().text_content().as_deref(),
        Some("App")
    );
    assert_eq!(
        query("#viewerIframe").unwrap().get_attribute("src").as_deref(),
        Some("https://app.example.invalid")
    );

    host.push_encoded_signal(r#"{"kind":"key","key":"Escape"}"#);
    assert!(!host.is_viewer_open());
    assert!(!root.class_list().contains("open"));
    assert_eq!(
        query("#viewerIframe").unwrap().get_attribute("src").as_deref(),
        Some("about:blank")
    );
}

#[wasm_bindgen_test]
fn viewer_blocked_overlay_shows_screenshot() {
    let markup = format!(
        r#"<div class="project-card" data-url="https://app.example.invalid"
                data-screenshot="shots/app.webp"></div>{VIEWER_MARKUP}"#
    );
    let host = mounted(&markup);
    host.push_encoded_signal(r#"{"kind":"open","card":0}"#);
    host.push_encoded_signal(r#"{"kind":"error","attempt":1}"#);

    assert!(query("#viewerBlocked").unwrap().class_list().contains("visible"));
    assert_eq!(
        query("#viewerScreenshot").unwrap().get_attribute("src").as_deref(),
        Some("shots/app.webp")
    );
    assert_eq!(
        query("#viewerBlockedLink").unwrap().get_attribute("href").as_deref(),
        Some("https://app.example.invalid")
    );
}

#[wasm_bindgen_test]
async fn empty_page_in_real_frame_is_blocked() {
    let url = html_url("<body></body>");
    let host = mounted(&format!(
        r#"<div class="project-preview" data-url="{url}" data-screenshot="shots/x.png"></div>"#
    ));
    next_load(&inline_frame()).await;

    assert_eq!(host.slot_outcome(0).as_deref(), Some("blocked"));
    assert!(query(".project-preview iframe").is_none());
    assert!(query(".project-preview img.preview-screenshot").is_some());
    Url::revoke_object_url(&url).expect("revoke");
}

#[wasm_bindgen_test]
async fn rendered_page_in_real_frame_is_loaded() {
    let url = html_url("<main><h1>Project</h1></main>");
    let host = mounted(&format!(
        r#"<div class="project-preview" data-url="{url}"></div>"#
    ));
    let frame = inline_frame();
    next_load(&frame).await;

    assert_eq!(host.slot_outcome(0).as_deref(), Some("loaded"));
    assert!(query(".project-preview iframe.preview-frame").is_some());
    Url::revoke_object_url(&url).expect("revoke");
}

#[wasm_bindgen_test]
async fn opaque_origin_frame_is_loaded() {
    let host = mounted(
        r#"<div class="project-preview" data-url="data:text/html,<p>hello</p>"></div>"#,
    );
    next_load(&inline_frame()).await;

    assert_eq!(host.slot_outcome(0).as_deref(), Some("loaded"));
}

#[wasm_bindgen_test]
fn reopening_same_card_reloads_viewer_frame() {
    let markup = format!(
        r#"<div class="project-card" data-url="https://app.example.invalid"></div>{VIEWER_MARKUP}"#
    );
    let host = mounted(&markup);
    host.push_encoded_signal(r#"{"kind":"open","card":0}"#);
    let frame = query("#viewerIframe").unwrap();

    let observer = MutationObserver::new(&Function::new_no_args("")).expect("observer");
    let options = MutationObserverInit::new();
    options.set_attributes(true);
    observer
        .observe_with_options(&frame, &options)
        .expect("observe");

    host.push_encoded_signal(r#"{"kind":"open","card":0}"#);
    assert!(host.is_viewer_open());
    assert_eq!(observer.take_records().length(), 1);
    assert_eq!(
        frame.get_attribute("src").as_deref(),
        Some("https://app.example.invalid")
    );

    // Signals for the new attempt still resolve the viewer.
    host.push_encoded_signal(r#"{"kind":"error","attempt":2}"#);
    assert!(query("#viewerBlocked").unwrap().class_list().contains("visible"));
    observer.disconnect();
}

#[wasm_bindgen_test]
fn destroyed_host_can_mount_again() {
    let host = mounted(r#"<div class="project-preview" data-url="https://one.example.invalid"></div>"#);
    assert_eq!(host.slot_count(), 1);

    host.destroy();
    assert_eq!(host.slot_count(), 0);
    assert_eq!(host.mount().unwrap(), 1);
    assert_eq!(host.slot_count(), 1);
    assert_eq!(
        document()
            .query_selector_all(".project-preview iframe")
            .unwrap()
            .length(),
        1
    );
}

#[wasm_bindgen_test]
fn unknown_config_field_is_rejected() {
    assert!(VitrineHost::new(Some(r#"{"embed_timeout_ms":3000}"#.to_string())).is_ok());
    assert!(VitrineHost::new(Some(r#"{"bogus":1}"#.to_string())).is_err());
}
