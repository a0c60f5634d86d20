#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for the page host.
//!
//! This module wraps [`vitrine_core::PageRuntime`] with DOM wiring: frame,
//! image, click and keyboard listeners feed signals in, and every signal is
//! followed by a flush that projects the runtime's changes onto the page.
//! Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use gloo::events::EventListener;
use gloo::timers::callback::Timeout;
use js_sys::Reflect;
use vitrine_core::{
    AttemptId, CloseTicket, HostSignal, PageRuntime, Presentation, ResolverConfig, SignalKind,
    SignalTarget, SlotChange, SlotId,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, HtmlAnchorElement, HtmlElement, HtmlIFrameElement, HtmlImageElement,
    KeyboardEvent, Node,
};
use web_time::Instant;

use crate::dom::{self, ViewerElements};
use crate::markup::{
    ATTR_OUTCOME, CARD_LINK_SELECTOR, CARD_SELECTOR, INLINE_SLOT_SELECTOR, VIEWER_IDS,
};

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

type SharedState = Rc<RefCell<HostState>>;
type WeakState = Weak<RefCell<HostState>>;

/// One inline preview container and the DOM it currently shows.
struct InlineSlot {
    container: Element,
    frame: HtmlIFrameElement,
    label: String,
    /// Element currently shown in the container, if any.
    current: Option<Element>,
    _frame_listeners: [EventListener; 2],
    image_listener: Option<EventListener>,
    timer: Option<Timeout>,
}

impl InlineSlot {
    /// Swap the shown element for `next` in place.
    fn show(&mut self, next: Element) -> Result<(), JsValue> {
        let node: &Node = &next;
        match &self.current {
            Some(current) if current.is_same_node(Some(node)) => return Ok(()),
            Some(current) => current.replace_with_with_node_1(&next)?,
            None => {
                self.container.append_child(&next)?;
            }
        }
        self.current = Some(next);
        Ok(())
    }
}

struct ViewerDom {
    elements: ViewerElements,
    timer: Option<(AttemptId, Timeout)>,
    clear_timer: Option<(CloseTicket, Timeout)>,
}

struct HostState {
    runtime: PageRuntime,
    document: Document,
    epoch: Instant,
    mounted: bool,
    slots: Vec<InlineSlot>,
    viewer: Option<ViewerDom>,
    listeners: Vec<EventListener>,
    this: WeakState,
}

impl HostState {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn debug(&self, msg: &str) {
        if self.runtime.config().debug {
            gloo::console::debug!(format!("vitrine: {msg}"));
        }
    }

    fn handle(&mut self, signal: HostSignal) {
        let now = self.now();
        self.runtime.dispatch(signal, now);
        // A signal can fire unrelated due deadlines, so always flush.
        self.flush();
    }

    /// Scan and start everything once. A failed scan leaves the host
    /// unmounted and empty so the call can be retried.
    fn mount(&mut self) -> Result<u32, JsValue> {
        if self.mounted {
            return Ok(self.slots.len() as u32);
        }
        match self.scan_and_start() {
            Ok(count) => {
                self.mounted = true;
                self.debug(&format!("mounted {count} inline previews"));
                Ok(count)
            }
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    fn scan_and_start(&mut self) -> Result<u32, JsValue> {
        for container in dom::query_all(&self.document, INLINE_SLOT_SELECTOR)? {
            let attributes = dom::slot_attributes(&container);
            let slot = match attributes.to_slot() {
                Ok(slot) => slot,
                Err(err) => {
                    self.debug(&format!("skipping preview container: {err}"));
                    continue;
                }
            };
            let label = attributes
                .title
                .clone()
                .unwrap_or_else(|| slot.source_url().to_string());
            let frame = dom::create_frame(&self.document, &label)?;
            // Author-provided frames are replaced so their load events never
            // race our listeners.
            let current = container.query_selector("iframe")?;
            let id = self.runtime.add_inline_slot(slot);
            let listeners = frame_listeners(&self.this, &frame, SignalTarget::Slot(id));
            self.slots.push(InlineSlot {
                container,
                frame,
                label,
                current,
                _frame_listeners: listeners,
                image_listener: None,
                timer: None,
            });
        }

        self.mount_viewer()?;

        let now = self.now();
        self.runtime.start(now);
        self.flush();
        Ok(self.slots.len() as u32)
    }

    fn mount_viewer(&mut self) -> Result<(), JsValue> {
        let doc = &self.document;
        let ids = VIEWER_IDS;
        let (
            Some(root),
            Some(back),
            Some(frame),
            Some(title),
            Some(open_link),
            Some(blocked),
            Some(screenshot),
            Some(blocked_link),
        ) = (
            dom::by_id::<Element>(doc, ids.root),
            dom::by_id::<Element>(doc, ids.back),
            dom::by_id::<HtmlIFrameElement>(doc, ids.frame),
            dom::by_id::<Element>(doc, ids.title),
            dom::by_id::<HtmlAnchorElement>(doc, ids.open_link),
            dom::by_id::<Element>(doc, ids.blocked),
            dom::by_id::<HtmlImageElement>(doc, ids.screenshot),
            dom::by_id::<HtmlAnchorElement>(doc, ids.blocked_link),
        )
        else {
            self.debug("viewer markup not found, viewer mode disabled");
            return Ok(());
        };

        for element in dom::query_all(doc, CARD_SELECTOR)? {
            let card = match dom::slot_attributes(&element).to_card() {
                Ok(card) => card,
                Err(err) => {
                    self.debug(&format!("skipping project card: {err}"));
                    continue;
                }
            };
            let index = self.runtime.add_card(card);
            if let Some(html) = element.dyn_ref::<HtmlElement>() {
                html.style().set_property("cursor", "pointer")?;
            }
            self.listeners
                .push(card_click_listener(&self.this, &element, index));
        }

        let weak = self.this.clone();
        self.listeners
            .push(EventListener::new(&back, "click", move |_| {
                send(&weak, HostSignal::Close);
            }));

        let weak = self.this.clone();
        self.listeners
            .push(EventListener::new(&self.document, "keydown", move |event| {
                if let Some(event) = event.dyn_ref::<KeyboardEvent>() {
                    send(&weak, HostSignal::Key(event.key()));
                }
            }));

        let [load, error] = frame_listeners(&self.this, &frame, SignalTarget::Viewer);
        self.listeners.push(load);
        self.listeners.push(error);

        let weak = self.this.clone();
        self.listeners
            .push(EventListener::new(&screenshot, "error", move |_| {
                deliver(&weak, SignalTarget::Viewer, SignalKind::ImageError);
            }));

        self.viewer = Some(ViewerDom {
            elements: ViewerElements {
                root,
                frame,
                title,
                open_link,
                blocked,
                screenshot,
                blocked_link,
                placeholder: None,
                projected_attempt: None,
            },
            timer: None,
            clear_timer: None,
        });
        Ok(())
    }

    /// Project everything the runtime changed since the last flush.
    fn flush(&mut self) {
        for change in self.runtime.take_slot_changes() {
            if let Err(err) = self.apply_slot_change(&change) {
                console_error(&format!("vitrine: {} update failed: {err:?}", change.slot));
            }
        }
        if self.runtime.take_viewer_dirty()
            && let Some(viewer) = self.viewer.as_mut()
            && let Err(err) = viewer
                .elements
                .project(&self.document, self.runtime.viewer().view())
        {
            console_error(&format!("vitrine: viewer update failed: {err:?}"));
        }
        self.sync_viewer_timers();
    }

    fn apply_slot_change(&mut self, change: &SlotChange) -> Result<(), JsValue> {
        let timeout = self.runtime.config().embed_timeout;
        let pending = self.runtime.resolver().is_pending(change.slot);
        if let Some(outcome) = change.outcome {
            self.debug(&format!(
                "{} attempt {} resolved: {}",
                change.slot,
                change.attempt,
                outcome.as_str()
            ));
        }
        let Some(slot) = self.slots.get_mut(change.slot.index()) else {
            return Ok(());
        };

        if change.outcome.is_none() {
            slot.timer = Some(arm_timeout(
                &self.this,
                SignalTarget::Slot(change.slot),
                change.attempt,
                timeout,
            ));
        } else if !pending {
            slot.timer = None;
        }

        match &change.presentation {
            Presentation::Embed { src } => {
                // Navigate before attaching so the first load is the page's.
                dom::set_frame_src(&slot.frame, src, change.outcome.is_none());
                let frame = Element::from(slot.frame.clone());
                slot.show(frame)?;
            }
            Presentation::Screenshot { src } => {
                let image = dom::create_screenshot(&self.document, src, &slot.label)?;
                slot.image_listener = Some(image_error_listener(
                    &self.this,
                    change.slot,
                    change.attempt,
                    &image,
                ));
                slot.show(Element::from(image))?;
            }
            Presentation::Placeholder { icon, text } => {
                let placeholder = dom::create_placeholder(&self.document, icon, text)?;
                slot.image_listener = None;
                slot.show(placeholder)?;
            }
        }

        match change.outcome {
            Some(outcome) => slot
                .container
                .set_attribute(ATTR_OUTCOME, outcome.as_str())?,
            None => slot.container.remove_attribute(ATTR_OUTCOME)?,
        }
        Ok(())
    }

    /// Keep one browser timer per pending viewer attempt and one per
    /// pending blocked-visual clear.
    fn sync_viewer_timers(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let state = self.runtime.viewer();
        let config = self.runtime.config();

        let pending_attempt = state.active_attempt().filter(|_| state.outcome().is_none());
        let armed = viewer.timer.as_ref().map(|(attempt, _)| *attempt);
        if pending_attempt != armed {
            viewer.timer = pending_attempt.map(|attempt| {
                let timer = arm_timeout(
                    &self.this,
                    SignalTarget::Viewer,
                    attempt,
                    config.embed_timeout,
                );
                (attempt, timer)
            });
        }

        let ticket = state.pending_clear();
        let armed = viewer.clear_timer.as_ref().map(|(ticket, _)| *ticket);
        if ticket != armed {
            viewer.clear_timer =
                ticket.map(|ticket| (ticket, arm_clear(&self.this, ticket, config.close_transition)));
        }
    }

    fn destroy(&mut self) {
        self.reset();
        self.debug("destroyed");
    }

    /// Drop every listener, timer and slot, and start over with a fresh
    /// runtime on the same configuration.
    fn reset(&mut self) {
        self.listeners.clear();
        self.slots.clear();
        self.viewer = None;
        self.runtime = PageRuntime::new(self.runtime.config().clone());
        self.mounted = false;
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Run `f` against the live state. Events dispatched synchronously while
/// the state is borrowed (a frame attached by a flush, for instance) are
/// retried on the next task instead of being lost.
fn with_state<F>(weak: &WeakState, f: F)
where
    F: FnOnce(&mut HostState) + 'static,
{
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let Ok(mut state) = shared.try_borrow_mut() else {
        let weak = weak.clone();
        Timeout::new(0, move || with_state(&weak, f)).forget();
        return;
    };
    f(&mut state);
}

fn send(weak: &WeakState, signal: HostSignal) {
    with_state(weak, move |state| state.handle(signal));
}

/// Deliver a signal to whatever attempt `target` is currently running.
fn deliver(weak: &WeakState, target: SignalTarget, kind: SignalKind) {
    with_state(weak, move |state| {
        let attempt = match target {
            SignalTarget::Slot(slot) => state.runtime.resolver().attempt_id(slot),
            SignalTarget::Viewer => state.runtime.viewer().active_attempt(),
        };
        if let Some(attempt) = attempt {
            state.handle(HostSignal::Embed {
                target,
                attempt,
                kind,
            });
        }
    });
}

fn frame_listeners(
    weak: &WeakState,
    frame: &HtmlIFrameElement,
    target: SignalTarget,
) -> [EventListener; 2] {
    let load = {
        let weak = weak.clone();
        let probed = frame.clone();
        EventListener::new(frame, "load", move |_| {
            if dom::is_torn_down(&probed) {
                return;
            }
            deliver(&weak, target, SignalKind::Load(dom::probe_frame(&probed)));
        })
    };
    let error = {
        let weak = weak.clone();
        EventListener::new(frame, "error", move |_| {
            deliver(&weak, target, SignalKind::Error);
        })
    };
    [load, error]
}

fn image_error_listener(
    weak: &WeakState,
    slot: SlotId,
    attempt: AttemptId,
    image: &HtmlImageElement,
) -> EventListener {
    let weak = weak.clone();
    EventListener::once(image, "error", move |_| {
        send(
            &weak,
            HostSignal::Embed {
                target: SignalTarget::Slot(slot),
                attempt,
                kind: SignalKind::ImageError,
            },
        );
    })
}

fn card_click_listener(weak: &WeakState, card: &Element, index: usize) -> EventListener {
    let weak = weak.clone();
    EventListener::new(card, "click", move |event| {
        let inside_link = event
            .target()
            .and_then(|target| target.dyn_into::<Element>().ok())
            .and_then(|target| target.closest(CARD_LINK_SELECTOR).ok().flatten())
            .is_some();
        if !inside_link {
            send(&weak, HostSignal::Open { card: index });
        }
    })
}

fn arm_timeout(
    weak: &WeakState,
    target: SignalTarget,
    attempt: AttemptId,
    timeout: Duration,
) -> Timeout {
    let weak = weak.clone();
    Timeout::new(millis(timeout), move || {
        send(
            &weak,
            HostSignal::Embed {
                target,
                attempt,
                kind: SignalKind::Timeout,
            },
        );
    })
}

fn arm_clear(weak: &WeakState, ticket: CloseTicket, delay: Duration) -> Timeout {
    let weak = weak.clone();
    Timeout::new(millis(delay), move || {
        with_state(&weak, move |state| {
            if state.runtime.finish_viewer_close(ticket) {
                state.flush();
            }
        });
    })
}

/// Page host for Vitrine previews.
///
/// Construct it once the preview markup is in the document, then call
/// [`mount`](Self::mount). Browser events drive everything afterwards;
/// `pushEncodedSignal` and `tick` exist for hosts that deliver signals
/// themselves.
#[wasm_bindgen]
pub struct VitrineHost {
    state: SharedState,
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();
}

#[wasm_bindgen]
impl VitrineHost {
    /// Create a host. `config` is an optional JSON object
    /// (`{"embed_timeout_ms": 6000, ...}`).
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<VitrineHost, JsValue> {
        install_panic_hook();
        let config = match config {
            Some(json) => ResolverConfig::from_json(&json)
                .map_err(|err| JsValue::from_str(&err.to_string()))?,
            None => ResolverConfig::default(),
        };
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("vitrine: no document"))?;
        let state = Rc::new_cyclic(|this| {
            RefCell::new(HostState {
                runtime: PageRuntime::new(config),
                document,
                epoch: Instant::now(),
                mounted: false,
                slots: Vec::new(),
                viewer: None,
                listeners: Vec::new(),
                this: this.clone(),
            })
        });
        Ok(Self { state })
    }

    /// Scan the document, wire listeners and start every inline preview.
    /// Returns the number of inline previews. Calling it again once mounted
    /// is a no-op; a failed mount can be retried.
    pub fn mount(&self) -> Result<u32, JsValue> {
        self.state.borrow_mut().mount()
    }

    /// Apply a JSON-encoded signal (see `vitrine_core::parse_encoded_signal`).
    #[wasm_bindgen(js_name = pushEncodedSignal)]
    pub fn push_encoded_signal(&self, json: &str) -> bool {
        let mut state = self.state.borrow_mut();
        let now = state.now();
        let accepted = state.runtime.push_encoded_signal(json, now);
        state.flush();
        accepted
    }

    /// Fire whatever deadlines are due by the host clock.
    pub fn tick(&self) {
        let mut state = self.state.borrow_mut();
        let now = state.now();
        state.runtime.tick(now);
        state.flush();
    }

    #[wasm_bindgen(js_name = slotCount)]
    pub fn slot_count(&self) -> u32 {
        self.state.borrow().runtime.resolver().len() as u32
    }

    /// Outcome of an inline preview (`loaded`, `blocked`, `timed_out`,
    /// `screenshot_failed`), or `undefined` while pending.
    #[wasm_bindgen(js_name = slotOutcome)]
    pub fn slot_outcome(&self, index: u32) -> Option<String> {
        self.state
            .borrow()
            .runtime
            .resolver()
            .outcome(SlotId(index))
            .map(|outcome| outcome.as_str().to_string())
    }

    #[wasm_bindgen(js_name = isViewerOpen)]
    pub fn is_viewer_open(&self) -> bool {
        self.state.borrow().runtime.viewer().is_open()
    }

    /// Detach every listener, cancel every timer and forget every preview.
    /// The host can be mounted again afterwards.
    pub fn destroy(&self) {
        self.state.borrow_mut().destroy();
    }
}
