#![forbid(unsafe_code)]

//! Step-based resolver for inline preview slots.
//!
//! [`PreviewResolver`] owns every inline slot found on the page. It never
//! touches the DOM and never starts timers: the host delivers frame and image
//! callbacks via [`push_signal`](PreviewResolver::push_signal), advances the
//! clock with [`step`](PreviewResolver::step), and applies the resulting
//! [`SlotChange`]s.
//!
//! Queued signals carry the host timestamp at which they arrived. Before each
//! one is delivered, deadlines that elapsed *before* it are fired, so a slow
//! step cadence never reorders a timeout relative to a load or error.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, trace};

use crate::attempt::{Attempt, AttemptId, SignalKind, Transition};
use crate::config::ResolverConfig;
use crate::resolution::Outcome;
use crate::slot::{PreviewSlot, SlotId};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// What a slot shows. The DOM is a projection of this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// Live embedded frame.
    Embed { src: String },
    /// Static screenshot image replacing the frame.
    Screenshot { src: String },
    /// Terminal placeholder: fixed icon and the slot's text.
    Placeholder { icon: String, text: String },
}

impl Presentation {
    /// Project a slot and its outcome (`None` while pending).
    #[must_use]
    pub fn project(slot: &PreviewSlot, outcome: Option<Outcome>, config: &ResolverConfig) -> Self {
        match outcome {
            None | Some(Outcome::Loaded) => Self::Embed {
                src: slot.source_url().to_string(),
            },
            Some(Outcome::Blocked | Outcome::TimedOut) => Self::Screenshot {
                src: slot.screenshot_src(config),
            },
            Some(Outcome::ScreenshotFailed) => Self::Placeholder {
                icon: config.placeholder_icon.clone(),
                text: slot.placeholder_label(config).to_string(),
            },
        }
    }
}

/// A signal addressed to one attempt of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSignal {
    pub slot: SlotId,
    pub attempt: AttemptId,
    pub kind: SignalKind,
}

/// A presentation change the host must apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    pub slot: SlotId,
    pub attempt: AttemptId,
    /// `None` when the attempt just started.
    pub outcome: Option<Outcome>,
    pub presentation: Presentation,
}

/// Outcome of a single [`PreviewResolver::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepResult {
    /// Queued signals delivered in this step.
    pub signals_processed: u32,
    /// Delivered signals that had no effect (stale attempt, lost race).
    pub signals_ignored: u32,
    /// Deadlines that resolved an attempt as timed out.
    pub timeouts_fired: u32,
    /// Presentation changes produced.
    pub changes: u32,
}

// ---------------------------------------------------------------------------
// PreviewResolver
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SlotEntry {
    slot: PreviewSlot,
    attempt: Option<Attempt>,
}

/// Host-driven resolver for a set of inline preview slots.
#[derive(Debug)]
pub struct PreviewResolver {
    config: ResolverConfig,
    slots: Vec<SlotEntry>,
    next_attempt: u64,
    queue: VecDeque<(Duration, SlotSignal)>,
    changes: Vec<SlotChange>,
}

impl PreviewResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            next_attempt: 1,
            queue: VecDeque::new(),
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Register a slot. No attempt starts until [`begin`](Self::begin).
    pub fn add_slot(&mut self, slot: PreviewSlot) -> SlotId {
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(SlotEntry {
            slot,
            attempt: None,
        });
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn slot(&self, id: SlotId) -> Option<&PreviewSlot> {
        self.slots.get(id.index()).map(|entry| &entry.slot)
    }

    // -- Attempts -----------------------------------------------------------

    /// Start an embed attempt for `id` at `now` and arm its deadline.
    ///
    /// Restarting a slot supersedes its previous attempt; signals addressed
    /// to the old attempt are ignored from then on.
    pub fn begin(&mut self, id: SlotId, now: Duration) -> Option<AttemptId> {
        let attempt_id = AttemptId(self.next_attempt);
        let timeout = self.config.embed_timeout;
        let entry = self.slots.get_mut(id.index())?;
        self.next_attempt += 1;
        entry.attempt = Some(Attempt::start(attempt_id, now, timeout));
        debug!(slot = %id, attempt = %attempt_id, url = entry.slot.source_url(), "embed attempt started");
        let presentation = Presentation::project(&entry.slot, None, &self.config);
        self.changes.push(SlotChange {
            slot: id,
            attempt: attempt_id,
            outcome: None,
            presentation,
        });
        Some(attempt_id)
    }

    /// Start attempts for every registered slot.
    pub fn begin_all(&mut self, now: Duration) -> Vec<(SlotId, AttemptId)> {
        (0..self.slots.len() as u32)
            .map(SlotId)
            .filter_map(|id| self.begin(id, now).map(|attempt| (id, attempt)))
            .collect()
    }

    // -- Signal delivery ----------------------------------------------------

    /// Buffer a signal that arrived at host time `at`.
    ///
    /// The queue stays sorted by arrival time; signals sharing a timestamp
    /// keep their push order.
    pub fn push_signal(&mut self, at: Duration, signal: SlotSignal) {
        let index = self
            .queue
            .iter()
            .position(|(queued_at, _)| *queued_at > at)
            .unwrap_or(self.queue.len());
        self.queue.insert(index, (at, signal));
    }

    /// Deliver a single signal immediately, firing any deadline due first.
    pub fn signal(&mut self, now: Duration, signal: SlotSignal) -> StepResult {
        self.push_signal(now, signal);
        self.step(now)
    }

    /// Drain buffered signals in timestamp order, then fire deadlines due at
    /// `now`.
    pub fn step(&mut self, now: Duration) -> StepResult {
        let mut result = StepResult::default();
        while let Some((at, signal)) = self.queue.pop_front() {
            self.fire_due(at, &mut result);
            self.deliver(signal, &mut result);
            result.signals_processed += 1;
        }
        self.fire_due(now, &mut result);
        result
    }

    // -- Accessors ----------------------------------------------------------

    /// Earliest armed deadline across all slots.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.slots
            .iter()
            .filter_map(|entry| entry.attempt.as_ref().and_then(Attempt::deadline))
            .min()
    }

    #[must_use]
    pub fn attempt_id(&self, id: SlotId) -> Option<AttemptId> {
        self.attempt(id).map(Attempt::id)
    }

    #[must_use]
    pub fn outcome(&self, id: SlotId) -> Option<Outcome> {
        self.attempt(id).and_then(Attempt::outcome)
    }

    /// Whether the slot has a started, unresolved attempt.
    #[must_use]
    pub fn is_pending(&self, id: SlotId) -> bool {
        self.attempt(id).is_some_and(Attempt::is_pending)
    }

    /// Current presentation, `None` for unknown or never-started slots.
    #[must_use]
    pub fn presentation(&self, id: SlotId) -> Option<Presentation> {
        let entry = self.slots.get(id.index())?;
        let attempt = entry.attempt.as_ref()?;
        Some(Presentation::project(
            &entry.slot,
            attempt.outcome(),
            &self.config,
        ))
    }

    /// Number of buffered signals awaiting a step.
    #[must_use]
    pub fn pending_signals(&self) -> usize {
        self.queue.len()
    }

    /// Drain presentation changes accumulated since the last call.
    pub fn take_changes(&mut self) -> Vec<SlotChange> {
        std::mem::take(&mut self.changes)
    }

    // -- Internal -----------------------------------------------------------

    fn attempt(&self, id: SlotId) -> Option<&Attempt> {
        self.slots.get(id.index())?.attempt.as_ref()
    }

    fn fire_due(&mut self, now: Duration, result: &mut StepResult) {
        for index in 0..self.slots.len() {
            let entry = &mut self.slots[index];
            let Some(attempt) = entry.attempt.as_mut() else {
                continue;
            };
            let transition = attempt.fire_if_due(now);
            if transition.changed() {
                result.timeouts_fired += 1;
                let attempt_id = attempt.id();
                self.record(SlotId(index as u32), attempt_id, transition, result);
            }
        }
    }

    fn deliver(&mut self, signal: SlotSignal, result: &mut StepResult) {
        let Some(attempt) = self
            .slots
            .get_mut(signal.slot.index())
            .and_then(|entry| entry.attempt.as_mut())
        else {
            trace!(slot = %signal.slot, "signal for unknown or idle slot ignored");
            result.signals_ignored += 1;
            return;
        };
        if attempt.id() != signal.attempt {
            trace!(slot = %signal.slot, attempt = %signal.attempt, "stale signal ignored");
            result.signals_ignored += 1;
            return;
        }
        let transition = attempt.handle(signal.kind);
        if transition.changed() {
            self.record(signal.slot, signal.attempt, transition, result);
        } else {
            trace!(slot = %signal.slot, kind = ?signal.kind, "signal lost the race");
            result.signals_ignored += 1;
        }
    }

    fn record(
        &mut self,
        id: SlotId,
        attempt: AttemptId,
        transition: Transition,
        result: &mut StepResult,
    ) {
        let entry = &self.slots[id.index()];
        let outcome = entry.attempt.as_ref().and_then(Attempt::outcome);
        if let Some(outcome) = outcome {
            debug!(slot = %id, attempt = %attempt, outcome = outcome.as_str(), ?transition, "preview resolved");
        }
        let presentation = Presentation::project(&entry.slot, outcome, &self.config);
        self.changes.push(SlotChange {
            slot: id,
            attempt,
            outcome,
            presentation,
        });
        result.changes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::ContentProbe;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn resolver_with(urls: &[&str]) -> PreviewResolver {
        let mut resolver = PreviewResolver::new(ResolverConfig::default());
        for url in urls {
            resolver.add_slot(PreviewSlot::new(*url).unwrap());
        }
        resolver
    }

    fn sig(slot: SlotId, attempt: AttemptId, kind: SignalKind) -> SlotSignal {
        SlotSignal {
            slot,
            attempt,
            kind,
        }
    }

    #[test]
    fn begin_emits_embed_change() {
        let mut r = resolver_with(&["https://example.com"]);
        let attempt = r.begin(SlotId(0), ms(0)).unwrap();
        let changes = r.take_changes();
        assert_eq!(
            changes,
            vec![SlotChange {
                slot: SlotId(0),
                attempt,
                outcome: None,
                presentation: Presentation::Embed {
                    src: "https://example.com".into()
                },
            }]
        );
        assert!(r.is_pending(SlotId(0)));
        assert_eq!(r.next_deadline(), Some(ms(6000)));
    }

    #[test]
    fn begin_unknown_slot_is_none() {
        let mut r = resolver_with(&[]);
        assert_eq!(r.begin(SlotId(3), ms(0)), None);
        assert!(r.take_changes().is_empty());
    }

    #[test]
    fn cross_origin_load_keeps_embed() {
        let mut r = resolver_with(&["https://example.com"]);
        let a = r.begin(SlotId(0), ms(0)).unwrap();
        r.take_changes();

        let res = r.signal(
            ms(800),
            sig(SlotId(0), a, SignalKind::Load(ContentProbe::CrossOriginDenied)),
        );
        assert_eq!(res.changes, 1);
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::Loaded));
        assert_eq!(
            r.presentation(SlotId(0)),
            Some(Presentation::Embed {
                src: "https://example.com".into()
            })
        );
        assert_eq!(r.next_deadline(), None);
    }

    #[test]
    fn timeout_fires_on_step() {
        let mut r = resolver_with(&["https://slow.example.com"]);
        r.begin(SlotId(0), ms(0)).unwrap();
        r.take_changes();

        assert_eq!(r.step(ms(5999)).timeouts_fired, 0);
        let res = r.step(ms(6000));
        assert_eq!(res.timeouts_fired, 1);
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::TimedOut));
        let changes = r.take_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].presentation,
            Presentation::Screenshot {
                src: "https://image.thum.io/get/width/800/crop/600/https%3A%2F%2Fslow.example.com"
                    .into()
            }
        );
    }

    #[test]
    fn queued_load_before_deadline_wins_over_late_step() {
        let mut r = resolver_with(&["https://example.com"]);
        let a = r.begin(SlotId(0), ms(0)).unwrap();
        r.push_signal(
            ms(5990),
            sig(SlotId(0), a, SignalKind::Load(ContentProbe::CrossOriginDenied)),
        );
        let res = r.step(ms(6050));
        assert_eq!(res.timeouts_fired, 0);
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::Loaded));
    }

    #[test]
    fn queued_load_after_deadline_loses() {
        let mut r = resolver_with(&["https://example.com"]);
        let a = r.begin(SlotId(0), ms(0)).unwrap();
        r.push_signal(ms(6010), sig(SlotId(0), a, SignalKind::Error));
        let res = r.step(ms(6050));
        assert_eq!(res.timeouts_fired, 1);
        assert_eq!(res.signals_ignored, 1);
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::TimedOut));
    }

    #[test]
    fn out_of_order_pushes_resolve_by_arrival_time() {
        let mut r = resolver_with(&["https://example.com"]);
        let a = r.begin(SlotId(0), ms(0)).unwrap();
        r.push_signal(ms(300), sig(SlotId(0), a, SignalKind::Error));
        r.push_signal(
            ms(100),
            sig(SlotId(0), a, SignalKind::Load(ContentProbe::CrossOriginDenied)),
        );
        let res = r.step(ms(400));
        assert_eq!(res.signals_processed, 2);
        assert_eq!(res.signals_ignored, 1);
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::Loaded));
    }

    #[test]
    fn early_load_pushed_late_beats_deadline() {
        let mut r = resolver_with(&["https://example.com"]);
        let a = r.begin(SlotId(0), ms(0)).unwrap();
        r.push_signal(ms(7000), sig(SlotId(0), a, SignalKind::Error));
        r.push_signal(
            ms(100),
            sig(SlotId(0), a, SignalKind::Load(ContentProbe::CrossOriginDenied)),
        );
        let res = r.step(ms(7000));
        assert_eq!(res.timeouts_fired, 0);
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::Loaded));
    }

    #[test]
    fn equal_timestamps_keep_push_order() {
        let mut r = resolver_with(&["https://example.com"]);
        let a = r.begin(SlotId(0), ms(0)).unwrap();
        r.push_signal(ms(50), sig(SlotId(0), a, SignalKind::Error));
        r.push_signal(
            ms(50),
            sig(SlotId(0), a, SignalKind::Load(ContentProbe::CrossOriginDenied)),
        );
        r.step(ms(50));
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::Blocked));
    }

    #[test]
    fn stale_attempt_signals_ignored() {
        let mut r = resolver_with(&["https://example.com"]);
        let first = r.begin(SlotId(0), ms(0)).unwrap();
        let second = r.begin(SlotId(0), ms(10)).unwrap();
        assert_ne!(first, second);

        let res = r.signal(ms(20), sig(SlotId(0), first, SignalKind::Error));
        assert_eq!(res.signals_ignored, 1);
        assert!(r.is_pending(SlotId(0)));
    }

    #[test]
    fn signal_for_unstarted_slot_ignored() {
        let mut r = resolver_with(&["https://example.com"]);
        let res = r.signal(ms(0), sig(SlotId(0), AttemptId(1), SignalKind::Error));
        assert_eq!(res.signals_ignored, 1);
        assert_eq!(r.presentation(SlotId(0)), None);
    }

    #[test]
    fn slots_resolve_independently() {
        let mut r = resolver_with(&["https://a.test", "https://b.test"]);
        let started = r.begin_all(ms(0));
        assert_eq!(started.len(), 2);
        r.signal(
            ms(100),
            sig(started[0].0, started[0].1, SignalKind::Error),
        );
        assert_eq!(r.outcome(SlotId(0)), Some(Outcome::Blocked));
        assert!(r.is_pending(SlotId(1)));
        assert_eq!(r.next_deadline(), Some(ms(6000)));
    }
}
