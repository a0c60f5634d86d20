#![forbid(unsafe_code)]

//! Platform-independent page runtime: inline slots plus the project viewer.
//!
//! This is the logic shared between the wasm-bindgen host and native tests.
//! No JS/WASM types here.

use std::time::Duration;

use tracing::trace;

use crate::attempt::{AttemptId, Transition};
use crate::config::ResolverConfig;
use crate::resolver::{PreviewResolver, SlotChange, SlotSignal, StepResult};
use crate::signal_parser::{HostSignal, SignalTarget, parse_encoded_signal};
use crate::slot::{PreviewSlot, SlotId};
use crate::viewer::{CloseTicket, ProjectViewer, ViewerCard};

/// Everything the preview layer of one page owns.
#[derive(Debug)]
pub struct PageRuntime {
    resolver: PreviewResolver,
    viewer: ProjectViewer,
}

impl PageRuntime {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            viewer: ProjectViewer::new(config.clone()),
            resolver: PreviewResolver::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        self.resolver.config()
    }

    #[must_use]
    pub fn resolver(&self) -> &PreviewResolver {
        &self.resolver
    }

    #[must_use]
    pub fn viewer(&self) -> &ProjectViewer {
        &self.viewer
    }

    pub fn add_inline_slot(&mut self, slot: PreviewSlot) -> SlotId {
        self.resolver.add_slot(slot)
    }

    pub fn add_card(&mut self, card: ViewerCard) -> usize {
        self.viewer.add_card(card)
    }

    /// Start every inline slot's embed attempt.
    pub fn start(&mut self, now: Duration) -> Vec<(SlotId, AttemptId)> {
        self.resolver.begin_all(now)
    }

    /// Apply a decoded host signal. Returns `true` if it changed anything.
    pub fn dispatch(&mut self, signal: HostSignal, now: Duration) -> bool {
        match signal {
            HostSignal::Embed {
                target: SignalTarget::Slot(slot),
                attempt,
                kind,
            } => {
                let result = self.resolver.signal(
                    now,
                    SlotSignal {
                        slot,
                        attempt,
                        kind,
                    },
                );
                result.changes > 0
            }
            HostSignal::Embed {
                target: SignalTarget::Viewer,
                attempt,
                kind,
            } => self.viewer.signal(attempt, kind, now) != Transition::Ignored,
            HostSignal::Open { card } => self.viewer.open(card, now).is_some(),
            HostSignal::Close => self.viewer.close(now).is_some(),
            HostSignal::Key(key) => self.viewer.handle_key(&key, now).is_some(),
        }
    }

    /// Parse and apply a JSON-encoded host signal.
    ///
    /// Returns `true` if the signal was well-formed and known, whether or not
    /// it changed anything.
    pub fn push_encoded_signal(&mut self, json: &str, now: Duration) -> bool {
        match parse_encoded_signal(json) {
            Ok(Some(signal)) => {
                self.dispatch(signal, now);
                true
            }
            Ok(None) => false,
            Err(err) => {
                trace!(%err, "encoded signal rejected");
                false
            }
        }
    }

    /// Advance the clock for both the inline slots and the viewer.
    pub fn tick(&mut self, now: Duration) -> (StepResult, bool) {
        let step = self.resolver.step(now);
        let viewer_changed = self.viewer.tick(now);
        (step, viewer_changed)
    }

    /// Clear the viewer's blocked visual once its close transition ended.
    /// Returns `false` if the viewer was re-opened in the meantime.
    pub fn finish_viewer_close(&mut self, ticket: CloseTicket) -> bool {
        self.viewer.finish_close(ticket)
    }

    /// Earliest host time at which [`tick`](Self::tick) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.resolver.next_deadline(), self.viewer.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drain inline slot presentation changes.
    pub fn take_slot_changes(&mut self) -> Vec<SlotChange> {
        self.resolver.take_changes()
    }

    /// Whether the viewer must be re-projected; clears the flag.
    pub fn take_viewer_dirty(&mut self) -> bool {
        self.viewer.take_dirty()
    }
}
