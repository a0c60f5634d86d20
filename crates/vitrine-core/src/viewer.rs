#![forbid(unsafe_code)]

//! Full-page project viewer.
//!
//! A single modal frame is reused for every project card. Opening the viewer
//! starts the same load / error / timeout race as an inline slot, for the one
//! active card. Closing tears the frame source down immediately but keeps the
//! blocked visual (screenshot or placeholder) until the close transition has
//! finished, so the exit animation is not interrupted.
//!
//! Each open bumps a generation counter. A deferred clear only applies if no
//! open happened since the close that scheduled it.

use std::time::Duration;

use tracing::{debug, trace};

use crate::attempt::{Attempt, AttemptId, SignalKind, Transition};
use crate::config::ResolverConfig;
use crate::resolution::Outcome;
use crate::resolver::Presentation;
use crate::slot::PreviewSlot;

/// A clickable project card that opens in the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerCard {
    pub slot: PreviewSlot,
    pub title: String,
}

/// Projection of the viewer onto its DOM elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewerView {
    /// `open` class on the viewer root.
    pub open: bool,
    /// Page scroll is locked while the viewer is open.
    pub scroll_locked: bool,
    pub title: String,
    /// Target of the "open in new tab" and blocked-state links.
    pub link_href: String,
    /// Frame source; empty once torn down.
    pub frame_src: String,
    /// Attempt the frame source belongs to. A new attempt for an unchanged
    /// source still has to reload the frame.
    pub attempt: Option<AttemptId>,
    /// Blocked overlay content. `None` hides the overlay.
    pub fallback: Option<Presentation>,
}

impl ViewerView {
    #[must_use]
    pub fn blocked_visible(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Handle for the deferred clear scheduled by [`ProjectViewer::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseTicket {
    generation: u64,
    /// Host time at which the blocked visual may be cleared.
    pub due: Duration,
}

#[derive(Debug)]
struct ActiveCard {
    index: usize,
    attempt: Attempt,
}

/// Host-driven state machine for the modal project viewer.
#[derive(Debug)]
pub struct ProjectViewer {
    config: ResolverConfig,
    cards: Vec<ViewerCard>,
    active: Option<ActiveCard>,
    next_attempt: u64,
    generation: u64,
    pending_clear: Option<CloseTicket>,
    view: ViewerView,
    dirty: bool,
}

impl ProjectViewer {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cards: Vec::new(),
            active: None,
            next_attempt: 1,
            generation: 0,
            pending_clear: None,
            view: ViewerView::default(),
            dirty: false,
        }
    }

    pub fn add_card(&mut self, card: ViewerCard) -> usize {
        self.cards.push(card);
        self.cards.len() - 1
    }

    #[must_use]
    pub fn cards(&self) -> &[ViewerCard] {
        &self.cards
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.view.open
    }

    #[must_use]
    pub fn view(&self) -> &ViewerView {
        &self.view
    }

    /// Whether the view changed since the last call; clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    #[must_use]
    pub fn active_card(&self) -> Option<usize> {
        self.active.as_ref().map(|active| active.index)
    }

    #[must_use]
    pub fn active_attempt(&self) -> Option<AttemptId> {
        self.active.as_ref().map(|active| active.attempt.id())
    }

    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.active.as_ref().and_then(|active| active.attempt.outcome())
    }

    /// Pending deferred clear, if a close transition is running.
    #[must_use]
    pub fn pending_clear(&self) -> Option<CloseTicket> {
        self.pending_clear
    }

    /// Earliest host time at which [`tick`](Self::tick) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        let attempt = self
            .active
            .as_ref()
            .and_then(|active| active.attempt.deadline());
        let clear = self.pending_clear.map(|ticket| ticket.due);
        match (attempt, clear) {
            (Some(a), Some(c)) => Some(a.min(c)),
            (a, c) => a.or(c),
        }
    }

    // -- Open / close -------------------------------------------------------

    /// Open card `index` and start its embed race.
    pub fn open(&mut self, index: usize, now: Duration) -> Option<AttemptId> {
        let card = self.cards.get(index)?;
        let attempt_id = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        self.generation += 1;
        self.pending_clear = None;

        self.view = ViewerView {
            open: true,
            scroll_locked: true,
            title: card.title.clone(),
            link_href: card.slot.source_url().to_string(),
            frame_src: card.slot.source_url().to_string(),
            attempt: Some(attempt_id),
            fallback: None,
        };
        self.active = Some(ActiveCard {
            index,
            attempt: Attempt::start(attempt_id, now, self.config.embed_timeout),
        });
        self.dirty = true;
        debug!(card = index, attempt = %attempt_id, "viewer opened");
        Some(attempt_id)
    }

    /// Close the viewer. Returns the deferred-clear ticket, or `None` if the
    /// viewer was not open.
    pub fn close(&mut self, now: Duration) -> Option<CloseTicket> {
        if !self.view.open {
            return None;
        }
        self.view.open = false;
        self.view.scroll_locked = false;
        self.view.frame_src.clear();
        self.active = None;
        let ticket = CloseTicket {
            generation: self.generation,
            due: now.saturating_add(self.config.close_transition),
        };
        self.pending_clear = Some(ticket);
        self.dirty = true;
        debug!("viewer closed");
        Some(ticket)
    }

    /// Keyboard handling: Escape closes an open viewer.
    pub fn handle_key(&mut self, key: &str, now: Duration) -> Option<CloseTicket> {
        if key == "Escape" && self.view.open {
            self.close(now)
        } else {
            None
        }
    }

    /// Clear the blocked visual once the close transition has finished.
    ///
    /// No-op if the viewer was re-opened since `ticket` was issued.
    pub fn finish_close(&mut self, ticket: CloseTicket) -> bool {
        if self.pending_clear != Some(ticket) || ticket.generation != self.generation {
            return false;
        }
        self.pending_clear = None;
        self.view.frame_src.clear();
        self.view.fallback = None;
        self.dirty = true;
        true
    }

    // -- Signals ------------------------------------------------------------

    /// Deliver a frame or image signal for `attempt` at host time `now`.
    ///
    /// A deadline that elapsed before `now` fires first.
    pub fn signal(&mut self, attempt: AttemptId, kind: SignalKind, now: Duration) -> Transition {
        self.fire_due(now);
        let Some(active) = self.active.as_mut() else {
            trace!(attempt = %attempt, "viewer signal while closed ignored");
            return Transition::Ignored;
        };
        if active.attempt.id() != attempt {
            trace!(attempt = %attempt, "stale viewer signal ignored");
            return Transition::Ignored;
        }
        let transition = active.attempt.handle(kind);
        self.apply(transition);
        transition
    }

    /// Advance the clock: fire the embed deadline and finish a due close.
    pub fn tick(&mut self, now: Duration) -> bool {
        let fired = self.fire_due(now).changed();
        let due = self.pending_clear.filter(|ticket| now >= ticket.due);
        let cleared = due.is_some_and(|ticket| self.finish_close(ticket));
        fired || cleared
    }

    // -- Internal -----------------------------------------------------------

    fn fire_due(&mut self, now: Duration) -> Transition {
        let Some(active) = self.active.as_mut() else {
            return Transition::Ignored;
        };
        let transition = active.attempt.fire_if_due(now);
        self.apply(transition);
        transition
    }

    fn apply(&mut self, transition: Transition) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let outcome = match transition {
            Transition::Ignored => return,
            Transition::Resolved(outcome) => outcome,
            Transition::ScreenshotFailed => Outcome::ScreenshotFailed,
        };
        debug!(card = active.index, outcome = outcome.as_str(), "viewer resolved");
        if outcome == Outcome::Loaded {
            return;
        }
        let card = &self.cards[active.index];
        self.view.frame_src.clear();
        self.view.fallback = Some(Presentation::project(
            &card.slot,
            Some(outcome),
            &self.config,
        ));
        self.dirty = true;
    }
}
