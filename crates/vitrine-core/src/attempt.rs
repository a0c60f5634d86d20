#![forbid(unsafe_code)]

//! One embed attempt: a [`Resolution`] plus its armed deadline.

use core::fmt;
use std::time::Duration;

use crate::resolution::{ContentProbe, EmbedSignal, Outcome, Resolution};

/// Identifies one embed attempt. A slot that is re-opened (viewer mode) gets
/// a new id, so signals from the previous frame navigation are recognised as
/// stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the host can report about an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Frame `load` callback, with the result of probing its document.
    Load(ContentProbe),
    /// Frame `error` callback.
    Error,
    /// Host timer fired.
    Timeout,
    /// The fallback screenshot image failed to load.
    ImageError,
}

impl SignalKind {
    /// The embed signal this kind races with, if any.
    #[must_use]
    pub const fn embed(self) -> Option<EmbedSignal> {
        match self {
            Self::Load(probe) => Some(EmbedSignal::Load(probe)),
            Self::Error => Some(EmbedSignal::Error),
            Self::Timeout => Some(EmbedSignal::Timeout),
            Self::ImageError => None,
        }
    }
}

/// Effect of delivering a signal to an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already resolved, or not applicable in the current state.
    Ignored,
    /// This signal won the race.
    Resolved(Outcome),
    /// The screenshot failed; the placeholder takes over.
    ScreenshotFailed,
}

impl Transition {
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// A running or settled embed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    id: AttemptId,
    started_at: Duration,
    deadline: Option<Duration>,
    resolution: Resolution,
}

impl Attempt {
    /// Start an attempt at `now` whose deadline is `now + timeout`.
    #[must_use]
    pub fn start(id: AttemptId, now: Duration, timeout: Duration) -> Self {
        Self {
            id,
            started_at: now,
            deadline: Some(now.saturating_add(timeout)),
            resolution: Resolution::pending(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub const fn started_at(&self) -> Duration {
        self.started_at
    }

    /// Armed deadline, `None` once cancelled or fired.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    #[must_use]
    pub const fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.resolution.outcome()
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.resolution.is_resolved()
    }

    /// Whether the deadline has elapsed on an unresolved attempt.
    #[must_use]
    pub fn is_due(&self, now: Duration) -> bool {
        self.is_pending() && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Deliver a signal.
    pub fn handle(&mut self, kind: SignalKind) -> Transition {
        let Some(signal) = kind.embed() else {
            return if self.resolution.screenshot_failed() {
                Transition::ScreenshotFailed
            } else {
                Transition::Ignored
            };
        };
        // Load and error cancel the deadline whether or not they win.
        if !matches!(signal, EmbedSignal::Timeout) {
            self.deadline = None;
        }
        match self.resolution.apply(signal) {
            Some(outcome) => {
                self.deadline = None;
                Transition::Resolved(outcome)
            }
            None => Transition::Ignored,
        }
    }

    /// Fire the timeout if the deadline has elapsed.
    pub fn fire_if_due(&mut self, now: Duration) -> Transition {
        if self.is_due(now) {
            self.handle(SignalKind::Timeout)
        } else {
            Transition::Ignored
        }
    }
}
