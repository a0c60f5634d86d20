#![forbid(unsafe_code)]

//! Single-assignment resolution of one embed attempt.
//!
//! A frame can report completion through three independent channels: its
//! `load` callback, its `error` callback, and a deadline armed by the host.
//! Browsers do not order these, and several may be queued before any runs.
//! [`Resolution`] accepts exactly one of them; every later signal is a no-op.

/// What the host learned when it tried to inspect a loaded frame's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentProbe {
    /// Reading the document raised an access violation. The remote origin
    /// refused inspection, which only happens once it has rendered a real
    /// page: this counts as a successful embed.
    CrossOriginDenied,
    /// The document was readable.
    Accessible {
        /// `true` when the body has no markup at all.
        body_empty: bool,
    },
    /// No document or body was exposed (null `contentDocument`).
    Unavailable,
}

impl ContentProbe {
    /// Outcome implied by a load signal carrying this probe.
    #[must_use]
    pub const fn outcome(self) -> Outcome {
        match self {
            Self::CrossOriginDenied => Outcome::Loaded,
            Self::Accessible { body_empty: true } => Outcome::Blocked,
            Self::Accessible { body_empty: false } | Self::Unavailable => Outcome::Loaded,
        }
    }
}

/// One of the three signals racing to resolve an embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedSignal {
    /// Frame navigation completed (successfully or not).
    Load(ContentProbe),
    /// Frame transport failed outright.
    Error,
    /// The deadline elapsed first.
    Timeout,
}

impl EmbedSignal {
    /// Outcome this signal produces when it wins the race.
    #[must_use]
    pub const fn outcome(self) -> Outcome {
        match self {
            Self::Load(probe) => probe.outcome(),
            Self::Error => Outcome::Blocked,
            Self::Timeout => Outcome::TimedOut,
        }
    }
}

/// Final classification of a preview slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The live embed stays in place.
    Loaded,
    /// Load error, or a readable but empty document.
    Blocked,
    /// Neither load nor error arrived before the deadline.
    TimedOut,
    /// The screenshot fallback failed too; the placeholder is shown.
    ScreenshotFailed,
}

impl Outcome {
    /// Whether the embed has been replaced by a screenshot image.
    #[must_use]
    pub const fn shows_screenshot(self) -> bool {
        matches!(self, Self::Blocked | Self::TimedOut)
    }

    /// Failure kind behind a fallback, `None` for a live embed.
    #[must_use]
    pub const fn fallback_cause(self) -> Option<FallbackCause> {
        match self {
            Self::Loaded => None,
            Self::Blocked => Some(FallbackCause::EmbedBlocked),
            Self::TimedOut => Some(FallbackCause::EmbedTimedOut),
            Self::ScreenshotFailed => Some(FallbackCause::ScreenshotLoadFailed),
        }
    }

    /// Stable lowercase label, used by the web layer for `data-outcome`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Blocked => "blocked",
            Self::TimedOut => "timed_out",
            Self::ScreenshotFailed => "screenshot_failed",
        }
    }
}

/// Why a slot fell back. Never surfaced to callers; every cause maps to a
/// visual fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackCause {
    EmbedBlocked,
    EmbedTimedOut,
    ScreenshotLoadFailed,
}

/// Resolution state of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResolutionState {
    #[default]
    Pending,
    Resolved(Outcome),
}

/// Guarded `Pending -> Resolved` transition.
///
/// The only transition allowed after resolution is the screenshot failing:
/// `Resolved(Blocked | TimedOut) -> Resolved(ScreenshotFailed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    state: ResolutionState,
}

impl Resolution {
    /// A fresh, unresolved attempt.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            state: ResolutionState::Pending,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ResolutionState {
        self.state
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.state, ResolutionState::Resolved(_))
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        match self.state {
            ResolutionState::Pending => None,
            ResolutionState::Resolved(outcome) => Some(outcome),
        }
    }

    /// Apply an embed signal.
    ///
    /// Returns the outcome if this signal resolved the attempt, `None` if the
    /// attempt was already resolved.
    pub fn apply(&mut self, signal: EmbedSignal) -> Option<Outcome> {
        if self.is_resolved() {
            return None;
        }
        let outcome = signal.outcome();
        self.state = ResolutionState::Resolved(outcome);
        Some(outcome)
    }

    /// Record that the screenshot image failed to load.
    ///
    /// Returns `true` if the attempt moved to [`Outcome::ScreenshotFailed`].
    /// Ignored unless a screenshot is currently shown.
    pub fn screenshot_failed(&mut self) -> bool {
        match self.state {
            ResolutionState::Resolved(outcome) if outcome.shows_screenshot() => {
                self.state = ResolutionState::Resolved(Outcome::ScreenshotFailed);
                true
            }
            _ => false,
        }
    }
}
