#![forbid(unsafe_code)]

//! Core: project-preview resolution for the Vitrine portfolio page.
//!
//! # Role in Vitrine
//! `vitrine-core` decides what each project preview shows: the live embedded
//! page, a rendered screenshot of it, or a static placeholder. It owns no
//! timers, DOM nodes, or JS types. The host (the `vitrine-web` crate, or any
//! replay harness) delivers signals and a monotonic clock, and reads back
//! presentation changes to apply.
//!
//! # Primary responsibilities
//! - **Resolution**: single-assignment `Pending -> Resolved(Outcome)` state,
//!   raced by frame load, frame error, and timeout.
//! - **PreviewResolver**: step-based runner for inline preview slots.
//! - **ProjectViewer**: the full-page modal variant, with deferred clearing
//!   of its blocked visual after the close transition.
//! - **Signal parsing**: JSON-encoded host signals for plain-JS hosts.
//!
//! # Execution model
//! ```text
//! browser callback (load / error / timer / image error)
//!   → push_signal(now, signal)
//!   → step(now)                 // drain signals, fire due deadlines
//!   → take_changes()            // presentation deltas to project onto the DOM
//! ```

pub mod attempt;
pub mod config;
pub mod resolution;
pub mod resolver;
pub mod runtime;
pub mod screenshot;
pub mod signal_parser;
pub mod slot;
pub mod viewer;

pub use attempt::{Attempt, AttemptId, SignalKind, Transition};
pub use config::{ConfigError, ResolverConfig};
pub use resolution::{
    ContentProbe, EmbedSignal, FallbackCause, Outcome, Resolution, ResolutionState,
};
pub use resolver::{Presentation, PreviewResolver, SlotChange, SlotSignal, StepResult};
pub use runtime::PageRuntime;
pub use signal_parser::{HostSignal, SignalParseError, SignalTarget, parse_encoded_signal};
pub use slot::{PreviewSlot, SlotError, SlotId};
pub use viewer::{CloseTicket, ProjectViewer, ViewerCard, ViewerView};
