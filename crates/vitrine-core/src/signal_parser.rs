#![forbid(unsafe_code)]

//! JSON parser for host-encoded signals.
//!
//! [`parse_encoded_signal`] lets a plain-JS host (or a recorded trace) drive
//! [`PageRuntime`](crate::PageRuntime) without wasm-bindgen types:
//!
//! ```json
//! {"kind":"load","slot":0,"attempt":1,"probe":"cross_origin"}
//! {"kind":"error","attempt":4}
//! {"kind":"open","card":2}
//! {"kind":"key","key":"Escape"}
//! ```
//!
//! Embed signals without a `slot` field address the viewer. Unknown kinds
//! return `Ok(None)`.

use core::fmt;

use serde::Deserialize;

use crate::attempt::{AttemptId, SignalKind};
use crate::resolution::ContentProbe;
use crate::slot::SlotId;

/// Errors from parsing encoded signal JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalParseError {
    /// Malformed JSON.
    Json(String),
    /// Missing required field.
    MissingField(&'static str),
    /// Unknown content probe value.
    UnknownProbe(String),
}

impl fmt::Display for SignalParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "JSON parse error: {msg}"),
            Self::MissingField(field) => write!(f, "missing required field: {field}"),
            Self::UnknownProbe(probe) => write!(f, "unknown probe: {probe}"),
        }
    }
}

impl std::error::Error for SignalParseError {}

/// Which resolver an embed signal is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTarget {
    Slot(SlotId),
    Viewer,
}

/// A decoded host signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    /// Frame load / error, timer, or screenshot image error.
    Embed {
        target: SignalTarget,
        attempt: AttemptId,
        kind: SignalKind,
    },
    /// A project card was clicked.
    Open { card: usize },
    /// The viewer's close control was activated.
    Close,
    /// A key was pressed (`KeyboardEvent.key`).
    Key(String),
}

/// Internal deserialization target.
#[derive(Debug, Deserialize)]
struct RawSignal {
    kind: String,
    #[serde(default)]
    slot: Option<u32>,
    #[serde(default)]
    attempt: Option<u64>,
    #[serde(default)]
    probe: Option<String>,
    #[serde(default)]
    card: Option<usize>,
    #[serde(default)]
    key: Option<String>,
}

/// Parse a JSON-encoded host signal.
pub fn parse_encoded_signal(json: &str) -> Result<Option<HostSignal>, SignalParseError> {
    let raw: RawSignal =
        serde_json::from_str(json).map_err(|e| SignalParseError::Json(e.to_string()))?;

    let kind = match raw.kind.as_str() {
        "load" => SignalKind::Load(parse_probe(raw.probe.as_deref())?),
        "error" => SignalKind::Error,
        "timeout" => SignalKind::Timeout,
        "image_error" => SignalKind::ImageError,
        "open" => {
            let card = raw.card.ok_or(SignalParseError::MissingField("card"))?;
            return Ok(Some(HostSignal::Open { card }));
        }
        "close" => return Ok(Some(HostSignal::Close)),
        "key" => {
            let key = raw.key.ok_or(SignalParseError::MissingField("key"))?;
            return Ok(Some(HostSignal::Key(key)));
        }
        _ => return Ok(None),
    };

    let attempt = raw
        .attempt
        .map(AttemptId)
        .ok_or(SignalParseError::MissingField("attempt"))?;
    let target = match raw.slot {
        Some(slot) => SignalTarget::Slot(SlotId(slot)),
        None => SignalTarget::Viewer,
    };
    Ok(Some(HostSignal::Embed {
        target,
        attempt,
        kind,
    }))
}

fn parse_probe(probe: Option<&str>) -> Result<ContentProbe, SignalParseError> {
    match probe {
        Some("cross_origin") => Ok(ContentProbe::CrossOriginDenied),
        Some("empty") => Ok(ContentProbe::Accessible { body_empty: true }),
        Some("content") => Ok(ContentProbe::Accessible { body_empty: false }),
        Some("none") | None => Ok(ContentProbe::Unavailable),
        Some(other) => Err(SignalParseError::UnknownProbe(other.to_string())),
    }
}
