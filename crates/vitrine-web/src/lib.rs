#![forbid(unsafe_code)]

//! WASM frontend for Vitrine.
//!
//! This crate provides [`VitrineHost`], a `wasm-bindgen`-exported struct that
//! scans the page for preview markup, wires frame / image / timer / keyboard
//! callbacks into [`vitrine_core::PageRuntime`], and projects the runtime's
//! presentation changes back onto the DOM.
//!
//! The markup contract lives in [`markup`] and is compiled on every target so
//! slot extraction can be tested natively.

pub mod markup;

#[cfg(target_arch = "wasm32")]
mod dom;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::VitrineHost;
