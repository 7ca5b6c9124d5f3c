//! Chord leadsheet WASM API
//!
//! This module provides the JavaScript-facing API for the leadsheet core.
//!
//! # Module Structure
//!
//! - `helpers`: Shared utilities for serialization, validation, error handling, and logging
//! - `editor`: `LeadSheetEditor`, a stateful wrapper around one `ChordLeadSheet`
//! - `listener`: JS callbacks registered as change listeners

#[macro_use]
pub mod helpers;
pub mod editor;
pub mod listener;

pub use editor::LeadSheetEditor;
pub use listener::{JsListener, ListenerHandle};
