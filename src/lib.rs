//! Chord Leadsheet WASM Module
//!
//! Document core of a chord leadsheet editor: a bar-structured song made of
//! sections, chord symbols and bar annotations, edited through undoable
//! transactions that notify registered listeners of every change.

pub mod models;
pub mod undo;
#[macro_use]
pub mod api;
pub mod leadsheet;

// Re-export commonly used types
pub use api::{LeadSheetEditor, ListenerHandle};
pub use leadsheet::{
    ChangeEvent, ChordLeadSheet, EditError, LeadSheetConfig, LeadSheetListener, LeadSheetSnapshot,
    ListenerError, Subscription, TruncationApproval,
};
pub use models::*;

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    init_logging();

    log::info!("Chord leadsheet WASM module initialized");
}

#[cfg(feature = "console_log")]
fn init_logging() {
    if console_log::init_with_level(log::Level::Debug).is_err() {
        log::warn!("Logger already initialized");
    }
}

#[cfg(not(feature = "console_log"))]
fn init_logging() {}
