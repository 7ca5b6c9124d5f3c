//! Models module for the chord leadsheet
//!
//! This module contains the value types stored in a leadsheet:
//! positions, time signatures, chord symbols and the item sum type.

pub mod chord_symbol;
pub mod items;
pub mod position;

// Re-export commonly used types
pub use chord_symbol::{
    Accent, Accidental, AlternateChord, ChordName, ChordRendering, ChordSymbol, Note, NoteLetter,
};
pub use items::{BarAnnotation, Item, ItemData, ItemId, ItemKind, Section, SheetId};
pub use position::{Beat, Position, TimeSignature};
