//! Leadsheet items
//!
//! An `Item` is a positioned piece of leadsheet content with a stable
//! identity. The payload is a closed sum type over the supported kinds, so
//! every operation matches on `ItemData` exhaustively.

use super::chord_symbol::ChordSymbol;
use super::position::{Position, TimeSignature};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ITEM_ID: AtomicU32 = AtomicU32::new(1);
static NEXT_SHEET_ID: AtomicU32 = AtomicU32::new(1);

/// Stable opaque identity of an item
///
/// Identities are allocated once and never handed out again, so a stale
/// handle can never alias a different item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u32);

impl ItemId {
    pub(crate) fn allocate() -> Self {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value for crossing the JS boundary
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Rebuild a handle from its raw value; it must be looked up before use
    pub fn from_raw(raw: u32) -> Self {
        ItemId(raw)
    }

    pub(crate) const MIN: ItemId = ItemId(0);
    pub(crate) const MAX: ItemId = ItemId(u32::MAX);
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a leadsheet document, used as the item owner back-reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetId(u32);

impl SheetId {
    pub(crate) fn allocate() -> Self {
        SheetId(NEXT_SHEET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Item kind tag
///
/// The declaration order is the order of items sharing a position:
/// a section always comes before the chord symbol on the same downbeat.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
pub enum ItemKind {
    Section = 0,
    ChordSymbol = 1,
    BarAnnotation = 2,
}

impl ItemKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ItemKind::Section),
            1 => Some(ItemKind::ChordSymbol),
            2 => Some(ItemKind::BarAnnotation),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Section => "section",
            ItemKind::ChordSymbol => "chord symbol",
            ItemKind::BarAnnotation => "bar annotation",
        }
    }
}

/// Section payload: governs naming and time signature until the next section
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub time_signature: TimeSignature,
}

impl Section {
    pub fn new(name: impl Into<String>, time_signature: TimeSignature) -> Self {
        Self {
            name: name.into(),
            time_signature,
        }
    }
}

/// Free-form text attached to a bar
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarAnnotation {
    pub text: String,
}

impl BarAnnotation {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Kind-specific payload of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ItemData {
    Section(Section),
    ChordSymbol(ChordSymbol),
    BarAnnotation(BarAnnotation),
}

impl ItemData {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemData::Section(_) => ItemKind::Section,
            ItemData::ChordSymbol(_) => ItemKind::ChordSymbol,
            ItemData::BarAnnotation(_) => ItemKind::BarAnnotation,
        }
    }
}

/// A positioned unit of leadsheet content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    position: Position,
    data: ItemData,
    /// Sheet currently holding the item (None while detached)
    #[serde(skip)]
    owner: Option<SheetId>,
}

impl Item {
    /// Create a detached item with a fresh identity
    ///
    /// Prefer the `ChordLeadSheet::create_*` factories, which also check
    /// that the payload suits the target document.
    pub fn new(position: Position, data: ItemData) -> Self {
        Self {
            id: ItemId::allocate(),
            position,
            data,
            owner: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn bar(&self) -> u32 {
        self.position.bar
    }

    pub fn data(&self) -> &ItemData {
        &self.data
    }

    pub fn kind(&self) -> ItemKind {
        self.data.kind()
    }

    pub fn owner(&self) -> Option<SheetId> {
        self.owner
    }

    pub fn is_section(&self) -> bool {
        matches!(self.data, ItemData::Section(_))
    }

    /// Section payload, if this item is a section
    pub fn as_section(&self) -> Option<&Section> {
        match &self.data {
            ItemData::Section(section) => Some(section),
            _ => None,
        }
    }

    pub fn as_chord_symbol(&self) -> Option<&ChordSymbol> {
        match &self.data {
            ItemData::ChordSymbol(chord) => Some(chord),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&BarAnnotation> {
        match &self.data {
            ItemData::BarAnnotation(annotation) => Some(annotation),
            _ => None,
        }
    }

    /// Copy of this item at another position, same identity
    pub fn at_position(&self, position: Position) -> Item {
        Item {
            position,
            ..self.clone()
        }
    }

    /// Copy of this item with another payload, same identity
    pub fn with_data(&self, data: ItemData) -> Item {
        Item {
            data,
            ..self.clone()
        }
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub(crate) fn set_data(&mut self, data: ItemData) {
        self.data = data;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<SheetId>) {
        self.owner = owner;
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ItemData::Section(s) => {
                write!(f, "Section {} ({}) {}", s.name, s.time_signature, self.position)
            }
            ItemData::ChordSymbol(c) => write!(f, "Chord {} {}", c, self.position),
            ItemData::BarAnnotation(a) => write!(f, "Annotation \"{}\" {}", a.text, self.position),
        }
    }
}
