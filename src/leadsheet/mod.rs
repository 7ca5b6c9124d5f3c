//! The chord leadsheet document
//!
//! A `ChordLeadSheet` owns a bar count and a position-ordered collection of
//! items (sections, chord symbols, bar annotations). It enforces:
//!
//! 1. bar 0 always starts with exactly one section at `[0:0]`
//! 2. section names are unique
//! 3. no two items of the same kind share a position
//! 4. every item sits on a bar below the bar count, at a beat that fits the
//!    time signature of its governing section
//! 5. iteration is positional
//!
//! All mutations happen inside an edit transaction (`start_edit` ..
//! `end_edit` / `abort_edit`) and raise `ChangeEvent`s on the sheet's
//! notification bus before returning. Mutations live in `edits.rs`.

pub mod config;
pub mod edits;
pub mod errors;
pub mod events;
pub mod store;

pub use config::LeadSheetConfig;
pub use edits::TruncationApproval;
pub use errors::EditError;
pub use events::{ChangeEvent, LeadSheetListener, ListenerError, NotificationBus, Subscription};

use crate::models::{Item, ItemData, ItemId, ItemKind, Position, Section, SheetId, TimeSignature};
use crate::undo::{Command, EditState, UndoStack};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::rc::Rc;
use store::ItemStore;

/// Plain copy of a leadsheet's content, in position order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadSheetSnapshot {
    pub size_in_bars: u32,
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub struct ChordLeadSheet {
    id: SheetId,
    store: ItemStore,
    bus: NotificationBus,
    edit: EditState,
    undo_stack: UndoStack,
    config: LeadSheetConfig,
}

impl ChordLeadSheet {
    /// Create a leadsheet with one 4/4 section at bar 0
    ///
    /// A zero size is raised to one bar and an empty name replaced by the
    /// default section name.
    pub fn new(initial_section_name: &str, size_in_bars: u32) -> Self {
        let defaults = LeadSheetConfig::default();
        let name = if initial_section_name.trim().is_empty() {
            defaults.initial_section_name.clone()
        } else {
            initial_section_name.to_string()
        };
        Self::build(LeadSheetConfig {
            initial_size_in_bars: size_in_bars.max(1),
            initial_section_name: name,
            ..defaults
        })
    }

    /// Create a leadsheet from a validated config
    pub fn with_config(config: LeadSheetConfig) -> Result<Self, EditError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: LeadSheetConfig) -> Self {
        let id = SheetId::allocate();
        let mut store = ItemStore::new(id, config.initial_size_in_bars);
        let initial = Item::new(
            Position::bar_start(0),
            ItemData::Section(Section::new(
                config.initial_section_name.clone(),
                config.initial_time_signature,
            )),
        );
        let seeded = store.insert(initial);
        debug_assert!(seeded.is_ok());

        log::info!(
            "Created leadsheet {:?}: {} bars, section '{}' ({})",
            id,
            config.initial_size_in_bars,
            config.initial_section_name,
            config.initial_time_signature
        );

        Self {
            id,
            store,
            bus: NotificationBus::new(),
            edit: EditState::Idle,
            undo_stack: UndoStack::new(config.undo_limit),
            config,
        }
    }

    pub fn id(&self) -> SheetId {
        self.id
    }

    pub fn config(&self) -> &LeadSheetConfig {
        &self.config
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn size_in_bars(&self) -> u32 {
        self.store.size_in_bars()
    }

    pub fn item_count(&self) -> usize {
        self.store.len()
    }

    /// Resolve an item handle; `None` once the item has been removed
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.store.get(id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.store.contains(id)
    }

    /// Items on bars `from_bar..=to_bar`, in position order
    ///
    /// The iterator is lazy and can be cloned to restart the scan.
    /// `kind` restricts the result to one item kind.
    pub fn items(
        &self,
        from_bar: u32,
        to_bar: u32,
        kind: Option<ItemKind>,
    ) -> impl Iterator<Item = &Item> + Clone + '_ {
        self.store
            .range(from_bar, to_bar)
            .filter(move |item| kind.map_or(true, |k| item.kind() == k))
    }

    /// Every item, in position order
    pub fn all_items(&self, kind: Option<ItemKind>) -> impl Iterator<Item = &Item> + Clone + '_ {
        self.items(0, u32::MAX, kind)
    }

    /// Section governing `bar` (last section at or before it)
    ///
    /// Always `Some` for `bar < size_in_bars()`.
    pub fn section_at(&self, bar: u32) -> Option<&Item> {
        if bar >= self.size_in_bars() {
            return None;
        }
        self.store.section_governing(bar)
    }

    pub fn section_named(&self, name: &str) -> Option<&Item> {
        self.store.section_by_name(name)
    }

    /// Sections in bar order
    pub fn sections(&self) -> impl Iterator<Item = &Item> + Clone + '_ {
        self.store.sections()
    }

    /// Bars governed by a section, up to the next section or the last bar
    pub fn section_bar_range(&self, section: ItemId) -> Option<RangeInclusive<u32>> {
        let item = self.store.get(section).filter(|item| item.is_section())?;
        let start = item.bar();
        let end = match self.store.next_section_after(start) {
            Some(next) => next.bar() - 1,
            None => self.size_in_bars() - 1,
        };
        Some(start..=end)
    }

    /// Items of a section's bars, excluding the section itself
    pub fn items_in_section(&self, section: ItemId, kind: Option<ItemKind>) -> Vec<&Item> {
        match self.section_bar_range(section) {
            Some(bars) => self
                .items(*bars.start(), *bars.end(), kind)
                .filter(|item| item.id() != section)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn time_signature_at(&self, bar: u32) -> Option<TimeSignature> {
        if bar >= self.size_in_bars() {
            return None;
        }
        self.store.time_signature_at(bar)
    }

    /// First item strictly after `position`
    pub fn first_item_after(&self, position: Position, kind: Option<ItemKind>) -> Option<&Item> {
        self.items(position.bar, u32::MAX, kind)
            .find(|item| item.position() > position)
    }

    /// Last item strictly before `position`
    pub fn last_item_before(&self, position: Position, kind: Option<ItemKind>) -> Option<&Item> {
        self.items(0, position.bar, kind)
            .filter(|item| item.position() < position)
            .last()
    }

    /// Items a shrink to `new_size` bars would delete (dry run)
    pub fn items_lost_by_resize(&self, new_size: u32) -> Vec<&Item> {
        if new_size >= self.size_in_bars() {
            return Vec::new();
        }
        self.store.range(new_size, u32::MAX).collect()
    }

    pub fn snapshot(&self) -> LeadSheetSnapshot {
        LeadSheetSnapshot {
            size_in_bars: self.size_in_bars(),
            items: self.store.iter().cloned().collect(),
        }
    }

    /// Run the full invariant check
    pub fn check_consistency(&self) -> Result<(), String> {
        self.store.validate()
    }

    // ========================================================================
    // Notification
    // ========================================================================

    /// Register an observer; keep the subscription alive to keep receiving events
    pub fn subscribe<L>(&self, listener: &Rc<L>) -> Subscription
    where
        L: LeadSheetListener + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.bus.listener_count()
    }

    // ========================================================================
    // Edit transactions
    // ========================================================================

    pub fn is_edit_open(&self) -> bool {
        self.edit.is_open()
    }

    /// Label of the open edit, if any
    pub fn edit_label(&self) -> Option<&str> {
        self.edit.label()
    }

    /// Open an edit transaction
    ///
    /// # Panics
    /// If an edit is already open. Transactions do not nest.
    pub fn start_edit(&mut self, label: &str) {
        self.edit.begin(label);
        log::debug!("Edit '{}' started", label);
    }

    /// Commit the open edit as one undoable step
    ///
    /// Returns `TransactionAborted` if the edit was rolled back internally
    /// after an inconsistency; the edit is closed either way.
    ///
    /// # Panics
    /// If no edit is open.
    pub fn end_edit(&mut self) -> Result<(), EditError> {
        match self.edit.take() {
            EditState::Open(tx) => {
                let label = tx.label().to_string();
                if tx.is_empty() {
                    log::debug!("Edit '{}' committed with no changes", label);
                    return Ok(());
                }
                log::info!("Edit '{}' committed ({} changes)", label, tx.len());
                self.undo_stack.push(tx.into_undoable());
                self.bus
                    .dispatch(self, &ChangeEvent::EditCommitted { label });
                Ok(())
            }
            EditState::Poisoned { label, reason } => {
                log::warn!("Edit '{}' cannot be committed: {}", label, reason);
                Err(EditError::TransactionAborted(label))
            }
            EditState::Idle => panic!("end_edit called with no open edit"),
        }
    }

    /// Roll back the open edit and close it
    ///
    /// Returns the reason to report to the user. For an edit already rolled
    /// back internally, that is the original inconsistency.
    ///
    /// # Panics
    /// If no edit is open.
    pub fn abort_edit(&mut self, reason: &str) -> String {
        match self.edit.take() {
            EditState::Open(tx) => {
                log::warn!(
                    "Edit '{}' aborted after {} changes: {}",
                    tx.label(),
                    tx.len(),
                    reason
                );
                self.rollback(tx.rollback_commands());
                reason.to_string()
            }
            EditState::Poisoned { label, reason } => {
                log::warn!("Edit '{}' closed after internal rollback", label);
                reason
            }
            EditState::Idle => panic!("abort_edit called with no open edit"),
        }
    }

    /// Run `f` inside an edit: commit on `Ok`, abort on `Err`
    pub fn edit<T, F>(&mut self, label: &str, f: F) -> Result<T, EditError>
    where
        F: FnOnce(&mut ChordLeadSheet) -> Result<T, EditError>,
    {
        self.start_edit(label);
        match f(self) {
            Ok(value) => {
                self.end_edit()?;
                Ok(value)
            }
            Err(err) => {
                self.abort_edit(&err.to_string());
                Err(err)
            }
        }
    }

    // ========================================================================
    // Undo/redo
    // ========================================================================

    pub fn can_undo(&self) -> bool {
        self.undo_stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_stack.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.undo_stack.redo_label()
    }

    /// Revert the last committed edit, raising the inverse events
    ///
    /// # Panics
    /// If an edit is open.
    pub fn undo(&mut self) -> Result<(), EditError> {
        self.assert_idle("undo");
        let (label, commands) = match self.undo_stack.step_back() {
            Some(edit) => (edit.label.clone(), edit.commands.clone()),
            None => return Err(EditError::NothingToUndo),
        };
        log::info!("Undo '{}'", label);
        self.replay(commands.iter().rev().map(Command::inverse).collect())
    }

    /// Reapply the last undone edit, raising the original events
    ///
    /// # Panics
    /// If an edit is open.
    pub fn redo(&mut self) -> Result<(), EditError> {
        self.assert_idle("redo");
        let (label, commands) = match self.undo_stack.step_forward() {
            Some(edit) => (edit.label.clone(), edit.commands.clone()),
            None => return Err(EditError::NothingToRedo),
        };
        log::info!("Redo '{}'", label);
        self.replay(commands)
    }

    pub fn clear_undo_history(&mut self) {
        self.undo_stack.clear();
    }

    // ========================================================================
    // Internals shared with edits.rs
    // ========================================================================

    fn assert_idle(&self, operation: &str) {
        if let Some(label) = self.edit.label() {
            panic!("{} called while edit '{}' is open", operation, label);
        }
    }

    /// Apply and announce commands outside any transaction (undo/redo replay)
    fn replay(&mut self, commands: Vec<Command>) -> Result<(), EditError> {
        for command in commands {
            match command.execute(&mut self.store) {
                Ok(events) => {
                    for event in &events {
                        self.bus.dispatch(self, event);
                    }
                }
                Err(reason) => {
                    log::error!("Undo history replay failed: {}", reason);
                    self.undo_stack.clear();
                    return Err(EditError::InternalInconsistency(reason));
                }
            }
        }
        Ok(())
    }

    /// Apply rollback commands, announcing each one
    fn rollback(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command.execute(&mut self.store) {
                Ok(events) => {
                    for event in &events {
                        self.bus.dispatch(self, event);
                    }
                }
                Err(reason) => log::error!("Rollback step failed: {}", reason),
            }
        }
    }
}
