//! Undo/redo for leadsheet edits
//!
//! Every mutation of a leadsheet is broken down into primitive `Command`s.
//! A command knows how to apply itself to an `ItemStore` and how to build its
//! inverse, and reports the `ChangeEvent`s it caused. The open transaction
//! logs the commands it applies; committing wraps that log into one
//! `UndoableEdit` on the `UndoStack`.

pub mod transaction;

pub use transaction::{EditState, Transaction};

use crate::leadsheet::events::ChangeEvent;
use crate::leadsheet::store::ItemStore;
use crate::models::{Item, ItemData, ItemId, Position};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Represents a reversible primitive edit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Insert an item (identity included)
    AddItem { item: Item },
    /// Remove an item; holds its full state for restoration
    RemoveItem { item: Item },
    /// Swap the payload of an item
    ChangeItem {
        id: ItemId,
        old_data: ItemData,
        new_data: ItemData,
    },
    /// Reposition an item
    MoveItem { id: ItemId, from: Position, to: Position },
    /// Change the bar count
    Resize { old_size: u32, new_size: u32 },
    /// Primitives applied as one step, so no event is seen between them
    Compound { commands: Vec<Command> },
}

impl Command {
    /// Execute this command on the store, returning the events it caused
    ///
    /// A failing `Compound` undoes the steps it already applied.
    pub fn execute(&self, store: &mut ItemStore) -> Result<Vec<ChangeEvent>, String> {
        match self {
            Command::Compound { commands } => {
                let mut events = Vec::with_capacity(commands.len());
                for (done, command) in commands.iter().enumerate() {
                    match command.execute(store) {
                        Ok(step) => events.extend(step),
                        Err(reason) => {
                            for applied in commands[..done].iter().rev() {
                                if let Err(undo_reason) = applied.undo(store) {
                                    log::error!("Compound step undo failed: {}", undo_reason);
                                }
                            }
                            return Err(reason);
                        }
                    }
                }
                Ok(events)
            }
            Command::AddItem { item } => {
                store.insert(item.clone())?;
                let item = stored(store, item.id())?;
                Ok(vec![ChangeEvent::ItemAdded { item }])
            }
            Command::RemoveItem { item } => {
                let removed = store
                    .remove(item.id())
                    .ok_or_else(|| format!("cannot remove {}: not stored", item.id()))?;
                Ok(vec![ChangeEvent::ItemRemoved { item: removed }])
            }
            Command::ChangeItem { id, new_data, .. } => {
                let old_data = store.replace_data(*id, new_data.clone())?;
                let item = stored(store, *id)?;
                Ok(vec![ChangeEvent::ItemChanged { item, old_data }])
            }
            Command::MoveItem { id, to, .. } => {
                let old_position = store.move_item(*id, *to)?;
                let item = stored(store, *id)?;
                Ok(vec![ChangeEvent::ItemMoved { item, old_position }])
            }
            Command::Resize { new_size, .. } => {
                let old_size = store.size_in_bars();
                store.set_size_in_bars(*new_size);
                Ok(vec![ChangeEvent::SizeChanged {
                    old_size,
                    new_size: *new_size,
                }])
            }
        }
    }

    /// The command that reverses this one
    pub fn inverse(&self) -> Command {
        match self {
            Command::AddItem { item } => Command::RemoveItem { item: item.clone() },
            Command::RemoveItem { item } => Command::AddItem { item: item.clone() },
            Command::ChangeItem {
                id,
                old_data,
                new_data,
            } => Command::ChangeItem {
                id: *id,
                old_data: new_data.clone(),
                new_data: old_data.clone(),
            },
            Command::MoveItem { id, from, to } => Command::MoveItem {
                id: *id,
                from: *to,
                to: *from,
            },
            Command::Resize { old_size, new_size } => Command::Resize {
                old_size: *new_size,
                new_size: *old_size,
            },
            Command::Compound { commands } => Command::Compound {
                commands: commands.iter().rev().map(Command::inverse).collect(),
            },
        }
    }

    /// Undo this command (reverse the operation)
    pub fn undo(&self, store: &mut ItemStore) -> Result<Vec<ChangeEvent>, String> {
        self.inverse().execute(store)
    }
}

fn stored(store: &ItemStore, id: ItemId) -> Result<Item, String> {
    store
        .get(id)
        .cloned()
        .ok_or_else(|| format!("item {} vanished during edit", id))
}

/// One committed transaction: replaying `commands` in reverse undoes it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UndoableEdit {
    pub label: String,
    pub commands: Vec<Command>,
}

/// Manages undo/redo history of committed edits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UndoStack {
    /// Committed edits, oldest first
    edits: VecDeque<UndoableEdit>,
    /// Current position in the stack (edits before it can be undone)
    current_index: usize,
    /// Maximum number of edits to keep in history
    max_size: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoStack {
    /// Create a new undo stack with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            edits: VecDeque::new(),
            current_index: 0,
            max_size,
        }
    }

    /// Push a committed edit, discarding any redo history
    pub fn push(&mut self, edit: UndoableEdit) {
        if edit.commands.is_empty() || self.max_size == 0 {
            return;
        }

        self.edits.truncate(self.current_index);
        self.edits.push_back(edit);
        self.current_index = self.edits.len();

        // Enforce max size
        if self.edits.len() > self.max_size {
            self.edits.pop_front();
            self.current_index = self.current_index.saturating_sub(1);
        }
    }

    /// Step back over the last edit, returning it for replay
    pub fn step_back(&mut self) -> Option<&UndoableEdit> {
        if !self.can_undo() {
            return None;
        }
        self.current_index -= 1;
        self.edits.get(self.current_index)
    }

    /// Step forward over the next undone edit, returning it for replay
    pub fn step_forward(&mut self) -> Option<&UndoableEdit> {
        if !self.can_redo() {
            return None;
        }
        self.current_index += 1;
        self.edits.get(self.current_index - 1)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.current_index < self.edits.len()
    }

    /// Label of the edit `undo` would revert
    pub fn undo_label(&self) -> Option<&str> {
        self.current_index
            .checked_sub(1)
            .and_then(|i| self.edits.get(i))
            .map(|edit| edit.label.as_str())
    }

    /// Label of the edit `redo` would reapply
    pub fn redo_label(&self) -> Option<&str> {
        self.edits.get(self.current_index).map(|edit| edit.label.as_str())
    }

    /// Clear all undo history
    pub fn clear(&mut self) {
        self.edits.clear();
        self.current_index = 0;
    }

    /// Get the number of available undo steps
    pub fn undo_count(&self) -> usize {
        self.current_index
    }

    /// Get the number of available redo steps
    pub fn redo_count(&self) -> usize {
        self.edits.len() - self.current_index
    }
}
