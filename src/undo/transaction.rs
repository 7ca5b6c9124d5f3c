//! Edit transaction state machine
//!
//! `Idle -> Open -> (commit | abort) -> Idle`. A transaction that was rolled
//! back internally after an inconsistency sits in `Poisoned` until the caller
//! closes it with either `end_edit` or `abort_edit`.

use super::{Command, UndoableEdit};

/// An open transaction and the commands it has applied so far
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    label: String,
    log: Vec<Command>,
}

impl Transaction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            log: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn record(&mut self, command: Command) {
        self.log.push(command);
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Commands needed to roll back, newest first
    pub fn rollback_commands(&self) -> Vec<Command> {
        self.log.iter().rev().map(Command::inverse).collect()
    }

    pub fn into_undoable(self) -> UndoableEdit {
        UndoableEdit {
            label: self.label,
            commands: self.log,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Open(Transaction),
    /// Rolled back internally; `reason` is reported when the caller closes it
    Poisoned { label: String, reason: String },
}

impl EditState {
    pub fn is_idle(&self) -> bool {
        matches!(self, EditState::Idle)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, EditState::Open(_))
    }

    /// Label of the open or poisoned transaction
    pub fn label(&self) -> Option<&str> {
        match self {
            EditState::Idle => None,
            EditState::Open(tx) => Some(tx.label()),
            EditState::Poisoned { label, .. } => Some(label),
        }
    }

    /// Idle -> Open
    ///
    /// # Panics
    /// If a transaction is already open; transactions do not nest.
    pub fn begin(&mut self, label: &str) {
        if let Some(current) = self.label() {
            panic!(
                "start_edit('{}') called while edit '{}' is still open",
                label, current
            );
        }
        *self = EditState::Open(Transaction::new(label));
    }

    /// Append a command to the open transaction's log
    ///
    /// # Panics
    /// If no transaction is open.
    pub fn record(&mut self, command: Command) {
        match self {
            EditState::Open(tx) => tx.record(command),
            _ => panic!("leadsheet mutated without an open edit"),
        }
    }

    /// Move to Idle, returning whatever was there
    pub fn take(&mut self) -> EditState {
        std::mem::take(self)
    }
}
