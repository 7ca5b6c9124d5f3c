//! Mutations and item factories of `ChordLeadSheet`
//!
//! Every public mutation follows the same two phases:
//!
//! 1. Validate against the current state and build a plan of primitive
//!    `Command`s. Structural plans are also dry-run on a scratch copy of the
//!    store and fully validated. Any failure here is returned as an
//!    `EditError` with nothing changed, nothing logged in the transaction and
//!    no event raised.
//! 2. Apply the plan command by command, recording each in the open
//!    transaction and dispatching its events. If anything goes wrong in this
//!    phase the whole transaction is rolled back.

use super::{ChordLeadSheet, EditError};
use crate::models::{
    BarAnnotation, ChordSymbol, Item, ItemData, ItemId, ItemKind, Position, Section, TimeSignature,
};
use crate::undo::{Command, EditState};
use std::collections::HashSet;

/// Which items a shrinking `set_size_in_bars` may delete
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TruncationApproval {
    /// Refuse to delete anything
    #[default]
    None,
    /// Only the listed items may be deleted
    Items(HashSet<ItemId>),
    /// Delete whatever falls off the end
    All,
}

impl TruncationApproval {
    pub fn approves(&self, id: ItemId) -> bool {
        match self {
            TruncationApproval::None => false,
            TruncationApproval::Items(ids) => ids.contains(&id),
            TruncationApproval::All => true,
        }
    }
}

fn rejected(err: EditError) -> EditError {
    log::warn!("Edit rejected: {}", err);
    err
}

impl ChordLeadSheet {
    // ========================================================================
    // Factories
    // ========================================================================

    /// Create a detached section starting on `bar`
    pub fn create_section(
        &self,
        name: &str,
        bar: u32,
        time_signature: TimeSignature,
    ) -> Result<Item, EditError> {
        check_section_name_text(name)?;
        Ok(Item::new(
            Position::bar_start(bar),
            ItemData::Section(Section::new(name.trim(), time_signature)),
        ))
    }

    /// Create a detached chord symbol
    pub fn create_chord_symbol(&self, position: Position, chord: ChordSymbol) -> Item {
        Item::new(position, ItemData::ChordSymbol(chord))
    }

    /// Create a detached chord symbol from its name, e.g. `"Am7/G"`
    pub fn create_chord(&self, position: Position, name: &str) -> Result<Item, EditError> {
        let chord = ChordSymbol::parse(name).map_err(EditError::InvariantViolation)?;
        Ok(self.create_chord_symbol(position, chord))
    }

    /// Create a detached bar annotation
    pub fn create_annotation(&self, position: Position, text: &str) -> Item {
        Item::new(position, ItemData::BarAnnotation(BarAnnotation::new(text)))
    }

    // ========================================================================
    // Item edits
    // ========================================================================

    /// Add an item; sections are routed to `add_section`
    pub fn add_item(&mut self, item: Item) -> Result<ItemId, EditError> {
        self.ensure_open()?;
        match item.kind() {
            ItemKind::Section => self.add_section(item),
            ItemKind::ChordSymbol | ItemKind::BarAnnotation => {
                self.check_addable(&item)?;
                self.check_position(item.position(), item.kind(), None)?;
                let id = item.id();
                self.apply(vec![Command::AddItem { item }])?;
                Ok(id)
            }
        }
    }

    /// Remove an item; sections are routed to `remove_section`
    ///
    /// # Panics
    /// If `id` is not in this leadsheet.
    pub fn remove_item(&mut self, id: ItemId) -> Result<(), EditError> {
        self.ensure_open()?;
        let item = self.expect_item(id).clone();
        match item.kind() {
            ItemKind::Section => self.remove_section(id),
            ItemKind::ChordSymbol | ItemKind::BarAnnotation => {
                self.apply(vec![Command::RemoveItem { item }])
            }
        }
    }

    /// Swap an item's payload, keeping its identity and position
    ///
    /// Returns `false` (and raises nothing) when the payload is unchanged.
    /// Section names are trimmed.
    ///
    /// # Panics
    /// If `id` is not in this leadsheet.
    pub fn change_item(&mut self, id: ItemId, data: ItemData) -> Result<bool, EditError> {
        self.ensure_open()?;
        let data = match data {
            ItemData::Section(section) => {
                check_section_name_text(&section.name)?;
                ItemData::Section(Section::new(section.name.trim(), section.time_signature))
            }
            other => other,
        };
        let item = self.expect_item(id);
        if item.kind() != data.kind() {
            return Err(rejected(EditError::InvariantViolation(format!(
                "cannot turn a {} into a {}",
                item.kind().name(),
                data.kind().name()
            ))));
        }
        if item.data() == &data {
            return Ok(false);
        }

        let plan = vec![Command::ChangeItem {
            id,
            old_data: item.data().clone(),
            new_data: data.clone(),
        }];

        match &data {
            ItemData::Section(section) => {
                self.check_section_name_free(&section.name, Some(id))?;
                self.dry_run(&plan)?;
            }
            ItemData::ChordSymbol(_) | ItemData::BarAnnotation(_) => {}
        }

        self.apply(plan)?;
        Ok(true)
    }

    /// Move an item, keeping its identity; sections are routed to `move_section`
    ///
    /// # Panics
    /// If `id` is not in this leadsheet.
    pub fn move_item(&mut self, id: ItemId, position: Position) -> Result<(), EditError> {
        self.ensure_open()?;
        let item = self.expect_item(id);
        let from = item.position();
        let kind = item.kind();
        if from == position {
            return Ok(());
        }
        match kind {
            ItemKind::Section => {
                if !position.is_bar_start() {
                    return Err(rejected(EditError::InvariantViolation(format!(
                        "a section must start on a downbeat, not {}",
                        position
                    ))));
                }
                self.move_section(id, position.bar)
            }
            ItemKind::ChordSymbol | ItemKind::BarAnnotation => {
                self.check_position(position, kind, Some(id))?;
                self.apply(vec![Command::MoveItem {
                    id,
                    from,
                    to: position,
                }])
            }
        }
    }

    // ========================================================================
    // Section edits
    // ========================================================================

    /// Add a section on a bar that has none, with a name not yet in use
    pub fn add_section(&mut self, item: Item) -> Result<ItemId, EditError> {
        self.ensure_open()?;
        let Some(section) = item.as_section() else {
            return Err(rejected(EditError::InvariantViolation(format!(
                "{} is not a section",
                item
            ))));
        };
        self.check_addable(&item)?;

        let position = item.position();
        if !position.is_bar_start() {
            return Err(rejected(EditError::InvariantViolation(format!(
                "a section must start on a downbeat, not {}",
                position
            ))));
        }
        self.check_bar(position.bar)?;
        check_section_name_text(&section.name)?;
        if section.name.trim() != section.name {
            return Err(rejected(EditError::InvariantViolation(format!(
                "section name '{}' has surrounding whitespace",
                section.name
            ))));
        }
        self.check_section_name_free(&section.name, None)?;
        if self.store.section_on_bar(position.bar).is_some() {
            return Err(rejected(EditError::SectionBarOccupied(position.bar)));
        }

        let id = item.id();
        let plan = vec![Command::AddItem { item }];
        self.dry_run(&plan)?;
        self.apply(plan)?;
        Ok(id)
    }

    /// Remove a section other than the initial one
    ///
    /// # Panics
    /// If `id` is not in this leadsheet.
    pub fn remove_section(&mut self, id: ItemId) -> Result<(), EditError> {
        self.ensure_open()?;
        let item = self.expect_section(id)?.clone();
        if item.bar() == 0 {
            return Err(rejected(EditError::CannotRemoveInitialSection));
        }
        let plan = vec![Command::RemoveItem { item }];
        self.dry_run(&plan)?;
        self.apply(plan)
    }

    /// Move a section to the start of another bar
    ///
    /// # Panics
    /// If `id` is not in this leadsheet.
    pub fn move_section(&mut self, id: ItemId, bar: u32) -> Result<(), EditError> {
        self.ensure_open()?;
        let from = self.expect_section(id)?.position();
        if from.bar == bar {
            return Ok(());
        }
        if from.bar == 0 {
            return Err(rejected(EditError::UnsupportedEdit(
                "the initial section cannot be moved".to_string(),
            )));
        }
        self.check_bar(bar)?;
        if self.store.section_on_bar(bar).is_some() {
            return Err(rejected(EditError::PositionOccupied {
                kind: ItemKind::Section,
                position: Position::bar_start(bar),
            }));
        }

        let plan = vec![Command::MoveItem {
            id,
            from,
            to: Position::bar_start(bar),
        }];
        self.dry_run(&plan)?;
        self.apply(plan)
    }

    /// Rename a section; returns `false` if the name is unchanged
    pub fn set_section_name(&mut self, id: ItemId, name: &str) -> Result<bool, EditError> {
        self.ensure_open()?;
        let section = self.section_payload(id)?;
        self.change_item(
            id,
            ItemData::Section(Section::new(name.trim(), section.time_signature)),
        )
    }

    /// Change a section's time signature; returns `false` if unchanged
    ///
    /// Fails with `UnsupportedEdit` if an item in the section's bars would no
    /// longer fit in a bar.
    pub fn set_section_time_signature(
        &mut self,
        id: ItemId,
        time_signature: TimeSignature,
    ) -> Result<bool, EditError> {
        self.ensure_open()?;
        let section = self.section_payload(id)?;
        self.change_item(id, ItemData::Section(Section::new(section.name, time_signature)))
    }

    // ========================================================================
    // Structural edits
    // ========================================================================

    /// Insert `count` empty bars before `at_bar`, shifting later items forward
    ///
    /// Inserting at bar 0 also shifts the initial section; a copy of it
    /// under a new name becomes the initial section.
    pub fn insert_bars(&mut self, at_bar: u32, count: u32) -> Result<(), EditError> {
        self.ensure_open()?;
        let size = self.size_in_bars();
        if at_bar > size {
            return Err(rejected(EditError::InvariantViolation(format!(
                "cannot insert bars at {} in a {} bar leadsheet",
                at_bar, size
            ))));
        }
        if count == 0 {
            return Ok(());
        }
        let new_size = size.checked_add(count).ok_or_else(|| {
            rejected(EditError::InvariantViolation("leadsheet too long".to_string()))
        })?;

        let mut plan = vec![Command::Resize {
            old_size: size,
            new_size,
        }];

        let initial = match at_bar {
            0 => self.store.section_on_bar(0),
            _ => None,
        };
        let shift = |item: &Item| Command::MoveItem {
            id: item.id(),
            from: item.position(),
            to: item.position().with_bar(item.bar() + count),
        };

        // Last item first so shifted sections never land on an occupied bar
        let shifted: Vec<&Item> = self
            .store
            .range(at_bar, u32::MAX)
            .filter(|item| Some(item.id()) != initial.map(Item::id))
            .collect();
        plan.extend(shifted.iter().rev().map(|item| shift(item)));

        // Bar 0 is never left without a section between two events
        if let Some(initial) = initial {
            if let Some(section) = initial.as_section() {
                let name = self.unique_section_name(&section.name);
                let copy = Section::new(name, section.time_signature);
                plan.push(Command::Compound {
                    commands: vec![
                        shift(initial),
                        Command::AddItem {
                            item: Item::new(Position::bar_start(0), ItemData::Section(copy)),
                        },
                    ],
                });
            }
        }

        self.apply(plan)
    }

    /// Delete bars `from_bar..=to_bar` and their items, shifting later items back
    ///
    /// Deleting bar 0 requires a section on `to_bar + 1`, which becomes the
    /// new initial section.
    pub fn delete_bars(&mut self, from_bar: u32, to_bar: u32) -> Result<(), EditError> {
        self.ensure_open()?;
        let size = self.size_in_bars();
        if from_bar > to_bar || to_bar >= size {
            return Err(rejected(EditError::InvariantViolation(format!(
                "invalid bar range {}..={} in a {} bar leadsheet",
                from_bar, to_bar, size
            ))));
        }
        let count = to_bar - from_bar + 1;
        if count >= size {
            return Err(rejected(EditError::UnsupportedEdit(
                "cannot delete every bar of the leadsheet".to_string(),
            )));
        }
        if from_bar == 0 && self.store.section_on_bar(to_bar + 1).is_none() {
            return Err(rejected(EditError::UnsupportedEdit(format!(
                "deleting bar 0 needs a section on bar {} to become the initial section",
                to_bar + 1
            ))));
        }

        let replacement = match from_bar {
            0 => self.store.section_on_bar(to_bar + 1),
            _ => None,
        };
        let is_swapped = |item: &Item| {
            (from_bar == 0 && item.is_section() && item.bar() == 0)
                || Some(item.id()) == replacement.map(Item::id)
        };
        let shift = |item: &Item| Command::MoveItem {
            id: item.id(),
            from: item.position(),
            to: item.position().with_bar(item.bar() - count),
        };

        let mut plan: Vec<Command> = self
            .store
            .range(from_bar, to_bar)
            .filter(|item| !is_swapped(item))
            .map(|item| Command::RemoveItem { item: item.clone() })
            .collect();

        // Bar 0 is never left without a section between two events
        if let (Some(initial), Some(replacement)) = (self.store.section_on_bar(0), replacement) {
            plan.push(Command::Compound {
                commands: vec![
                    Command::RemoveItem {
                        item: initial.clone(),
                    },
                    shift(replacement),
                ],
            });
        }

        // First item first so shifted sections never land on an occupied bar
        plan.extend(
            self.store
                .range(to_bar + 1, u32::MAX)
                .filter(|item| !is_swapped(item))
                .map(shift),
        );
        plan.push(Command::Resize {
            old_size: size,
            new_size: size - count,
        });

        self.dry_run(&plan)?;
        self.apply(plan)
    }

    /// Change the bar count
    ///
    /// Growing always succeeds. Shrinking deletes the items past the new end
    /// and fails with `UnsupportedEdit` if `approval` does not cover every one
    /// of them; `items_lost_by_resize` tells what would go.
    pub fn set_size_in_bars(
        &mut self,
        new_size: u32,
        approval: &TruncationApproval,
    ) -> Result<(), EditError> {
        self.ensure_open()?;
        let size = self.size_in_bars();
        if new_size == 0 {
            return Err(rejected(EditError::UnsupportedEdit(
                "a leadsheet needs at least one bar".to_string(),
            )));
        }
        if new_size == size {
            return Ok(());
        }

        let lost = self.items_lost_by_resize(new_size);
        let unapproved = lost.iter().filter(|item| !approval.approves(item.id())).count();
        if unapproved > 0 {
            return Err(rejected(EditError::UnsupportedEdit(format!(
                "shrinking to {} bars would delete {} item(s) not approved for deletion",
                new_size, unapproved
            ))));
        }

        let mut plan: Vec<Command> = lost
            .iter()
            .rev()
            .map(|item| Command::RemoveItem {
                item: (*item).clone(),
            })
            .collect();
        plan.push(Command::Resize {
            old_size: size,
            new_size,
        });

        if new_size < size {
            self.dry_run(&plan)?;
        }
        self.apply(plan)
    }

    // ========================================================================
    // Checks
    // ========================================================================

    /// Mutations need an open edit; a rolled back one refuses further changes
    ///
    /// # Panics
    /// If no edit is open.
    fn ensure_open(&self) -> Result<(), EditError> {
        match &self.edit {
            EditState::Open(_) => Ok(()),
            EditState::Poisoned { label, .. } => Err(EditError::TransactionAborted(label.clone())),
            EditState::Idle => panic!("leadsheet mutated without an open edit"),
        }
    }

    /// # Panics
    /// If `id` is not in this leadsheet.
    fn expect_item(&self, id: ItemId) -> &Item {
        match self.store.get(id) {
            Some(item) => item,
            None => panic!("stale item handle {}: not in this leadsheet", id),
        }
    }

    fn expect_section(&self, id: ItemId) -> Result<&Item, EditError> {
        let item = self.expect_item(id);
        if item.is_section() {
            Ok(item)
        } else {
            Err(rejected(EditError::InvariantViolation(format!(
                "{} is not a section",
                item
            ))))
        }
    }

    fn section_payload(&self, id: ItemId) -> Result<Section, EditError> {
        let item = self.expect_item(id);
        item.as_section().cloned().ok_or_else(|| {
            rejected(EditError::InvariantViolation(format!("{} is not a section", item)))
        })
    }

    fn check_addable(&self, item: &Item) -> Result<(), EditError> {
        if self.store.contains(item.id()) {
            return Err(rejected(EditError::InvariantViolation(format!(
                "{} is already in this leadsheet",
                item
            ))));
        }
        if let Some(owner) = item.owner() {
            if owner != self.id {
                return Err(rejected(EditError::InvariantViolation(format!(
                    "{} belongs to another leadsheet",
                    item
                ))));
            }
        }
        Ok(())
    }

    fn check_bar(&self, bar: u32) -> Result<(), EditError> {
        if bar >= self.size_in_bars() {
            return Err(rejected(EditError::InvariantViolation(format!(
                "bar {} is beyond the last bar ({} bars)",
                bar,
                self.size_in_bars()
            ))));
        }
        Ok(())
    }

    /// Position checks for chord symbols and annotations
    fn check_position(
        &self,
        position: Position,
        kind: ItemKind,
        moving: Option<ItemId>,
    ) -> Result<(), EditError> {
        self.check_bar(position.bar)?;
        if let Some(ts) = self.store.time_signature_at(position.bar) {
            if !ts.contains_beat(position.beat) {
                return Err(rejected(EditError::InvariantViolation(format!(
                    "{} does not fit in a {} bar",
                    position, ts
                ))));
            }
        }
        match self.store.occupant(position, kind) {
            Some(other) if Some(other) != moving => {
                Err(rejected(EditError::PositionOccupied { kind, position }))
            }
            _ => Ok(()),
        }
    }

    fn check_section_name_free(
        &self,
        name: &str,
        renaming: Option<ItemId>,
    ) -> Result<(), EditError> {
        match self.store.section_by_name(name) {
            Some(other) if Some(other.id()) != renaming => {
                Err(rejected(EditError::NameConflict(name.to_string())))
            }
            _ => Ok(()),
        }
    }

    /// Name derived from `base` that no section uses yet
    fn unique_section_name(&self, base: &str) -> String {
        (2u32..)
            .map(|n| format!("{}{}", base, n))
            .find(|name| self.store.section_by_name(name).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Apply a plan to a scratch copy and validate the result
    fn dry_run(&self, plan: &[Command]) -> Result<(), EditError> {
        let mut scratch = self.store.clone();
        for command in plan {
            command
                .execute(&mut scratch)
                .map_err(|reason| rejected(EditError::UnsupportedEdit(reason)))?;
        }
        scratch
            .validate()
            .map_err(|reason| rejected(EditError::UnsupportedEdit(reason)))
    }

    // ========================================================================
    // Application
    // ========================================================================

    /// Apply a validated plan inside the open edit, announcing each step
    fn apply(&mut self, plan: Vec<Command>) -> Result<(), EditError> {
        for command in plan {
            match command.execute(&mut self.store) {
                Ok(events) => {
                    log::debug!("Applied {:?}", command);
                    self.edit.record(command);
                    for event in &events {
                        self.bus.dispatch(self, event);
                    }
                }
                Err(reason) => return Err(self.poison(reason)),
            }
        }

        if self.config.verify_after_mutation {
            if let Err(reason) = self.store.validate() {
                return Err(self.poison(reason));
            }
        }
        Ok(())
    }

    /// Roll back the open edit after a failure found mid-mutation
    fn poison(&mut self, reason: String) -> EditError {
        log::error!("Leadsheet inconsistency, rolling back: {}", reason);
        if let EditState::Open(tx) = self.edit.take() {
            let label = tx.label().to_string();
            self.rollback(tx.rollback_commands());
            self.edit = EditState::Poisoned {
                label,
                reason: reason.clone(),
            };
        }
        EditError::InternalInconsistency(reason)
    }
}

fn check_section_name_text(name: &str) -> Result<(), EditError> {
    if name.trim().is_empty() {
        return Err(rejected(EditError::InvariantViolation(
            "a section needs a name".to_string(),
        )));
    }
    Ok(())
}
