//! Item storage for a leadsheet
//!
//! Items are owned by an identity index and mirrored by two ordered indexes:
//! one by (position, kind, id) for range scans, one by bar for sections so the
//! section governing a bar is a single reverse range lookup. Every write goes
//! through the methods below, which keep the three indexes in step.
//!
//! The store itself only rejects writes that would corrupt its indexes.
//! Document invariants are checked by `validate`, which the leadsheet runs on
//! a scratch copy before structural edits and after every mutation.

use crate::models::{Item, ItemData, ItemId, ItemKind, Position, SheetId, TimeSignature};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

type OrderKey = (Position, ItemKind, ItemId);

fn order_key(item: &Item) -> OrderKey {
    (item.position(), item.kind(), item.id())
}

#[derive(Debug, Clone)]
pub struct ItemStore {
    sheet: SheetId,
    items: HashMap<ItemId, Item>,
    order: BTreeSet<OrderKey>,
    sections: BTreeMap<u32, ItemId>,
    size_in_bars: u32,
}

impl ItemStore {
    pub fn new(sheet: SheetId, size_in_bars: u32) -> Self {
        Self {
            sheet,
            items: HashMap::new(),
            order: BTreeSet::new(),
            sections: BTreeMap::new(),
            size_in_bars,
        }
    }

    pub fn sheet(&self) -> SheetId {
        self.sheet
    }

    pub fn size_in_bars(&self) -> u32 {
        self.size_in_bars
    }

    pub fn set_size_in_bars(&mut self, size: u32) {
        self.size_in_bars = size;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// Insert an item, taking ownership of it
    pub fn insert(&mut self, mut item: Item) -> Result<(), String> {
        if self.items.contains_key(&item.id()) {
            return Err(format!("item {} is already stored", item.id()));
        }
        if item.is_section() {
            if let Some(other) = self.sections.get(&item.bar()) {
                return Err(format!("bar {} already holds section {}", item.bar(), other));
            }
            self.sections.insert(item.bar(), item.id());
        }
        item.set_owner(Some(self.sheet));
        self.order.insert(order_key(&item));
        self.items.insert(item.id(), item);
        Ok(())
    }

    /// Remove an item, returning it detached
    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        let mut item = self.items.remove(&id)?;
        self.order.remove(&order_key(&item));
        if item.is_section() {
            self.sections.remove(&item.bar());
        }
        item.set_owner(None);
        Some(item)
    }

    /// Move an item, returning its previous position
    pub fn move_item(&mut self, id: ItemId, position: Position) -> Result<Position, String> {
        let item = self
            .items
            .get(&id)
            .ok_or_else(|| format!("item {} is not stored", id))?;
        let old_position = item.position();
        let old_key = order_key(item);

        if item.is_section() && position.bar != old_position.bar {
            if let Some(other) = self.sections.get(&position.bar) {
                return Err(format!("bar {} already holds section {}", position.bar, other));
            }
            self.sections.remove(&old_position.bar);
            self.sections.insert(position.bar, id);
        }

        self.order.remove(&old_key);
        if let Some(item) = self.items.get_mut(&id) {
            item.set_position(position);
            self.order.insert(order_key(item));
        }
        Ok(old_position)
    }

    /// Swap an item's payload, returning the previous one
    pub fn replace_data(&mut self, id: ItemId, data: ItemData) -> Result<ItemData, String> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| format!("item {} is not stored", id))?;
        if item.kind() != data.kind() {
            return Err(format!(
                "cannot change {} {} into a {}",
                item.kind().name(),
                id,
                data.kind().name()
            ));
        }
        let old = item.data().clone();
        item.set_data(data);
        Ok(old)
    }

    /// All items in position order
    pub fn iter(&self) -> impl Iterator<Item = &Item> + Clone + '_ {
        self.order.iter().filter_map(move |key| self.items.get(&key.2))
    }

    /// Items with `from_bar <= bar <= to_bar`, in position order
    pub fn range(&self, from_bar: u32, to_bar: u32) -> impl Iterator<Item = &Item> + Clone + '_ {
        let start = (Position::bar_start(from_bar), ItemKind::Section, ItemId::MIN);
        self.order
            .range(start..)
            .take_while(move |key| key.0.bar <= to_bar)
            .filter_map(move |key| self.items.get(&key.2))
    }

    /// Id of the item of `kind` sitting exactly at `position`
    pub fn occupant(&self, position: Position, kind: ItemKind) -> Option<ItemId> {
        self.order
            .range((position, kind, ItemId::MIN)..=(position, kind, ItemId::MAX))
            .next()
            .map(|key| key.2)
    }

    /// Last section at or before `bar`
    pub fn section_governing(&self, bar: u32) -> Option<&Item> {
        self.sections
            .range(..=bar)
            .next_back()
            .and_then(|(_, id)| self.items.get(id))
    }

    /// Section starting exactly on `bar`
    pub fn section_on_bar(&self, bar: u32) -> Option<&Item> {
        self.sections.get(&bar).and_then(|id| self.items.get(id))
    }

    /// First section strictly after `bar`
    pub fn next_section_after(&self, bar: u32) -> Option<&Item> {
        self.sections
            .range(bar.saturating_add(1)..)
            .next()
            .and_then(|(_, id)| self.items.get(id))
            .filter(|item| item.bar() > bar)
    }

    pub fn section_by_name(&self, name: &str) -> Option<&Item> {
        self.sections().find(|item| item.as_section().is_some_and(|s| s.name == name))
    }

    /// Sections in bar order
    pub fn sections(&self) -> impl Iterator<Item = &Item> + Clone + '_ {
        self.sections.values().filter_map(move |id| self.items.get(id))
    }

    pub fn time_signature_at(&self, bar: u32) -> Option<TimeSignature> {
        self.section_governing(bar)
            .and_then(|item| item.as_section())
            .map(|section| section.time_signature)
    }

    /// Check every document invariant, describing the first violation found
    pub fn validate(&self) -> Result<(), String> {
        if self.size_in_bars == 0 {
            return Err("leadsheet has no bars".to_string());
        }

        // Index consistency
        if self.order.len() != self.items.len() {
            return Err(format!(
                "position index holds {} entries for {} items",
                self.order.len(),
                self.items.len()
            ));
        }
        for key in &self.order {
            match self.items.get(&key.2) {
                Some(item) if order_key(item) == *key => {}
                _ => return Err(format!("stale position index entry for {}", key.2)),
            }
        }
        let section_count = self.items.values().filter(|item| item.is_section()).count();
        if section_count != self.sections.len() {
            return Err("section index out of step with items".to_string());
        }

        // Initial section
        match self.section_on_bar(0) {
            Some(initial) if initial.position().is_bar_start() => {}
            Some(initial) => return Err(format!("initial section is at {}", initial.position())),
            None => return Err("bar 0 has no section".to_string()),
        }

        // Unique section names
        let mut names = HashSet::new();
        for section in self.sections() {
            if let Some(data) = section.as_section() {
                if data.name.is_empty() {
                    return Err(format!("section at bar {} has an empty name", section.bar()));
                }
                if !names.insert(data.name.as_str()) {
                    return Err(format!("section name '{}' is used twice", data.name));
                }
            }
        }

        // Per-item position rules
        let mut previous: Option<(Position, ItemKind)> = None;
        for item in self.iter() {
            let position = item.position();
            if position.bar >= self.size_in_bars {
                return Err(format!(
                    "{} is beyond the last bar ({} bars)",
                    item, self.size_in_bars
                ));
            }
            if previous == Some((position, item.kind())) {
                return Err(format!("two {} items at {}", item.kind().name(), position));
            }
            previous = Some((position, item.kind()));

            match item.data() {
                ItemData::Section(_) => {
                    if !position.is_bar_start() {
                        return Err(format!("section {} is not on a downbeat", item));
                    }
                }
                ItemData::ChordSymbol(_) | ItemData::BarAnnotation(_) => {
                    let ts = self
                        .time_signature_at(position.bar)
                        .ok_or_else(|| format!("no section governs bar {}", position.bar))?;
                    if !ts.contains_beat(position.beat) {
                        return Err(format!("{} does not fit in a {} bar", item, ts));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BarAnnotation, ChordSymbol, Section};

    fn section(name: &str, bar: u32) -> Item {
        Item::new(
            Position::bar_start(bar),
            ItemData::Section(Section::new(name, TimeSignature::FOUR_FOUR)),
        )
    }

    fn chord(name: &str, position: Position) -> Item {
        Item::new(position, ItemData::ChordSymbol(ChordSymbol::parse(name).unwrap()))
    }

    fn create_test_store() -> ItemStore {
        let mut store = ItemStore::new(SheetId::allocate(), 8);
        store.insert(section("A", 0)).unwrap();
        store
    }

    #[test]
    fn test_insert_sets_owner() {
        let mut store = create_test_store();
        let c = chord("C", Position::on_beat(1, 0));
        let id = c.id();
        store.insert(c).unwrap();
        assert_eq!(store.get(id).unwrap().owner(), Some(store.sheet()));

        let removed = store.remove(id).unwrap();
        assert_eq!(removed.owner(), None);
        assert!(!store.contains(id));
    }

    #[test]
    fn test_range_is_positional() {
        let mut store = create_test_store();
        store.insert(chord("G7", Position::on_beat(3, 2))).unwrap();
        store.insert(chord("C", Position::on_beat(1, 0))).unwrap();
        store.insert(section("B", 2)).unwrap();
        store
            .insert(Item::new(
                Position::bar_start(2),
                ItemData::BarAnnotation(BarAnnotation::new("fine")),
            ))
            .unwrap();

        let kinds: Vec<_> = store.range(1, 3).map(|i| (i.bar(), i.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (1, ItemKind::ChordSymbol),
                (2, ItemKind::Section),
                (2, ItemKind::BarAnnotation),
                (3, ItemKind::ChordSymbol),
            ]
        );

        // Restartable
        let range = store.range(2, 2);
        assert_eq!(range.clone().count(), 2);
        assert_eq!(range.count(), 2);
    }

    #[test]
    fn test_section_lookup() {
        let mut store = create_test_store();
        store.insert(section("B", 4)).unwrap();

        assert_eq!(store.section_governing(3).unwrap().as_section().unwrap().name, "A");
        assert_eq!(store.section_governing(4).unwrap().as_section().unwrap().name, "B");
        assert_eq!(store.section_governing(7).unwrap().as_section().unwrap().name, "B");
        assert_eq!(store.next_section_after(0).unwrap().bar(), 4);
        assert!(store.next_section_after(4).is_none());
        assert_eq!(store.section_by_name("B").unwrap().bar(), 4);
    }

    #[test]
    fn test_insert_rejects_second_section_on_bar() {
        let mut store = create_test_store();
        assert!(store.insert(section("B", 0)).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_move_section_updates_index() {
        let mut store = create_test_store();
        let b = section("B", 2);
        let id = b.id();
        store.insert(b).unwrap();

        let old = store.move_item(id, Position::bar_start(5)).unwrap();
        assert_eq!(old, Position::bar_start(2));
        assert!(store.section_on_bar(2).is_none());
        assert_eq!(store.section_on_bar(5).unwrap().id(), id);
        assert!(store.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_violations() {
        let mut store = create_test_store();
        assert!(store.validate().is_ok());

        let late = chord("C", Position::on_beat(8, 0));
        store.insert(late).unwrap();
        assert!(store.validate().unwrap_err().contains("beyond the last bar"));

        let mut store = create_test_store();
        store.insert(chord("C", Position::on_beat(1, 4))).unwrap();
        assert!(store.validate().unwrap_err().contains("does not fit"));

        let mut store = create_test_store();
        store.insert(chord("C", Position::on_beat(1, 0))).unwrap();
        store.insert(chord("D", Position::on_beat(1, 0))).unwrap();
        assert!(store.validate().unwrap_err().contains("two chord symbol items"));

        let mut store = create_test_store();
        store.insert(section("A", 3)).unwrap();
        assert!(store.validate().unwrap_err().contains("used twice"));
    }

    #[test]
    fn test_validate_requires_initial_section() {
        let mut store = create_test_store();
        let initial = store.section_on_bar(0).unwrap().id();
        store.remove(initial);
        assert_eq!(store.validate().unwrap_err(), "bar 0 has no section");
    }

    #[test]
    fn test_replace_data_rejects_kind_change() {
        let mut store = create_test_store();
        let c = chord("C", Position::on_beat(1, 0));
        let id = c.id();
        store.insert(c).unwrap();
        let result = store.replace_data(id, ItemData::BarAnnotation(BarAnnotation::new("x")));
        assert!(result.is_err());
    }
}
