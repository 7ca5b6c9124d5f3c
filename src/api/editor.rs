//! `LeadSheetEditor`: the JavaScript-facing leadsheet
//!
//! Wraps one `ChordLeadSheet`. Items are addressed by their numeric id and
//! positions by `(bar, numer, denom)`. Calls that would break the edit
//! protocol (mutating with no open edit, nesting edits, undo during an
//! edit, stale ids) are rejected with an error here instead of panicking
//! inside the module.

use crate::api::helpers::{
    deserialize, edit_error, serialize, validate_kind, validate_position,
    validate_time_signature, validation_error,
};
use crate::api::listener::{JsListener, ListenerHandle};
use crate::leadsheet::{ChordLeadSheet, EditError, LeadSheetConfig, TruncationApproval};
use crate::models::{BarAnnotation, ChordSymbol, ItemData, ItemId, ItemKind};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct LeadSheetEditor {
    sheet: ChordLeadSheet,
}

#[wasm_bindgen]
impl LeadSheetEditor {
    #[wasm_bindgen(constructor)]
    pub fn new(section_name: &str, size_in_bars: u32) -> LeadSheetEditor {
        wasm_info!("LeadSheetEditor created: section='{}', bars={}", section_name, size_in_bars);
        LeadSheetEditor {
            sheet: ChordLeadSheet::new(section_name, size_in_bars),
        }
    }

    /// Create an editor from a config object; missing fields take defaults
    #[wasm_bindgen(js_name = fromConfig)]
    pub fn from_config(config_js: JsValue) -> Result<LeadSheetEditor, JsValue> {
        let config: LeadSheetConfig = deserialize(config_js, "Config deserialization error")?;
        let sheet = ChordLeadSheet::with_config(config).map_err(edit_error)?;
        Ok(LeadSheetEditor { sheet })
    }

    /// Create an editor from a JSON config string
    #[wasm_bindgen(js_name = fromConfigJson)]
    pub fn from_config_json(json: &str) -> Result<LeadSheetEditor, JsValue> {
        let config = LeadSheetConfig::from_json(json).map_err(edit_error)?;
        let sheet = ChordLeadSheet::with_config(config).map_err(edit_error)?;
        Ok(LeadSheetEditor { sheet })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[wasm_bindgen(getter, js_name = sizeInBars)]
    pub fn size_in_bars(&self) -> u32 {
        self.sheet.size_in_bars()
    }

    #[wasm_bindgen(getter, js_name = itemCount)]
    pub fn item_count(&self) -> usize {
        self.sheet.item_count()
    }

    /// Size and every item in position order
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        serialize(&self.sheet.snapshot(), "Snapshot serialization error")
    }

    /// The item with this id, or `null` once it has been removed
    pub fn item(&self, id: u32) -> Result<JsValue, JsValue> {
        match self.sheet.item(ItemId::from_raw(id)) {
            Some(item) => serialize(item, "Item serialization error"),
            None => Ok(JsValue::NULL),
        }
    }

    /// Items on bars `fromBar..=toBar`, optionally of one kind (0-2)
    pub fn items(&self, from_bar: u32, to_bar: u32, kind: Option<u8>) -> Result<JsValue, JsValue> {
        let kind = validate_kind(kind).map_err(validation_error)?;
        let items: Vec<_> = self.sheet.items(from_bar, to_bar, kind).collect();
        serialize(&items, "Items serialization error")
    }

    #[wasm_bindgen(js_name = sectionAt)]
    pub fn section_at(&self, bar: u32) -> Result<JsValue, JsValue> {
        match self.sheet.section_at(bar) {
            Some(section) => serialize(section, "Section serialization error"),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = sectionNamed)]
    pub fn section_named(&self, name: &str) -> Result<JsValue, JsValue> {
        match self.sheet.section_named(name) {
            Some(section) => serialize(section, "Section serialization error"),
            None => Ok(JsValue::NULL),
        }
    }

    /// Time signature governing `bar` as `"N/D"`
    #[wasm_bindgen(js_name = timeSignatureAt)]
    pub fn time_signature_at(&self, bar: u32) -> Option<String> {
        self.sheet.time_signature_at(bar).map(|ts| ts.to_string())
    }

    /// Ids of the items a shrink to `newSize` bars would delete
    #[wasm_bindgen(js_name = itemsLostByResize)]
    pub fn items_lost_by_resize(&self, new_size: u32) -> Vec<u32> {
        self.sheet
            .items_lost_by_resize(new_size)
            .iter()
            .map(|item| item.id().as_u32())
            .collect()
    }

    // ========================================================================
    // Edit transactions
    // ========================================================================

    #[wasm_bindgen(getter, js_name = isEditOpen)]
    pub fn is_edit_open(&self) -> bool {
        self.sheet.edit_label().is_some()
    }

    #[wasm_bindgen(js_name = startEdit)]
    pub fn start_edit(&mut self, label: &str) -> Result<(), JsValue> {
        if let Some(open) = self.sheet.edit_label() {
            return Err(validation_error(format!(
                "Cannot start edit '{}': edit '{}' is still open",
                label, open
            )));
        }
        self.sheet.start_edit(label);
        Ok(())
    }

    #[wasm_bindgen(js_name = endEdit)]
    pub fn end_edit(&mut self) -> Result<(), JsValue> {
        self.require_edit("endEdit")?;
        self.sheet.end_edit().map_err(edit_error)
    }

    /// Roll back and close the open edit, returning the reason to report
    #[wasm_bindgen(js_name = abortEdit)]
    pub fn abort_edit(&mut self, reason: &str) -> Result<String, JsValue> {
        self.require_edit("abortEdit")?;
        Ok(self.sheet.abort_edit(reason))
    }

    // ========================================================================
    // Mutations (inside an open edit)
    // ========================================================================

    /// Add a chord symbol parsed from `name`, returning its id
    #[wasm_bindgen(js_name = addChord)]
    pub fn add_chord(
        &mut self,
        bar: u32,
        numer: i32,
        denom: i32,
        name: &str,
    ) -> Result<u32, JsValue> {
        self.require_edit("addChord")?;
        let position = validate_position(bar, numer, denom).map_err(validation_error)?;
        let item = self.sheet.create_chord(position, name).map_err(edit_error)?;
        let id = self.sheet.add_item(item).map_err(edit_error)?;
        Ok(id.as_u32())
    }

    /// Add a bar annotation, returning its id
    #[wasm_bindgen(js_name = addAnnotation)]
    pub fn add_annotation(
        &mut self,
        bar: u32,
        numer: i32,
        denom: i32,
        text: &str,
    ) -> Result<u32, JsValue> {
        self.require_edit("addAnnotation")?;
        let position = validate_position(bar, numer, denom).map_err(validation_error)?;
        let item = self.sheet.create_annotation(position, text);
        let id = self.sheet.add_item(item).map_err(edit_error)?;
        Ok(id.as_u32())
    }

    /// Add a section starting on `bar`, returning its id
    #[wasm_bindgen(js_name = addSection)]
    pub fn add_section(
        &mut self,
        name: &str,
        bar: u32,
        time_signature: &str,
    ) -> Result<u32, JsValue> {
        self.require_edit("addSection")?;
        let ts = validate_time_signature(time_signature).map_err(validation_error)?;
        let item = self.sheet.create_section(name, bar, ts).map_err(edit_error)?;
        let id = self.sheet.add_section(item).map_err(edit_error)?;
        Ok(id.as_u32())
    }

    #[wasm_bindgen(js_name = removeItem)]
    pub fn remove_item(&mut self, id: u32) -> Result<(), JsValue> {
        self.require_edit("removeItem")?;
        let id = self.resolve(id)?;
        self.sheet.remove_item(id).map_err(edit_error)
    }

    #[wasm_bindgen(js_name = moveItem)]
    pub fn move_item(&mut self, id: u32, bar: u32, numer: i32, denom: i32) -> Result<(), JsValue> {
        self.require_edit("moveItem")?;
        let id = self.resolve(id)?;
        let position = validate_position(bar, numer, denom).map_err(validation_error)?;
        self.sheet.move_item(id, position).map_err(edit_error)
    }

    /// Replace a chord symbol's chord, keeping its rendering; `false` if unchanged
    #[wasm_bindgen(js_name = changeChord)]
    pub fn change_chord(&mut self, id: u32, name: &str) -> Result<bool, JsValue> {
        self.require_edit("changeChord")?;
        let id = self.resolve(id)?;
        let parsed = ChordSymbol::parse(name).map_err(validation_error)?;
        let current = self
            .sheet
            .item(id)
            .and_then(|item| item.as_chord_symbol())
            .ok_or_else(|| validation_error(format!("Item {} is not a chord symbol", id)))?;
        let chord = ChordSymbol {
            chord: parsed.chord,
            ..current.clone()
        };
        self.sheet
            .change_item(id, ItemData::ChordSymbol(chord))
            .map_err(edit_error)
    }

    /// Transpose every chord symbol on bars `fromBar..=toBar`, returning how many changed
    #[wasm_bindgen(js_name = transposeChords)]
    pub fn transpose_chords(
        &mut self,
        from_bar: u32,
        to_bar: u32,
        semitones: i32,
    ) -> Result<u32, JsValue> {
        self.require_edit("transposeChords")?;
        let changes: Vec<(ItemId, ChordSymbol)> = self
            .sheet
            .items(from_bar, to_bar, Some(ItemKind::ChordSymbol))
            .filter_map(|item| Some((item.id(), item.as_chord_symbol()?.transposed(semitones))))
            .collect();

        let mut changed = 0;
        for (id, chord) in changes {
            if self
                .sheet
                .change_item(id, ItemData::ChordSymbol(chord))
                .map_err(edit_error)?
            {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Replace an annotation's text; `false` if unchanged
    #[wasm_bindgen(js_name = changeAnnotation)]
    pub fn change_annotation(&mut self, id: u32, text: &str) -> Result<bool, JsValue> {
        self.require_edit("changeAnnotation")?;
        let id = self.resolve(id)?;
        self.sheet
            .change_item(id, ItemData::BarAnnotation(BarAnnotation::new(text)))
            .map_err(edit_error)
    }

    #[wasm_bindgen(js_name = setSectionName)]
    pub fn set_section_name(&mut self, id: u32, name: &str) -> Result<bool, JsValue> {
        self.require_edit("setSectionName")?;
        let id = self.resolve(id)?;
        self.sheet.set_section_name(id, name).map_err(edit_error)
    }

    #[wasm_bindgen(js_name = setSectionTimeSignature)]
    pub fn set_section_time_signature(
        &mut self,
        id: u32,
        time_signature: &str,
    ) -> Result<bool, JsValue> {
        self.require_edit("setSectionTimeSignature")?;
        let id = self.resolve(id)?;
        let ts = validate_time_signature(time_signature).map_err(validation_error)?;
        self.sheet
            .set_section_time_signature(id, ts)
            .map_err(edit_error)
    }

    #[wasm_bindgen(js_name = insertBars)]
    pub fn insert_bars(&mut self, at_bar: u32, count: u32) -> Result<(), JsValue> {
        self.require_edit("insertBars")?;
        self.sheet.insert_bars(at_bar, count).map_err(edit_error)
    }

    #[wasm_bindgen(js_name = deleteBars)]
    pub fn delete_bars(&mut self, from_bar: u32, to_bar: u32) -> Result<(), JsValue> {
        self.require_edit("deleteBars")?;
        self.sheet.delete_bars(from_bar, to_bar).map_err(edit_error)
    }

    /// Change the bar count
    ///
    /// When shrinking, only the items listed in `approvedIds` may be deleted,
    /// unless `approveAll` is set.
    #[wasm_bindgen(js_name = setSizeInBars)]
    pub fn set_size_in_bars(
        &mut self,
        new_size: u32,
        approved_ids: Vec<u32>,
        approve_all: bool,
    ) -> Result<(), JsValue> {
        self.require_edit("setSizeInBars")?;
        let approval = if approve_all {
            TruncationApproval::All
        } else {
            TruncationApproval::Items(approved_ids.into_iter().map(ItemId::from_raw).collect())
        };
        self.sheet
            .set_size_in_bars(new_size, &approval)
            .map_err(edit_error)
    }

    // ========================================================================
    // Undo/redo
    // ========================================================================

    #[wasm_bindgen(getter, js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.sheet.can_undo()
    }

    #[wasm_bindgen(getter, js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.sheet.can_redo()
    }

    #[wasm_bindgen(getter, js_name = undoLabel)]
    pub fn undo_label(&self) -> Option<String> {
        self.sheet.undo_label().map(str::to_string)
    }

    #[wasm_bindgen(getter, js_name = redoLabel)]
    pub fn redo_label(&self) -> Option<String> {
        self.sheet.redo_label().map(str::to_string)
    }

    pub fn undo(&mut self) -> Result<(), JsValue> {
        self.require_idle("undo")?;
        self.sheet.undo().map_err(edit_error)
    }

    pub fn redo(&mut self) -> Result<(), JsValue> {
        self.require_idle("redo")?;
        self.sheet.redo().map_err(edit_error)
    }

    #[wasm_bindgen(js_name = clearUndoHistory)]
    pub fn clear_undo_history(&mut self) {
        self.sheet.clear_undo_history();
    }

    // ========================================================================
    // Notification
    // ========================================================================

    /// Call `callback(event)` for every change until the handle is released
    pub fn subscribe(&self, callback: js_sys::Function) -> ListenerHandle {
        let listener = Rc::new(JsListener::new(callback));
        let subscription = self.sheet.subscribe(&listener);
        wasm_log!("Listener {} subscribed", subscription.id());
        ListenerHandle::new(listener, subscription)
    }

    #[wasm_bindgen(getter, js_name = listenerCount)]
    pub fn listener_count(&self) -> usize {
        self.sheet.listener_count()
    }
}

impl LeadSheetEditor {
    /// The wrapped leadsheet
    pub fn sheet(&self) -> &ChordLeadSheet {
        &self.sheet
    }

    fn require_edit(&self, operation: &str) -> Result<(), JsValue> {
        if self.sheet.edit_label().is_none() {
            return Err(validation_error(format!(
                "{} called with no open edit; call startEdit first",
                operation
            )));
        }
        Ok(())
    }

    fn require_idle(&self, operation: &str) -> Result<(), JsValue> {
        match self.sheet.edit_label() {
            Some(label) => Err(edit_error(EditError::UnsupportedEdit(format!(
                "{} is not allowed while edit '{}' is open",
                operation, label
            )))),
            None => Ok(()),
        }
    }

    fn resolve(&self, id: u32) -> Result<ItemId, JsValue> {
        let id = ItemId::from_raw(id);
        if self.sheet.contains(id) {
            Ok(id)
        } else {
            Err(validation_error(format!("Unknown item {}", id)))
        }
    }
}
