// Invariant, atomicity and undo properties over generated edit sequences
#![cfg(not(target_arch = "wasm32"))]

use leadsheet_wasm::{
    ChangeEvent, ChordLeadSheet, EditError, Item, ItemId, LeadSheetListener, LeadSheetSnapshot,
    ListenerError, Position, TimeSignature, TruncationApproval,
};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Recorder {
    events: RefCell<Vec<ChangeEvent>>,
}

impl LeadSheetListener for Recorder {
    fn on_change(
        &self,
        _sheet: &ChordLeadSheet,
        event: &ChangeEvent,
    ) -> Result<(), ListenerError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}

const CHORDS: [&str; 6] = ["C", "Dm7", "G7", "F#m7b5", "Bb6/9", "E7/G#"];
const SIGNATURES: [TimeSignature; 3] = [
    TimeSignature::FOUR_FOUR,
    TimeSignature::THREE_FOUR,
    TimeSignature::SIX_EIGHT,
];

/// One edit, with bars and items picked by seeds resolved against the current sheet
#[derive(Debug, Clone)]
enum Mutation {
    AddChord { bar: u32, half_beats: i32, chord: usize },
    AddAnnotation { bar: u32 },
    AddSection { bar: u32, signature: usize },
    Remove { pick: usize },
    Move { pick: usize, bar: u32, beat: i32 },
    InsertBars { at: u32, count: u32 },
    DeleteBars { from: u32, len: u32 },
    Resize { size: u32 },
    SetTimeSignature { pick: usize, signature: usize },
}

fn arb_mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        2 => (0u32..64, 0i32..8, 0..CHORDS.len())
            .prop_map(|(bar, half_beats, chord)| Mutation::AddChord { bar, half_beats, chord }),
        1 => (0u32..64).prop_map(|bar| Mutation::AddAnnotation { bar }),
        1 => (0u32..64, 0..SIGNATURES.len())
            .prop_map(|(bar, signature)| Mutation::AddSection { bar, signature }),
        1 => any::<usize>().prop_map(|pick| Mutation::Remove { pick }),
        1 => (any::<usize>(), 0u32..64, 0i32..4)
            .prop_map(|(pick, bar, beat)| Mutation::Move { pick, bar, beat }),
        1 => (0u32..64, 1u32..4).prop_map(|(at, count)| Mutation::InsertBars { at, count }),
        1 => (0u32..64, 0u32..64).prop_map(|(from, len)| Mutation::DeleteBars { from, len }),
        1 => (0u32..64).prop_map(|size| Mutation::Resize { size }),
        1 => (any::<usize>(), 0..SIGNATURES.len())
            .prop_map(|(pick, signature)| Mutation::SetTimeSignature { pick, signature }),
    ]
}

/// Edits grouped into transactions, each either committed or aborted
fn arb_rounds(max_rounds: usize) -> impl Strategy<Value = Vec<(Vec<Mutation>, bool)>> {
    prop::collection::vec(
        (prop::collection::vec(arb_mutation(), 1..6), any::<bool>()),
        1..max_rounds,
    )
}

/// Apply one mutation inside the open edit; rejections are fine, inconsistencies are not
fn apply(sheet: &mut ChordLeadSheet, mutation: &Mutation, counter: &mut u32) {
    let size = sheet.size_in_bars();
    let ids: Vec<ItemId> = sheet.all_items(None).map(Item::id).collect();
    let pick = |seed: usize| ids[seed % ids.len()];

    let result = match *mutation {
        Mutation::AddChord {
            bar,
            half_beats,
            chord,
        } => sheet
            .create_chord(Position::on_fraction(bar % size, half_beats, 2), CHORDS[chord])
            .and_then(|item| sheet.add_item(item))
            .map(|_| ()),
        Mutation::AddAnnotation { bar } => {
            let item = sheet.create_annotation(Position::bar_start(bar % size), "text");
            sheet.add_item(item).map(|_| ())
        }
        Mutation::AddSection { bar, signature } => {
            *counter += 1;
            sheet
                .create_section(&format!("S{}", counter), bar % size, SIGNATURES[signature])
                .and_then(|item| sheet.add_section(item))
                .map(|_| ())
        }
        Mutation::Remove { pick: seed } => sheet.remove_item(pick(seed)),
        Mutation::Move {
            pick: seed,
            bar,
            beat,
        } => sheet.move_item(pick(seed), Position::on_beat(bar % size, beat)),
        Mutation::InsertBars { at, count } => sheet.insert_bars(at % (size + 1), count),
        Mutation::DeleteBars { from, len } => {
            let from = from % size;
            sheet.delete_bars(from, from + len % (size - from))
        }
        Mutation::Resize { size: seed } => {
            sheet.set_size_in_bars(1 + seed % (size + 4), &TruncationApproval::All)
        }
        Mutation::SetTimeSignature {
            pick: seed,
            signature,
        } => {
            let sections: Vec<ItemId> = sheet.sections().map(Item::id).collect();
            let id = sections[seed % sections.len()];
            sheet
                .set_section_time_signature(id, SIGNATURES[signature])
                .map(|_| ())
        }
    };
    assert_rejection_only(result);
}

fn assert_rejection_only(result: Result<(), EditError>) {
    if let Err(err) = result {
        assert!(err.is_rejection(), "unexpected failure: {}", err);
    }
}

fn snapshot(sheet: &ChordLeadSheet) -> LeadSheetSnapshot {
    sheet.snapshot()
}

proptest! {
    #[test]
    fn invariants_hold_after_every_mutation(rounds in arb_rounds(12)) {
        let mut sheet = ChordLeadSheet::new("A", 8);
        let mut counter = 0;

        for (mutations, _) in rounds {
            sheet.start_edit("Step");
            for mutation in &mutations {
                apply(&mut sheet, mutation, &mut counter);
                prop_assert!(
                    sheet.check_consistency().is_ok(),
                    "after {:?}: {:?}",
                    mutation,
                    sheet.check_consistency()
                );
            }
            prop_assert!(sheet.end_edit().is_ok());
        }
    }

    #[test]
    fn abort_restores_exact_state(rounds in arb_rounds(8)) {
        let mut sheet = ChordLeadSheet::new("A", 8);
        let mut counter = 0;

        for (mutations, abort) in rounds {
            let before = snapshot(&sheet);
            let undo_label = sheet.undo_label().map(str::to_string);
            sheet.start_edit("Tentative");
            for mutation in &mutations {
                apply(&mut sheet, mutation, &mut counter);
            }
            if abort {
                prop_assert_eq!(sheet.abort_edit("changed my mind"), "changed my mind");
                prop_assert_eq!(snapshot(&sheet), before);
                prop_assert_eq!(sheet.undo_label().map(str::to_string), undo_label);
            } else {
                prop_assert!(sheet.end_edit().is_ok());
            }
        }
    }

    #[test]
    fn undo_redo_round_trip(rounds in arb_rounds(10)) {
        let mut sheet = ChordLeadSheet::new("A", 8);
        let mut counter = 0;
        let recorder = Rc::new(Recorder::default());
        let _subscription = sheet.subscribe(&recorder);
        let mut history = vec![snapshot(&sheet)];

        for (mutations, _) in rounds {
            sheet.start_edit("Step");
            for mutation in &mutations {
                apply(&mut sheet, mutation, &mut counter);
            }
            recorder.events.borrow_mut().clear();
            prop_assert!(sheet.end_edit().is_ok());
            // Only edits that changed something land on the undo stack
            let committed = recorder
                .events
                .borrow()
                .iter()
                .any(|e| matches!(e, ChangeEvent::EditCommitted { .. }));
            if committed {
                history.push(snapshot(&sheet));
            }
        }

        for expected in history.iter().rev().skip(1) {
            prop_assert!(sheet.undo().is_ok());
            prop_assert_eq!(&snapshot(&sheet), expected);
        }
        prop_assert!(!sheet.can_undo());

        for expected in history.iter().skip(1) {
            prop_assert!(sheet.redo().is_ok());
            prop_assert_eq!(&snapshot(&sheet), expected);
        }
        prop_assert!(!sheet.can_redo());
    }

    #[test]
    fn events_replay_to_same_state(rounds in arb_rounds(10)) {
        let mut sheet = ChordLeadSheet::new("A", 8);
        let mut counter = 0;
        let recorder = Rc::new(Recorder::default());
        let _subscription = sheet.subscribe(&recorder);

        let mut mirror: Vec<Item> = sheet.all_items(None).cloned().collect();
        let mut mirror_size = sheet.size_in_bars();

        for (mutations, abort) in rounds {
            sheet.start_edit("Step");
            for mutation in &mutations {
                apply(&mut sheet, mutation, &mut counter);
            }
            if abort {
                sheet.abort_edit("abandon");
            } else {
                prop_assert!(sheet.end_edit().is_ok());
            }
        }

        for event in recorder.events.borrow().iter() {
            match event {
                ChangeEvent::ItemAdded { item } => mirror.push(item.clone()),
                ChangeEvent::ItemRemoved { item } => mirror.retain(|i| i.id() != item.id()),
                ChangeEvent::ItemChanged { item, .. } | ChangeEvent::ItemMoved { item, .. } => {
                    for existing in mirror.iter_mut().filter(|i| i.id() == item.id()) {
                        *existing = item.clone();
                    }
                }
                ChangeEvent::SizeChanged { new_size, .. } => mirror_size = *new_size,
                ChangeEvent::EditCommitted { .. } => {}
            }
        }

        let mut mirror_items: Vec<(Position, ItemId)> =
            mirror.iter().map(|i| (i.position(), i.id())).collect();
        let mut sheet_items: Vec<(Position, ItemId)> =
            sheet.all_items(None).map(|i| (i.position(), i.id())).collect();
        mirror_items.sort();
        sheet_items.sort();
        prop_assert_eq!(mirror_items, sheet_items);
        prop_assert_eq!(mirror_size, sheet.size_in_bars());
    }

    #[test]
    fn bar_zero_always_has_a_section(rounds in arb_rounds(10)) {
        struct BarZeroWatcher {
            gaps: RefCell<usize>,
        }

        impl LeadSheetListener for BarZeroWatcher {
            fn on_change(
                &self,
                sheet: &ChordLeadSheet,
                _event: &ChangeEvent,
            ) -> Result<(), ListenerError> {
                if sheet.section_at(0).is_none() {
                    *self.gaps.borrow_mut() += 1;
                }
                Ok(())
            }
        }

        let mut sheet = ChordLeadSheet::new("A", 8);
        let mut counter = 0;
        let watcher = Rc::new(BarZeroWatcher { gaps: RefCell::new(0) });
        let _subscription = sheet.subscribe(&watcher);

        for (mutations, abort) in rounds {
            sheet.start_edit("Step");
            for mutation in &mutations {
                apply(&mut sheet, mutation, &mut counter);
            }
            if abort {
                sheet.abort_edit("abandon");
            } else {
                prop_assert!(sheet.end_edit().is_ok());
            }
        }
        while sheet.can_undo() {
            prop_assert!(sheet.undo().is_ok());
        }
        prop_assert_eq!(*watcher.gaps.borrow(), 0);
    }
}

#[test]
fn test_resize_keeps_identities() {
    let mut sheet = ChordLeadSheet::new("A", 8);
    let ids = sheet
        .edit("Fill", |s| {
            let mut ids = Vec::new();
            for bar in 1..8 {
                let chord = s.create_chord(Position::on_beat(bar, 1), "C7")?;
                ids.push(s.add_item(chord)?);
            }
            Ok(ids)
        })
        .unwrap();

    sheet.edit("Insert", |s| s.insert_bars(3, 2)).unwrap();
    for (offset, id) in ids.iter().enumerate() {
        let bar = offset as u32 + 1;
        let expected = if bar >= 3 { bar + 2 } else { bar };
        assert_eq!(sheet.item(*id).unwrap().position(), Position::on_beat(expected, 1));
    }

    sheet.edit("Delete", |s| s.delete_bars(1, 2)).unwrap();
    assert!(!sheet.contains(ids[0]));
    assert!(!sheet.contains(ids[1]));
    for (offset, id) in ids.iter().enumerate().skip(2) {
        let bar = offset as u32 + 1;
        assert_eq!(sheet.item(*id).unwrap().position(), Position::on_beat(bar, 1));
    }
}

#[test]
fn test_abort_returns_caller_reason() {
    let mut sheet = ChordLeadSheet::new("A", 4);
    sheet.start_edit("Grow");
    sheet.insert_bars(4, 1).unwrap();
    let reason = sheet.abort_edit("user cancelled");
    assert_eq!(reason, "user cancelled");
    assert_eq!(sheet.size_in_bars(), 4);
    assert!(!sheet.is_edit_open());
}
