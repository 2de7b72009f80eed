use pretty_assertions::assert_eq;
use romhex_core::{
    CharacterTable, EditError, EditKey, Editor, EditorError, Format, MemoryModel, Model,
    ModelDelta, Run, StateChangeType, ViewPoint,
};
use std::sync::{Arc, Mutex};

fn blank(length: usize) -> Editor {
    Editor::new("test.gba", MemoryModel::new(vec![0xFF; length]))
}

fn encode(text: &str) -> Vec<u8> {
    CharacterTable::pokemon().encode(text)
}

/// Editor over a buffer with `text` stored at `at`, anchored as a string named `name`.
fn with_string(name: &str, text: &str, at: usize) -> Editor {
    let mut data = vec![0xFF; 0x200];
    let bytes = encode(text);
    data[at..at + bytes.len()].copy_from_slice(&bytes);
    let mut model = MemoryModel::new(data);
    model
        .apply_anchor(&mut ModelDelta::new(), at, name, "\"\"")
        .unwrap();
    Editor::new("test.gba", model)
}

/// Editor with a three-name table at 0x80 and a table of enumerated stats at 0xA0.
fn with_tables() -> Editor {
    let mut data = vec![0xFF; 0x200];
    for (i, name) in ["Bob", "Amy", "Cal"].iter().enumerate() {
        let bytes = encode(name);
        let at = 0x80 + i * 6;
        data[at..at + bytes.len()].copy_from_slice(&bytes);
    }
    let mut model = MemoryModel::new(data);
    let mut delta = ModelDelta::new();
    model.apply_anchor(&mut delta, 0x80, "names", "[name\"\"6]3").unwrap();
    model.apply_anchor(&mut delta, 0xA0, "stats", "[kind.names hp.]2").unwrap();
    model.apply_anchor(&mut delta, 0xC0, "values", "[value:]4").unwrap();
    Editor::new("test.gba", model)
}

fn runs(editor: &Editor) -> Vec<Run> {
    editor.model().runs().cloned().collect()
}

fn collect_errors(editor: &mut Editor) -> Arc<Mutex<Vec<String>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    editor.on_error(move |error| sink.lock().unwrap().push(error.to_string()));
    errors
}

#[test]
fn test_hex_typing_writes_bytes_and_advances() {
    let mut editor = blank(0x100);
    editor.edit_str("12ab");
    assert_eq!(&editor.model().data()[..3], &[0x12, 0xAB, 0xFF]);
    assert_eq!(editor.selection_start_address(), 2);
}

#[test]
fn test_partial_hex_is_shown_under_edit() {
    let mut editor = blank(0x100);
    editor.edit('7');
    assert!(editor.cell(0, 0).format.is_under_edit());
    assert_eq!(editor.cell(0, 0).text(), "7");
    assert_eq!(editor.model().byte(0), 0xFF);
}

#[test]
fn test_typing_at_the_end_appends() {
    let mut editor = blank(0x10);
    editor.goto("F").unwrap();
    editor.edit_str("01");
    editor.edit_str("02");
    assert_eq!(editor.model().len(), 0x11);
    assert_eq!(editor.model().byte(0x10), 0x02);
    assert_eq!(editor.get_state().data_length, 0x11);
}

#[test]
fn test_pointer_to_named_anchor() {
    let mut editor = blank(0x200);
    editor.goto("100").unwrap();
    editor.edit_str("^AnchorName ");
    let anchored = runs(&editor);
    editor.goto("10").unwrap();
    editor.edit_str("<AnchorName>");
    let pointed = runs(&editor);

    assert_eq!(editor.model().read_pointer(0x10), Some(0x100));
    assert_eq!(&editor.model().data()[0x10..0x14], &[0x00, 0x01, 0x00, 0x08]);
    assert_eq!(editor.selection_start_address(), 0x14);
    assert_eq!(editor.cell(0, 0).text(), "<AnchorName>");
    assert_eq!(editor.model().run_containing(0x100).unwrap().sources, vec![0x10]);

    assert!(editor.undo());
    assert_eq!(&editor.model().data()[0x10..0x14], &[0xFF; 4]);
    assert_eq!(editor.model().address_from_anchor("AnchorName"), Some(0x100));
    for address in 0x10..0x14 {
        assert_eq!(editor.model().format_at(address), Format::Plain);
    }
    assert_eq!(runs(&editor), anchored);

    assert!(editor.redo());
    assert_eq!(runs(&editor), pointed);
    assert_eq!(editor.cell(0, 0).text(), "<AnchorName>");
}

#[test]
fn test_pointer_edit_reserves_four_cells() {
    let mut editor = blank(0x100);
    editor.edit_str("<4");
    assert_eq!(editor.selection().range(), (0, 3));
    for col in 1..4 {
        assert!(editor.cell(col, 0).format.is_under_edit());
    }
    assert_eq!(editor.cell(0, 0).text(), "<4");
}

#[test]
fn test_pointer_to_hex_address_and_null() {
    let mut editor = blank(0x100);
    editor.edit_str("<40>");
    assert_eq!(editor.model().read_pointer(0), Some(0x40));
    editor.edit_str("<>");
    assert_eq!(editor.model().read_value(4, 4), 0);
    editor.edit_str("<null>");
    assert_eq!(editor.model().read_value(8, 4), 0);
    assert_eq!(editor.cell(8, 0).text(), "<null>");
}

#[test]
fn test_pointer_past_the_end_is_rejected() {
    let mut editor = blank(0x100);
    let errors = collect_errors(&mut editor);
    editor.edit_str("<FFFF>");

    assert_eq!(&editor.model().data()[..4], &[0xFF; 4]);
    assert_eq!(editor.selection_start_address(), 0);
    assert!(!editor.cell(0, 0).format.is_under_edit());
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(editor.is_saved());
}

#[test]
fn test_unmapped_pointer_resolves_when_named() {
    let mut editor = blank(0x100);
    editor.goto("20").unwrap();
    editor.edit_str("<later>");
    assert_eq!(editor.model().read_pointer(0x20), None);
    assert_eq!(editor.model().unmapped_name(0x20), Some("later"));

    editor.goto("80").unwrap();
    editor.edit_str("^later ");
    assert_eq!(editor.model().read_pointer(0x20), Some(0x80));
    assert_eq!(editor.model().unmapped_name(0x20), None);
}

#[test]
fn test_typing_into_a_pointer_snaps_to_its_start() {
    let mut editor = blank(0x100);
    editor.edit_str("<40>");
    editor.set_selection_start(ViewPoint::new(2, 0));
    editor.edit_str("80>");
    assert_eq!(editor.model().read_pointer(0), Some(0x80));
    assert_eq!(editor.selection_start_address(), 4);
}

#[test]
fn test_anchor_sources_are_listed() {
    let mut editor = blank(0x200);
    editor.goto("100").unwrap();
    editor.edit_str("^target ");
    editor.goto("10").unwrap();
    editor.edit_str("<target>");
    editor.goto("target").unwrap();

    let Format::Anchor(anchor) = &editor.cell(0, 0).format else {
        panic!("expected an anchor at the top left");
    };
    assert_eq!(anchor.name, "target");
    assert_eq!(editor.find_all_sources(0, 0), vec![0x10]);
    assert_eq!(editor.find_all_sources(1, 0), Vec::<usize>::new());
}

#[test]
fn test_pointer_written_over_an_anchor_keeps_its_sources() {
    let mut editor = blank(0x100);
    editor.goto("20").unwrap();
    editor.edit_str("^target ");
    editor.goto("0").unwrap();
    editor.edit_str("<target>");

    editor.set_selection_start(ViewPoint::new(0, 2));
    editor.edit_str("<40>");

    assert_eq!(editor.model().read_pointer(0x20), Some(0x40));
    assert_eq!(editor.model().run_containing(0x20).unwrap().sources, vec![0x00]);
    assert_eq!(editor.find_all_sources(0, 2), vec![0x00]);
    assert_eq!(editor.cell(0, 0).text(), "<target>");

    assert!(editor.undo());
    assert_eq!(editor.model().run_containing(0x20).unwrap().sources, vec![0x00]);
    assert_eq!(editor.model().format_at(0x20), Format::Plain);
}

#[test]
fn test_invalid_anchor_is_reported_and_changes_nothing() {
    let mut editor = blank(0x100);
    let errors = collect_errors(&mut editor);
    editor.edit_str("^null ");
    assert_eq!(editor.model().address_from_anchor("null"), None);
    assert_eq!(errors.lock().unwrap().len(), 1);

    editor.edit_str("^first ");
    editor.goto("20").unwrap();
    editor.edit_str("^first ");
    assert_eq!(editor.model().address_from_anchor("first"), Some(0));
    assert_eq!(errors.lock().unwrap().len(), 2);
}

#[test]
fn test_moving_away_submits_an_open_anchor() {
    let mut editor = blank(0x100);
    editor.edit_str("^marker");
    assert!(editor.cell(0, 0).format.is_under_edit());
    editor.set_selection_start(ViewPoint::new(0, 2));
    assert_eq!(editor.model().address_from_anchor("marker"), Some(0));
    assert_eq!(editor.selection_start_address(), 0x20);
}

#[test]
fn test_goto_edit_jumps() {
    let mut editor = blank(0x200);
    editor.edit_str("@140 ");
    assert_eq!(editor.selection_start_address(), 0x140);
    assert!(editor.can_back());
    assert!(!editor.cell(0, 0).format.is_under_edit());
}

#[test]
fn test_goto_edit_to_an_unknown_target_is_reported_once() {
    let mut editor = blank(0x200);
    let errors = collect_errors(&mut editor);
    editor.goto("30").unwrap();
    editor.edit_str("@nowhere ");

    assert_eq!(errors.lock().unwrap().len(), 1);
    assert_eq!(editor.selection_start_address(), 0x30);
    assert!(!editor.cell(0, 0).format.is_under_edit());
    assert!(editor.is_saved());
}

#[test]
fn test_string_character_overwrites_in_place() {
    let mut editor = with_string("greeting", "Hello", 0x40);
    editor.goto("41").unwrap();
    editor.edit('a');
    assert_eq!(editor.model().byte(0x41), encode("a")[0]);
    assert_eq!(editor.selection_start_address(), 0x42);
    assert_eq!(editor.model().run_containing(0x40).map(|run| run.length()), Some(6));
}

#[test]
fn test_string_grows_in_place_into_free_space() {
    let mut editor = with_string("greeting", "Hi", 0x40);
    editor.goto("42").unwrap();
    editor.edit('!');
    assert_eq!(&editor.model().data()[0x40..0x44], &encode("Hi!")[..]);
    assert_eq!(editor.model().run_containing(0x40).map(|run| run.length()), Some(4));
    assert_eq!(editor.selection_start_address(), 0x43);
}

#[test]
fn test_string_relocates_when_it_cannot_grow() {
    let mut data = vec![0xFF; 0x200];
    data[0x40..0x43].copy_from_slice(&encode("Hi"));
    data[0x43] = 0x00;
    let mut model = MemoryModel::new(data);
    model.set_free_space_start(0x100);
    model
        .apply_anchor(&mut ModelDelta::new(), 0x40, "greeting", "\"\"")
        .unwrap();
    let mut editor = Editor::new("test.gba", model);

    editor.goto("40").unwrap();
    editor.set_selection_start(ViewPoint::new(2, 0));
    editor.edit('!');

    assert_eq!(editor.model().address_from_anchor("greeting"), Some(0x100));
    assert_eq!(&editor.model().data()[0x100..0x104], &encode("Hi!")[..]);
    assert_eq!(&editor.model().data()[0x40..0x43], &[0xFF; 3]);
    // the caret keeps its distance from the top of the window
    assert_eq!(editor.get_state().viewport.data_index, 0x100);
    assert_eq!(editor.selection_start_address(), 0x103);
    assert!(editor.can_back());

    assert!(editor.undo());
    assert_eq!(editor.model().address_from_anchor("greeting"), Some(0x40));
    assert_eq!(&editor.model().data()[0x40..0x43], &encode("Hi")[..]);
}

#[test]
fn test_delimiter_ends_a_string_early() {
    let mut editor = with_string("greeting", "Hello", 0x40);
    editor.goto("42").unwrap();
    editor.edit('"');
    assert_eq!(&editor.model().data()[0x40..0x46], &[0xC2, 0xD9, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(editor.model().run_containing(0x40).map(|run| run.length()), Some(3));
    assert_eq!(editor.selection_start_address(), 0x43);
}

#[test]
fn test_multi_character_symbols_complete_when_whole() {
    let mut editor = with_string("greeting", "Hello", 0x40);
    editor.goto("41").unwrap();
    editor.edit_str("\\p");
    assert!(editor.cell(0, 0).format.is_under_edit());
    assert_eq!(editor.model().byte(0x41), encode("e")[0]);
    editor.edit('k');
    assert_eq!(editor.model().byte(0x41), 0x53);
}

#[test]
fn test_table_text_field_enter_pads_and_moves_to_next_element() {
    let mut editor = with_tables();
    editor.goto("8C").unwrap();
    editor.edit_str("Jo");
    assert_eq!(&editor.model().data()[0x8C..0x8E], &encode("Jo")[..2]);
    editor.key(EditKey::Enter);
    assert_eq!(
        &editor.model().data()[0x8C..0x92],
        &[0xC4, 0xE3, 0xFF, 0x00, 0x00, 0x00]
    );
    // last element: the caret leaves the table
    assert_eq!(editor.selection_start_address(), 0x92);

    editor.goto("80").unwrap();
    editor.edit_str("Ed");
    editor.key(EditKey::Enter);
    assert_eq!(&editor.model().data()[0x80..0x86], &[0xBF, 0xD8, 0xFF, 0x00, 0x00, 0x00]);
    assert_eq!(editor.selection_start_address(), 0x86);
}

#[test]
fn test_table_text_over_free_space_keeps_a_terminator() {
    let mut model = MemoryModel::new(vec![0xFF; 0x100]);
    model
        .apply_anchor(&mut ModelDelta::new(), 0x10, "labels", "[label\"\"6]2")
        .unwrap();
    let mut editor = Editor::new("test.gba", model);
    editor.goto("10").unwrap();
    editor.edit_str("Bob");
    assert_eq!(&editor.model().data()[0x10..0x14], &[0xBC, 0xE3, 0xD6, 0xFF]);
    editor.key(EditKey::Enter);
    assert_eq!(&editor.model().data()[0x10..0x16], &[0xBC, 0xE3, 0xD6, 0xFF, 0x00, 0x00]);
    assert_eq!(editor.selection_start_address(), 0x16);
}

#[test]
fn test_enumerations_accept_names_and_numbers() {
    let mut editor = with_tables();
    editor.goto("A0").unwrap();
    editor.edit_str("Cal ");
    assert_eq!(editor.model().byte(0xA0), 2);
    assert_eq!(editor.selection_start_address(), 0xA1);

    editor.goto("A2").unwrap();
    editor.edit_str("amy ");
    assert_eq!(editor.model().byte(0xA2), 1);

    editor.goto("A0").unwrap();
    editor.edit_str("\"Bob\" ");
    assert_eq!(editor.model().byte(0xA0), 0);
    assert_eq!(editor.cell(0, 0).text(), "Bob");

    editor.goto("A0").unwrap();
    editor.edit_str("1 ");
    assert_eq!(editor.model().byte(0xA0), 1);
}

#[test]
fn test_unknown_enumeration_name_is_reported() {
    let mut editor = with_tables();
    let errors = collect_errors(&mut editor);
    editor.goto("A0").unwrap();
    editor.edit_str("Zed ");
    assert_eq!(editor.model().byte(0xA0), 0xFF);
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[test]
fn test_integer_overflow_is_reported() {
    let mut editor = with_tables();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    editor.on_error(move |error| {
        if let EditorError::Edit(edit) = error {
            sink.lock().unwrap().push(edit.clone());
        }
    });
    editor.goto("A1").unwrap();
    editor.edit_str("300 ");
    assert_eq!(editor.model().byte(0xA1), 0xFF);
    assert_eq!(
        *received.lock().unwrap(),
        vec![EditError::IntegerOverflow { value: 300, length: 1 }]
    );

    editor.edit_str("42\n");
    assert_eq!(editor.model().byte(0xA1), 42);
}

#[test]
fn test_integer_typed_mid_field_snaps_to_its_start() {
    let mut editor = with_tables();
    editor.goto("C0").unwrap();
    editor.set_selection_start(ViewPoint::new(1, 0));
    editor.edit_str("513");
    assert_eq!(editor.selection().range(), (0xC0, 0xC1));
    editor.key(EditKey::Enter);
    assert_eq!(&editor.model().data()[0xC0..0xC2], &[0x01, 0x02]);
    assert_eq!(editor.selection_start_address(), 0xC2);
}

#[test]
fn test_backspace_edits_the_previous_byte() {
    let mut editor = blank(0x100);
    editor.edit_str("12");
    editor.key(EditKey::Backspace);
    assert_eq!(editor.selection_start_address(), 0);
    assert_eq!(editor.cell(0, 0).text(), "1");
    editor.edit('F');
    assert_eq!(editor.model().byte(0), 0x1F);
    assert_eq!(editor.selection_start_address(), 1);
}

#[test]
fn test_backspace_removes_typed_characters_first() {
    let mut editor = blank(0x100);
    editor.edit('A');
    editor.key(EditKey::Backspace);
    assert_eq!(editor.cell(0, 0).text(), "");
    editor.edit_str("55");
    assert_eq!(editor.model().byte(0), 0x55);
}

#[test]
fn test_backspace_reopens_a_pointer() {
    let mut editor = blank(0x100);
    editor.goto("40").unwrap();
    editor.edit_str("^items ");
    editor.goto("10").unwrap();
    editor.edit_str("<items>");
    editor.key(EditKey::Backspace);
    assert_eq!(editor.cell(0, 0).text(), "<items");
    assert_eq!(editor.selection().range(), (0x10, 0x13));

    editor.edit_str("2>");
    assert_eq!(editor.model().read_pointer(0x10), None);
    assert_eq!(editor.model().unmapped_name(0x10), Some("items2"));
}

#[test]
fn test_backspace_truncates_a_string() {
    let mut editor = with_string("greeting", "Hello", 0x40);
    editor.goto("43").unwrap();
    editor.key(EditKey::Backspace);
    assert_eq!(editor.model().byte(0x42), 0xFF);
    assert_eq!(editor.model().run_containing(0x40).map(|run| run.length()), Some(3));
    assert_eq!(editor.selection_start_address(), 0x42);
}

#[test]
fn test_escape_discards_the_open_edit() {
    let mut editor = blank(0x100);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    editor.subscribe(move |change| sink.lock().unwrap().push(change.change_type));

    editor.edit_str("<4");
    editor.key(EditKey::Escape);
    assert!(!editor.cell(0, 0).format.is_under_edit());
    assert!(!editor.cell(1, 0).format.is_under_edit());
    assert_eq!(editor.selection().range(), (0, 0));
    assert_eq!(&editor.model().data()[..4], &[0xFF; 4]);
    assert!(seen.lock().unwrap().contains(&StateChangeType::MenuClose));

    // a second escape has nothing left to discard
    editor.key(EditKey::Escape);
    assert_eq!(editor.selection().range(), (0, 0));
}

#[test]
fn test_escape_over_a_pointer_keeps_the_pointer() {
    let mut editor = blank(0x100);
    editor.edit_str("<40>");
    let before = runs(&editor);
    let format = editor.model().format_at(0x00);

    editor.set_selection_start(ViewPoint::new(0, 0));
    editor.edit_str("<8");
    assert!(editor.cell(1, 0).format.is_under_edit());
    editor.key(EditKey::Escape);

    assert_eq!(runs(&editor), before);
    assert_eq!(editor.model().format_at(0x00), format);
    assert_eq!(editor.model().read_pointer(0x00), Some(0x40));
    assert!(!editor.cell(0, 0).format.is_under_edit());
    assert_eq!(editor.model().run_containing(0x40).unwrap().sources, vec![0x00]);
}

#[test]
fn test_rejected_input_discards_the_open_edit() {
    let mut editor = blank(0x100);
    editor.edit('A');
    editor.edit('G');
    assert!(!editor.cell(0, 0).format.is_under_edit());
    assert_eq!(editor.model().byte(0), 0xFF);
    assert!(editor.is_saved());
}

#[test]
fn test_clear_selection_resets_data_and_formats() {
    let mut editor = blank(0x100);
    editor.goto("40").unwrap();
    editor.edit_str("^items ");
    editor.goto("10").unwrap();
    editor.edit_str("<items>");
    editor.set_selection_start(ViewPoint::new(0, 0));
    editor.set_selection_end(ViewPoint::new(3, 0));
    editor.clear_selection();

    assert_eq!(&editor.model().data()[0x10..0x14], &[0x00; 4]);
    assert_eq!(editor.model().format_at(0x10), Format::Plain);
    assert!(editor.model().run_containing(0x40).is_some_and(|run| run.sources.is_empty()));

    assert!(editor.undo());
    assert_eq!(editor.model().read_pointer(0x10), Some(0x40));
}
