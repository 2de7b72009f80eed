use romhex_core::{
    DeferredWork, Editor, EditorError, FileSource, Format, MemoryModel, Model, ModelDelta,
    QueueScheduler, ToolNotifier,
};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

/// Replays canned load results, one per call.
struct ScriptedSource {
    results: VecDeque<io::Result<Option<Vec<u8>>>>,
    metadata: Option<String>,
}

impl ScriptedSource {
    fn new(results: Vec<io::Result<Option<Vec<u8>>>>) -> Self {
        Self {
            results: results.into(),
            metadata: None,
        }
    }

    fn with_metadata(mut self, json: impl Into<String>) -> Self {
        self.metadata = Some(json.into());
        self
    }
}

impl FileSource for ScriptedSource {
    fn load(&mut self, _name: &str) -> io::Result<Option<Vec<u8>>> {
        self.results.pop_front().unwrap_or(Ok(None))
    }

    fn metadata(&mut self, _name: &str) -> io::Result<Option<String>> {
        Ok(self.metadata.clone())
    }
}

fn locked() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "file is locked")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Begin,
    End,
    Changed(usize),
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    events: Arc<Mutex<Vec<Event>>>,
}

impl ToolNotifier for RecordingNotifier {
    fn begin_deferral(&mut self) {
        self.events.lock().unwrap().push(Event::Begin);
    }

    fn end_deferral(&mut self) {
        self.events.lock().unwrap().push(Event::End);
    }

    fn data_changed(&mut self, earliest: usize) {
        self.events.lock().unwrap().push(Event::Changed(earliest));
    }
}

fn editor() -> Editor {
    Editor::new("test.gba", MemoryModel::new(vec![0xFF; 0x100]))
}

#[test]
fn test_reload_is_refused_with_unsaved_changes() {
    let mut editor = editor();
    editor.edit_str("12");
    let mut source = ScriptedSource::new(vec![Ok(Some(vec![0; 0x10]))]);

    let result = editor.consider_reload(&mut source);
    assert!(matches!(result, Err(EditorError::UnsavedChanges)));
    assert_eq!(editor.model().byte(0), 0x12);
    assert_eq!(editor.model().len(), 0x100);
}

#[test]
fn test_reload_replaces_the_data_and_history() {
    let mut editor = editor();
    editor.goto("80").unwrap();
    editor.edit_str("^old 12");
    editor.mark_saved();

    let mut source = ScriptedSource::new(vec![Ok(Some(vec![0x00; 0x40]))]);
    assert!(editor.consider_reload(&mut source).unwrap());

    assert_eq!(editor.model().len(), 0x40);
    assert_eq!(editor.model().address_from_anchor("old"), None);
    assert!(!editor.can_undo());
    assert!(editor.is_saved());
    // the old selection was past the new end
    assert_eq!(editor.selection_start_address(), 0x40);
}

/// Editor with a pointer at 0x00 to an anchor named `target` at 0x40, saved.
fn with_pointer() -> Editor {
    let mut editor = editor();
    editor.goto("40").unwrap();
    editor.edit_str("^target ");
    editor.goto("0").unwrap();
    editor.edit_str("<target>");
    editor.mark_saved();
    editor
}

#[test]
fn test_reload_keeps_anchors_and_pointers() {
    let mut editor = with_pointer();
    let same = editor.model().data().to_vec();
    let mut source = ScriptedSource::new(vec![Ok(Some(same))]);
    assert!(editor.consider_reload(&mut source).unwrap());

    assert_eq!(editor.model().address_from_anchor("target"), Some(0x40));
    assert_eq!(editor.model().read_pointer(0x00), Some(0x40));
    assert!(matches!(editor.model().format_at(0x00), Format::Pointer(_)));
    assert_eq!(editor.model().run_containing(0x40).unwrap().sources, vec![0x00]);
    assert_eq!(editor.cell(0, 0).text(), "<target>");
    assert!(!editor.can_undo());
}

#[test]
fn test_shorter_reload_keeps_anchors_inside_the_data() {
    let mut editor = editor();
    editor.goto("10").unwrap();
    editor.edit_str("^early ");
    editor.goto("C0").unwrap();
    editor.edit_str("^late ");
    editor.mark_saved();

    let mut source = ScriptedSource::new(vec![Ok(Some(vec![0xFF; 0x80]))]);
    assert!(editor.consider_reload(&mut source).unwrap());
    assert_eq!(editor.model().address_from_anchor("early"), Some(0x10));
    assert_eq!(editor.model().address_from_anchor("late"), None);
}

#[test]
fn test_reload_uses_metadata_from_the_source() {
    let mut stored = MemoryModel::new(vec![0xFF; 0x100]);
    stored
        .apply_anchor(&mut ModelDelta::new(), 0x20, "stored", "")
        .unwrap();
    let json = stored.export_metadata().unwrap();

    let mut editor = with_pointer();
    let mut source = ScriptedSource::new(vec![Ok(Some(vec![0xFF; 0x100]))]).with_metadata(json);
    assert!(editor.consider_reload(&mut source).unwrap());

    assert_eq!(editor.model().address_from_anchor("stored"), Some(0x20));
    assert_eq!(editor.model().address_from_anchor("target"), None);
    assert_eq!(editor.model().format_at(0x00), Format::Plain);
}

#[test]
fn test_unreadable_metadata_fails_the_reload() {
    let mut editor = with_pointer();
    let mut source =
        ScriptedSource::new(vec![Ok(Some(vec![0x00; 0x10]))]).with_metadata("{ not json");

    let result = editor.consider_reload(&mut source);
    assert!(matches!(result, Err(EditorError::Metadata(_))));
    assert_eq!(editor.model().len(), 0x100);
    assert_eq!(editor.model().address_from_anchor("target"), Some(0x40));
}

#[test]
fn test_unchanged_file_is_not_reloaded() {
    let mut editor = editor();
    let mut source = ScriptedSource::new(vec![Ok(None)]);
    assert!(!editor.consider_reload(&mut source).unwrap());
    assert_eq!(editor.model().len(), 0x100);
}

#[test]
fn test_failed_reload_without_scheduler_is_an_error() {
    let mut editor = editor();
    let mut source = ScriptedSource::new(vec![Err(locked())]);
    let result = editor.consider_reload(&mut source);
    assert!(matches!(result, Err(EditorError::Io(_))));
}

#[test]
fn test_failed_reload_is_retried_through_the_scheduler() {
    let queue = Arc::new(Mutex::new(QueueScheduler::new()));
    let mut editor = editor();
    editor.set_scheduler(queue.clone());

    let mut source = ScriptedSource::new(vec![Err(locked())]);
    assert!(!editor.consider_reload(&mut source).unwrap());

    let work = queue.lock().unwrap().drain();
    assert!(work.contains(&DeferredWork::ConsiderReload));

    editor.set_file_source(Box::new(ScriptedSource::new(vec![Ok(Some(vec![0xAB; 8]))])));
    editor.run_deferred(DeferredWork::ConsiderReload).unwrap();
    assert_eq!(editor.model().data(), &[0xAB; 8]);
}

#[test]
fn test_scheduled_headers_refresh_on_request() {
    let queue = Arc::new(Mutex::new(QueueScheduler::new()));
    let mut editor = editor();
    editor.set_scheduler(queue.clone());

    editor.goto("40").unwrap();
    assert_eq!(editor.headers()[0], "000000");
    assert!(queue.lock().unwrap().drain().contains(&DeferredWork::UpdateHeaders));

    editor.run_deferred(DeferredWork::UpdateHeaders).unwrap();
    assert_eq!(editor.headers()[0], "000040");
}

#[test]
fn test_typing_notifies_tools_in_one_batch() {
    let notifier = RecordingNotifier::default();
    let events = notifier.events.clone();
    let mut editor = editor();
    editor.set_notifier(Box::new(notifier));

    editor.goto("10").unwrap();
    editor.edit_str("AABB");

    assert_eq!(
        *events.lock().unwrap(),
        vec![Event::Begin, Event::Changed(0x10), Event::Changed(0x11), Event::End]
    );
}

#[test]
fn test_undo_notifies_the_earliest_change() {
    let notifier = RecordingNotifier::default();
    let events = notifier.events.clone();
    let mut editor = editor();
    editor.goto("30").unwrap();
    editor.edit_str("AABB");
    editor.set_notifier(Box::new(notifier));

    editor.undo();
    assert_eq!(*events.lock().unwrap(), vec![Event::Changed(0x30)]);
}
