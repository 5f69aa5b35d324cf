#![no_main]

use fedit_history::HistorySnapshot;
use fedit_scene::Editor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a history file. Decoding and restoring must never
    // panic; a rejected snapshot must leave the editor untouched.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(snapshot) = HistorySnapshot::from_json_str(text) else {
        return;
    };
    let mut editor = Editor::default();
    if editor.restore(&snapshot).is_err() {
        assert_eq!(editor.history().undo_depth(), 0);
        assert_eq!(editor.history().redo_depth(), 0);
        return;
    }

    // Whatever was restored must survive walking the stacks.
    let _ = editor.go_to_state(0);
    editor.clear();
});
