#![no_main]

use arbitrary::Arbitrary;
use fedit_core::ObjectId;
use fedit_history::Command;
use fedit_scene::{
    AddEntityCommand, Editor, EditorSession, MoveEntityCommand, RemoveEntityCommand,
    SetValueCommand,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Add { parent: Option<u8> },
    Remove(u8),
    Move { entity: u8, parent: Option<u8> },
    SetValue(u8, i64),
    Undo,
    Redo,
    GoTo(u8),
    Playing(bool),
}

/// Ids that do not exist exercise the cancellation paths.
fn pick(i: u8) -> ObjectId {
    ObjectId(u64::from(i % 24))
}

fuzz_target!(|ops: Vec<Op>| {
    let mut editor = Editor::default();
    for op in ops.into_iter().take(256) {
        let session = editor.session_mut();
        let cmd: Box<dyn Command<EditorSession>> = match op {
            Op::Add { parent } => {
                let parent = parent.map(pick);
                let mesh = session.resources.allocate("fuzz.obj");
                let entity = session.scene.new_entity("Fuzz").with_mesh(mesh);
                Box::new(AddEntityCommand::new(session, entity, parent))
            }
            Op::Remove(i) => Box::new(RemoveEntityCommand::new(session, pick(i))),
            Op::Move { entity, parent } => Box::new(MoveEntityCommand::new(
                session,
                pick(entity),
                parent.map(pick),
                None,
            )),
            Op::SetValue(i, v) => Box::new(SetValueCommand::new(session, pick(i), "v", v)),
            Op::Undo => {
                let _ = editor.undo();
                continue;
            }
            Op::Redo => {
                let _ = editor.redo();
                continue;
            }
            Op::GoTo(id) => {
                let _ = editor.go_to_state(u64::from(id));
                continue;
            }
            Op::Playing(playing) => {
                editor.set_playing(playing);
                continue;
            }
        };
        editor
            .execute(cmd)
            .expect("valid commands never fail against a consistent scene");
    }

    editor.set_playing(false);
    editor.go_to_state(0).expect("jump to the initial state");
    assert!(editor.session().scene.is_empty());
    editor.clear();
    assert_eq!(editor.session().resources.live_count(), 0);
});
