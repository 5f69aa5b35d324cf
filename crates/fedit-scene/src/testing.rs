//! Fixtures shared by the unit tests of this crate.

use fedit_core::ObjectId;

use crate::scene::Detached;
use crate::session::EditorSession;

/// Session with one root entity per name, in order.
pub(crate) fn session_with(names: &[&str]) -> (EditorSession, Vec<ObjectId>) {
    let mut session = EditorSession::new();
    let ids = names
        .iter()
        .map(|name| {
            let entity = session.scene.new_entity(*name);
            session
                .scene
                .attach(&mut Some(Detached::new(entity)), None, None)
                .unwrap()
        })
        .collect();
    (session, ids)
}

/// Session with a single root `Cube` that owns a mesh.
pub(crate) fn session_with_mesh() -> (EditorSession, ObjectId) {
    let mut session = EditorSession::new();
    let mesh = session.resources.allocate("cube.obj");
    let entity = session.scene.new_entity("Cube").with_mesh(mesh);
    let id = session
        .scene
        .attach(&mut Some(Detached::new(entity)), None, None)
        .unwrap();
    (session, id)
}
