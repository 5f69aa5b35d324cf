#![forbid(unsafe_code)]

//! Scene editing domain for fedit.
//!
//! An [`EditorSession`] holds the entity tree, the selection, the mesh pool
//! and the notification bus. Every change to it is a command from
//! [`commands`], recorded by a [`fedit_history::History`]; [`Editor`] wires
//! the two together for embedding applications.
//!
//! # Example
//!
//! ```ignore
//! use fedit_scene::{Editor, SetValueCommand, gestures};
//!
//! let mut editor = Editor::default();
//! let crate_entity = editor.session_mut().scene.new_entity("Crate");
//! let add = gestures::add_and_select(editor.session_mut(), crate_entity, None);
//! editor.execute(add)?;
//!
//! let id = editor.session().selection.selected().unwrap();
//! editor.build(|s| SetValueCommand::new(s, id, "mass", 12.0))?;
//! editor.undo()?;
//! ```
//!
//! # Resource ownership
//!
//! Meshes belong to the scene while their entity is in it. When an entity
//! is out of the scene because of a command (an applied removal or an undone
//! addition), that command owns the meshes and releases them when the
//! history purges it.

pub mod commands;
pub mod editor;
pub mod gestures;
pub mod registry;
pub mod resources;
pub mod scene;
pub mod selection;
pub mod session;

#[cfg(test)]
mod testing;

pub use commands::{
    AddEntityCommand, MoveEntityCommand, RemoveEntityCommand, SelectCommand, SetPositionCommand,
    SetScriptSourceCommand, SetValueCommand,
};
pub use editor::{Editor, EditorError, Project};
pub use gestures::{add_and_select, multi_set_value, remove_selected};
pub use registry::scene_registry;
pub use resources::{MeshHandle, ResourcePool};
pub use scene::{AttrValue, Detached, Entity, NAME_ATTRIBUTE, Scene, SceneError, Script};
pub use selection::Selection;
pub use session::EditorSession;
