#![forbid(unsafe_code)]

//! Undoable scene edits.
//!
//! Every mutation of an [`EditorSession`](crate::EditorSession) goes through
//! one of these commands. Constructors read the session to capture the state
//! needed for undo and cancel themselves when their target does not exist;
//! the history then purges and drops them without executing.
//!
//! | Command                    | Signals                              | Merges        |
//! |----------------------------|--------------------------------------|---------------|
//! | [`AddEntityCommand`]       | objectAdded, sceneGraphChanged       | no            |
//! | [`RemoveEntityCommand`]    | objectRemoved, sceneGraphChanged     | no            |
//! | [`MoveEntityCommand`]      | sceneGraphChanged                    | no            |
//! | [`SetValueCommand`]        | objectChanged                        | within window |
//! | [`SetPositionCommand`]     | objectChanged                        | within window |
//! | [`SetScriptSourceCommand`] | scriptChanged                        | always        |
//! | [`SelectCommand`]          | selectionChanged                     | no            |

mod add_entity;
mod move_entity;
mod remove_entity;
mod select;
mod set_position;
mod set_script_source;
mod set_value;

pub use add_entity::AddEntityCommand;
pub use move_entity::MoveEntityCommand;
pub use remove_entity::RemoveEntityCommand;
pub use select::SelectCommand;
pub use set_position::SetPositionCommand;
pub use set_script_source::SetScriptSourceCommand;
pub use set_value::SetValueCommand;

use fedit_history::{CommandError, StoredCommand};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::scene::{Detached, SceneError};
use crate::session::EditorSession;

impl From<SceneError> for CommandError {
    fn from(err: SceneError) -> Self {
        match err {
            SceneError::NotFound(id) => Self::ObjectNotFound(id),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

/// Parse the payload of a stored command.
fn decode_payload<T: DeserializeOwned>(stored: &StoredCommand) -> Result<T, CommandError> {
    serde_json::from_value(stored.payload.clone()).map_err(|e| CommandError::Decode {
        kind: stored.kind.clone(),
        reason: e.to_string(),
    })
}

/// Reject persisted subtrees without a root.
fn check_subtree(stored: &StoredCommand, subtree: &Detached) -> Result<(), CommandError> {
    if subtree.is_empty() {
        return Err(CommandError::Decode {
            kind: stored.kind.clone(),
            reason: "empty subtree".into(),
        });
    }
    Ok(())
}

fn encode_payload<T: Serialize>(payload: &T) -> Option<serde_json::Value> {
    serde_json::to_value(payload).ok()
}

/// Release the meshes of a subtree that is no longer in the scene.
///
/// A subtree that is (back) in the scene is owned by the scene, not by the
/// command holding a copy of it.
fn release_if_detached(subtree: &Detached, session: &mut EditorSession) {
    if session.scene.contains(subtree.root()) {
        return;
    }
    for mesh in subtree.meshes() {
        session.resources.release(mesh);
    }
}
