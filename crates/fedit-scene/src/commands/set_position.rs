#![forbid(unsafe_code)]

use std::any::Any;

use fedit_core::{ObjectId, SignalName, names};
use fedit_history::{
    Command, CommandError, CommandMetadata, CommandRegistry, CommandResult, MergeKey,
    StoredCommand,
};
use serde::{Deserialize, Serialize};

use super::{decode_payload, encode_payload};
use crate::session::EditorSession;

/// Move an entity to a new local position.
///
/// Gizmo drags issue one of these per frame; they merge while the drag
/// continues inside the merge window.
#[derive(Debug)]
pub struct SetPositionCommand {
    state: PositionPayload,
    metadata: CommandMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PositionPayload {
    entity: ObjectId,
    old: [f64; 3],
    new: [f64; 3],
}

impl SetPositionCommand {
    pub const KIND: &'static str = "SetPosition";

    pub fn new(session: &EditorSession, entity: ObjectId, position: [f64; 3]) -> Self {
        let mut metadata = CommandMetadata::new("Set Position");
        let old = match session.scene.get(entity) {
            Some(e) => e.position,
            None => {
                metadata.cancel(format!("entity {entity} not found"));
                [0.0; 3]
            }
        };
        Self {
            state: PositionPayload {
                entity,
                old,
                new: position,
            },
            metadata,
        }
    }

    /// Override the captured starting position.
    ///
    /// Used when the live preview already moved the entity before the
    /// command was created.
    #[must_use]
    pub fn with_old_position(mut self, old: [f64; 3]) -> Self {
        self.state.old = old;
        self
    }

    fn apply(&self, session: &mut EditorSession, position: [f64; 3]) -> CommandResult {
        session.scene.entity_mut(self.state.entity)?.position = position;
        session.notify(names::OBJECT_CHANGED, self.state.entity);
        Ok(())
    }

    pub(crate) fn decode(
        stored: &StoredCommand,
        _: &CommandRegistry<EditorSession>,
    ) -> Result<Box<dyn Command<EditorSession>>, CommandError> {
        Ok(Box::new(Self {
            state: decode_payload(stored)?,
            metadata: stored.metadata(),
        }))
    }
}

impl Command<EditorSession> for SetPositionCommand {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, session: &mut EditorSession) -> CommandResult {
        self.apply(session, self.state.new)
    }

    fn undo(&mut self, session: &mut EditorSession) -> CommandResult {
        self.apply(session, self.state.old)
    }

    fn updatable(&self) -> bool {
        true
    }

    fn merge_key(&self) -> Option<MergeKey> {
        Some(MergeKey::new(Self::KIND, self.state.entity))
    }

    fn update(&mut self, other: &dyn Command<EditorSession>) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.state.new = other.state.new;
        true
    }

    fn emits(&self) -> Vec<SignalName> {
        vec![names::OBJECT_CHANGED]
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        encode_payload(&self.state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::session_with;

    #[test]
    fn move_and_back() {
        let (mut session, ids) = session_with(&["Box"]);
        let mut cmd = SetPositionCommand::new(&session, ids[0], [1.0, 2.0, 3.0]);
        cmd.execute(&mut session).unwrap();
        assert_eq!(session.scene.entity(ids[0]).unwrap().position, [1.0, 2.0, 3.0]);
        cmd.undo(&mut session).unwrap();
        assert_eq!(session.scene.entity(ids[0]).unwrap().position, [0.0; 3]);
    }

    #[test]
    fn old_position_override() {
        let (mut session, ids) = session_with(&["Box"]);
        session.scene.entity_mut(ids[0]).unwrap().position = [5.0, 0.0, 0.0];
        let mut cmd =
            SetPositionCommand::new(&session, ids[0], [5.0, 0.0, 0.0]).with_old_position([0.0; 3]);
        cmd.execute(&mut session).unwrap();
        cmd.undo(&mut session).unwrap();
        assert_eq!(session.scene.entity(ids[0]).unwrap().position, [0.0; 3]);
    }

    #[test]
    fn drag_frames_merge_to_last_position() {
        let (session, ids) = session_with(&["Box"]);
        let mut first = SetPositionCommand::new(&session, ids[0], [1.0, 0.0, 0.0]);
        let second = SetPositionCommand::new(&session, ids[0], [2.0, 0.0, 0.0]);
        assert!(first.update(&second));
        assert_eq!(first.state.old, [0.0; 3]);
        assert_eq!(first.state.new, [2.0, 0.0, 0.0]);
    }
}
