#![forbid(unsafe_code)]

use std::any::Any;

use fedit_core::{ObjectId, SignalName, names};
use fedit_history::{Command, CommandError, CommandMetadata, CommandRegistry, CommandResult, StoredCommand};
use serde::{Deserialize, Serialize};

use super::{check_subtree, decode_payload, encode_payload, release_if_detached};
use crate::scene::{Detached, SceneError};
use crate::session::EditorSession;

/// Remove an entity and its descendants.
///
/// The removed subtree is kept so undo can put it back at the same parent
/// and sibling position. While applied, the command owns its meshes.
pub struct RemoveEntityCommand {
    entity: ObjectId,
    detached: Option<Detached>,
    metadata: CommandMetadata,
}

#[derive(Serialize, Deserialize)]
struct RemovePayload {
    entity: ObjectId,
    /// Present while the command is applied.
    subtree: Option<Detached>,
}

impl RemoveEntityCommand {
    pub const KIND: &'static str = "RemoveEntity";

    /// Remove `entity`. Cancelled if it does not exist.
    pub fn new(session: &EditorSession, entity: ObjectId) -> Self {
        let metadata = match session.scene.get(entity) {
            Some(e) => CommandMetadata::new(format!("Remove {}", e.name)),
            None => {
                let mut metadata = CommandMetadata::new("Remove");
                metadata.cancel(format!("entity {entity} not found"));
                metadata
            }
        };
        Self {
            entity,
            detached: None,
            metadata,
        }
    }

    /// Id of the removed entity.
    #[must_use]
    pub fn entity(&self) -> ObjectId {
        self.entity
    }

    pub(crate) fn decode(
        stored: &StoredCommand,
        _: &CommandRegistry<EditorSession>,
    ) -> Result<Box<dyn Command<EditorSession>>, CommandError> {
        let payload: RemovePayload = decode_payload(stored)?;
        if let Some(subtree) = &payload.subtree {
            check_subtree(stored, subtree)?;
        }
        Ok(Box::new(Self {
            entity: payload.entity,
            detached: payload.subtree,
            metadata: stored.metadata(),
        }))
    }
}

impl Command<EditorSession> for RemoveEntityCommand {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, session: &mut EditorSession) -> CommandResult {
        let detached = session.scene.detach(self.entity)?;
        self.detached = Some(detached);
        session.notify(names::OBJECT_REMOVED, self.entity);
        session.notify(names::SCENE_GRAPH_CHANGED, self.entity);
        Ok(())
    }

    fn undo(&mut self, session: &mut EditorSession) -> CommandResult {
        let (parent, index) = self
            .detached
            .as_ref()
            .map(|d| (d.parent(), d.index()))
            .ok_or(SceneError::NothingToAttach)?;
        session
            .scene
            .attach(&mut self.detached, parent, Some(index))?;
        session.notify(names::OBJECT_ADDED, self.entity);
        session.notify(names::SCENE_GRAPH_CHANGED, self.entity);
        Ok(())
    }

    fn purge(&mut self, session: &mut EditorSession) {
        if let Some(detached) = self.detached.take() {
            release_if_detached(&detached, session);
        }
    }

    fn emits(&self) -> Vec<SignalName> {
        vec![
            names::OBJECT_REMOVED,
            names::OBJECT_ADDED,
            names::SCENE_GRAPH_CHANGED,
        ]
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        encode_payload(&RemovePayload {
            entity: self.entity,
            subtree: self.detached.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{session_with, session_with_mesh};

    #[test]
    fn undo_restores_subtree_in_place() {
        let (mut session, ids) = session_with(&["A", "B", "C"]);
        let child = session.scene.new_entity("B.1");
        session
            .scene
            .attach(&mut Some(Detached::new(child)), Some(ids[1]), None)
            .unwrap();
        let before = session.scene.clone();

        let mut cmd = RemoveEntityCommand::new(&session, ids[1]);
        assert_eq!(cmd.label(), "Remove B");
        cmd.execute(&mut session).unwrap();
        assert_eq!(session.scene.roots(), &[ids[0], ids[2]]);
        assert_eq!(session.scene.len(), 2);

        cmd.undo(&mut session).unwrap();
        assert_eq!(session.scene, before);
    }

    #[test]
    fn cancelled_when_missing() {
        let (session, _) = session_with(&["A"]);
        let cmd = RemoveEntityCommand::new(&session, ObjectId(42));
        assert!(!cmd.is_valid());
    }

    #[test]
    fn purge_releases_mesh_once_while_removed() {
        let (mut session, id) = session_with_mesh();
        let mesh = session.scene.entity(id).unwrap().mesh.unwrap();

        let mut cmd = RemoveEntityCommand::new(&session, id);
        cmd.execute(&mut session).unwrap();
        cmd.purge(&mut session);
        cmd.purge(&mut session);
        assert_eq!(session.resources.release_count(mesh), 1);
    }

    #[test]
    fn purge_after_undo_keeps_mesh() {
        let (mut session, id) = session_with_mesh();
        let mesh = session.scene.entity(id).unwrap().mesh.unwrap();

        let mut cmd = RemoveEntityCommand::new(&session, id);
        cmd.execute(&mut session).unwrap();
        cmd.undo(&mut session).unwrap();
        cmd.purge(&mut session);
        assert!(session.resources.is_live(mesh));
    }

    #[test]
    fn decoded_while_applied_can_undo() {
        let (mut session, ids) = session_with(&["A", "B"]);
        let before = session.scene.clone();
        let mut cmd = RemoveEntityCommand::new(&session, ids[0]);
        cmd.execute(&mut session).unwrap();

        let stored = StoredCommand::capture(&cmd, None).unwrap();
        let mut back = RemoveEntityCommand::decode(&stored, &CommandRegistry::new()).unwrap();
        back.undo(&mut session).unwrap();
        assert_eq!(session.scene, before);
    }

    #[test]
    fn decode_rejects_empty_subtree() {
        let stored = StoredCommand {
            id: None,
            kind: RemoveEntityCommand::KIND.into(),
            label: "Remove".into(),
            payload: serde_json::json!({
                "entity": 1,
                "subtree": { "entities": [], "parent": null, "index": 0 }
            }),
        };
        let err = RemoveEntityCommand::decode(&stored, &CommandRegistry::new()).err();
        assert!(matches!(err, Some(CommandError::Decode { .. })));
    }
}
