#![forbid(unsafe_code)]

use std::any::Any;

use fedit_core::{ObjectId, SignalName, names};
use fedit_history::{Command, CommandError, CommandMetadata, CommandRegistry, CommandResult, StoredCommand};
use serde::{Deserialize, Serialize};

use super::{check_subtree, decode_payload, encode_payload, release_if_detached};
use crate::scene::{Detached, Entity};
use crate::session::EditorSession;

/// Insert a new entity into the scene.
///
/// While the command is undone it holds the entity (and anything parented
/// under it since) and owns its meshes.
pub struct AddEntityCommand {
    entity: ObjectId,
    parent: Option<ObjectId>,
    index: Option<usize>,
    pending: Option<Detached>,
    metadata: CommandMetadata,
}

#[derive(Serialize, Deserialize)]
struct AddPayload {
    entity: ObjectId,
    parent: Option<ObjectId>,
    index: Option<usize>,
    /// Present while the command is undone.
    subtree: Option<Detached>,
}

impl AddEntityCommand {
    pub const KIND: &'static str = "AddEntity";

    /// Add `entity` under `parent`, or as a root when `parent` is `None`.
    ///
    /// Cancelled if the parent does not exist or the id is already taken.
    pub fn new(session: &EditorSession, entity: Entity, parent: Option<ObjectId>) -> Self {
        let mut metadata = CommandMetadata::new(format!("Add {}", entity.name));
        let id = entity.id();
        if let Some(p) = parent.filter(|&p| !session.scene.contains(p)) {
            metadata.cancel(format!("parent {p} not found"));
        } else if session.scene.contains(id) {
            metadata.cancel(format!("entity {id} already exists"));
        }
        Self {
            entity: id,
            parent,
            index: None,
            pending: Some(Detached::new(entity)),
            metadata,
        }
    }

    /// Insert at `index` among the siblings instead of appending.
    #[must_use]
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Id of the added entity.
    #[must_use]
    pub fn entity(&self) -> ObjectId {
        self.entity
    }

    pub(crate) fn decode(
        stored: &StoredCommand,
        _: &CommandRegistry<EditorSession>,
    ) -> Result<Box<dyn Command<EditorSession>>, CommandError> {
        let payload: AddPayload = decode_payload(stored)?;
        if let Some(subtree) = &payload.subtree {
            check_subtree(stored, subtree)?;
        }
        Ok(Box::new(Self {
            entity: payload.entity,
            parent: payload.parent,
            index: payload.index,
            pending: payload.subtree,
            metadata: stored.metadata(),
        }))
    }
}

impl Command<EditorSession> for AddEntityCommand {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, session: &mut EditorSession) -> CommandResult {
        let id = session
            .scene
            .attach(&mut self.pending, self.parent, self.index)?;
        session.notify(names::OBJECT_ADDED, id);
        session.notify(names::SCENE_GRAPH_CHANGED, id);
        Ok(())
    }

    fn undo(&mut self, session: &mut EditorSession) -> CommandResult {
        self.pending = Some(session.scene.detach(self.entity)?);
        session.notify(names::OBJECT_REMOVED, self.entity);
        session.notify(names::SCENE_GRAPH_CHANGED, self.entity);
        Ok(())
    }

    fn purge(&mut self, session: &mut EditorSession) {
        if let Some(pending) = self.pending.take() {
            release_if_detached(&pending, session);
        }
    }

    fn emits(&self) -> Vec<SignalName> {
        vec![
            names::OBJECT_ADDED,
            names::OBJECT_REMOVED,
            names::SCENE_GRAPH_CHANGED,
        ]
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        encode_payload(&AddPayload {
            entity: self.entity,
            parent: self.parent,
            index: self.index,
            subtree: self.pending.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
