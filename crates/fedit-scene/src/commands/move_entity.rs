#![forbid(unsafe_code)]

use std::any::Any;

use fedit_core::{ObjectId, SignalName, names};
use fedit_history::{Command, CommandError, CommandMetadata, CommandRegistry, CommandResult, StoredCommand};
use serde::{Deserialize, Serialize};

use super::{decode_payload, encode_payload};
use crate::session::EditorSession;

/// Reparent an entity, or reorder it among its siblings.
#[derive(Debug)]
pub struct MoveEntityCommand {
    state: MovePayload,
    metadata: CommandMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MovePayload {
    entity: ObjectId,
    parent: Option<ObjectId>,
    index: Option<usize>,
    from_parent: Option<ObjectId>,
    from_index: usize,
}

impl MoveEntityCommand {
    pub const KIND: &'static str = "MoveEntity";

    /// Move `entity` under `parent` (a root when `None`), appended, or at
    /// `index` when given.
    ///
    /// Cancelled if either entity is missing or the move would put the
    /// entity under itself.
    pub fn new(
        session: &EditorSession,
        entity: ObjectId,
        parent: Option<ObjectId>,
        index: Option<usize>,
    ) -> Self {
        let scene = &session.scene;
        let mut metadata = CommandMetadata::new(match scene.get(entity) {
            Some(e) => format!("Move {}", e.name),
            None => "Move".to_owned(),
        });
        let (from_parent, from_index) = match scene.location(entity) {
            Ok(location) => location,
            Err(err) => {
                metadata.cancel(err.to_string());
                (None, 0)
            }
        };
        if let Some(p) = parent.filter(|_| metadata.is_valid()) {
            if !scene.contains(p) {
                metadata.cancel(format!("parent {p} not found"));
            } else if scene.is_ancestor(entity, p) {
                metadata.cancel(format!("cannot move {entity} under its own descendant {p}"));
            }
        }
        Self {
            state: MovePayload {
                entity,
                parent,
                index,
                from_parent,
                from_index,
            },
            metadata,
        }
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

impl Command<EditorSession> for MoveEntityCommand {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, session: &mut EditorSession) -> CommandResult {
        let (from_parent, from_index) =
            session
                .scene
                .reparent(self.state.entity, self.state.parent, self.state.index)?;
        self.state.from_parent = from_parent;
        self.state.from_index = from_index;
        session.notify(names::SCENE_GRAPH_CHANGED, self.state.entity);
        Ok(())
    }

    fn undo(&mut self, session: &mut EditorSession) -> CommandResult {
        session.scene.reparent(
            self.state.entity,
            self.state.from_parent,
            Some(self.state.from_index),
        )?;
        session.notify(names::SCENE_GRAPH_CHANGED, self.state.entity);
        Ok(())
    }

    fn emits(&self) -> Vec<SignalName> {
        vec![names::SCENE_GRAPH_CHANGED]
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        encode_payload(&self.state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
