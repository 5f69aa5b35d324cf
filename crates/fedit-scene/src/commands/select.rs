#![forbid(unsafe_code)]

use std::any::Any;

use fedit_core::{ObjectId, Signal, SignalName, names};
use fedit_history::{Command, CommandError, CommandMetadata, CommandRegistry, CommandResult, StoredCommand};
use serde::{Deserialize, Serialize};

use super::{decode_payload, encode_payload};
use crate::session::EditorSession;

/// Change the selection.
///
/// Selection is recorded so that undoing a removal also brings back what
/// was selected before it.
#[derive(Debug)]
pub struct SelectCommand {
    state: SelectPayload,
    metadata: CommandMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SelectPayload {
    previous: Option<ObjectId>,
    next: Option<ObjectId>,
}

impl SelectCommand {
    pub const KIND: &'static str = "Select";

    /// Select `next`, or clear the selection with `None`.
    ///
    /// Cancelled if `next` names an entity that does not exist.
    pub fn new(session: &EditorSession, next: Option<ObjectId>) -> Self {
        let mut cmd = Self::anticipating(session, next);
        if let Some(id) = next.filter(|&id| !session.scene.contains(id)) {
            cmd.metadata.cancel(format!("entity {id} not found"));
        }
        cmd
    }

    /// Select an entity that an earlier command in the same transaction
    /// will create.
    pub fn anticipating(session: &EditorSession, next: Option<ObjectId>) -> Self {
        let label = if next.is_some() { "Select" } else { "Deselect" };
        Self {
            state: SelectPayload {
                previous: session.selection.selected(),
                next,
            },
            metadata: CommandMetadata::new(label),
        }
    }

    fn apply(session: &mut EditorSession, selected: Option<ObjectId>) {
        session.selection.select(selected);
        let signal = match selected {
            Some(id) => Signal::object(names::SELECTION_CHANGED, id),
            None => Signal::new(names::SELECTION_CHANGED),
        };
        session.signals.dispatch(signal);
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

impl Command<EditorSession> for SelectCommand {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, session: &mut EditorSession) -> CommandResult {
        Self::apply(session, self.state.next);
        Ok(())
    }

    fn undo(&mut self, session: &mut EditorSession) -> CommandResult {
        Self::apply(session, self.state.previous);
        Ok(())
    }

    fn emits(&self) -> Vec<SignalName> {
        vec![names::SELECTION_CHANGED]
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        encode_payload(&self.state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
