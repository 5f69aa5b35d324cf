#![forbid(unsafe_code)]

use std::any::Any;

use fedit_core::{ObjectId, SignalName, names};
use fedit_history::{
    Command, CommandError, CommandMetadata, CommandRegistry, CommandResult, MergeKey,
    MergePolicy, StoredCommand,
};
use serde::{Deserialize, Serialize};

use super::{decode_payload, encode_payload};
use crate::session::EditorSession;

/// Replace the source text of one script on an entity.
///
/// Edits to the same script merge for as long as nothing else is recorded
/// in between, so a typing session becomes a single undo step regardless of
/// pauses.
#[derive(Debug)]
pub struct SetScriptSourceCommand {
    state: ScriptPayload,
    metadata: CommandMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScriptPayload {
    entity: ObjectId,
    index: usize,
    old: String,
    new: String,
}

impl SetScriptSourceCommand {
    pub const KIND: &'static str = "SetScriptSource";

    /// Set script `index` of `entity` to `source`.
    ///
    /// Cancelled if the entity or the script does not exist.
    pub fn new(
        session: &EditorSession,
        entity: ObjectId,
        index: usize,
        source: impl Into<String>,
    ) -> Self {
        let script = session
            .scene
            .get(entity)
            .and_then(|e| e.scripts.get(index));
        let mut metadata = CommandMetadata::new(match script {
            Some(s) => format!("Edit {}", s.name),
            None => "Edit Script".to_owned(),
        });
        let old = match script {
            Some(s) => s.source.clone(),
            None => {
                metadata.cancel(format!("entity {entity} has no script #{index}"));
                String::new()
            }
        };
        Self {
            state: ScriptPayload {
                entity,
                index,
                old,
                new: source.into(),
            },
            metadata,
        }
    }

    fn apply(&self, session: &mut EditorSession, source: String) -> CommandResult {
        session
            .scene
            .set_script_source(self.state.entity, self.state.index, source)?;
        session.notify(names::SCRIPT_CHANGED, self.state.entity);
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

impl Command<EditorSession> for SetScriptSourceCommand {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, session: &mut EditorSession) -> CommandResult {
        self.apply(session, self.state.new.clone())
    }

    fn undo(&mut self, session: &mut EditorSession) -> CommandResult {
        self.apply(session, self.state.old.clone())
    }

    fn updatable(&self) -> bool {
        true
    }

    fn merge_key(&self) -> Option<MergeKey> {
        Some(
            MergeKey::new(Self::KIND, self.state.entity)
                .with_attribute("source")
                .with_index(self.state.index),
        )
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::WhileCompatible
    }

    fn update(&mut self, other: &dyn Command<EditorSession>) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.state.new.clone_from(&other.state.new);
        true
    }

    fn emits(&self) -> Vec<SignalName> {
        vec![names::SCRIPT_CHANGED]
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        encode_payload(&self.state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
