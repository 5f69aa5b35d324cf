#![forbid(unsafe_code)]

use std::any::Any;

use fedit_core::{ObjectId, SignalName, names};
use fedit_history::{
    Command, CommandError, CommandMetadata, CommandRegistry, CommandResult, MergeKey,
    StoredCommand,
};
use serde::{Deserialize, Serialize};

use super::{decode_payload, encode_payload};
use crate::scene::AttrValue;
use crate::session::EditorSession;

/// Change one attribute of an entity.
///
/// Consecutive edits of the same attribute on the same entity within the
/// merge window collapse into one history entry (typing in a field,
/// dragging a slider).
#[derive(Debug)]
pub struct SetValueCommand {
    state: SetValuePayload,
    metadata: CommandMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SetValuePayload {
    entity: ObjectId,
    attribute: String,
    old: Option<AttrValue>,
    new: Option<AttrValue>,
}

impl SetValueCommand {
    pub const KIND: &'static str = "SetValue";

    /// Set `attribute` of `entity` to `value`.
    pub fn new(
        session: &EditorSession,
        entity: ObjectId,
        attribute: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Self {
        Self::build(session, entity, attribute.into(), Some(value.into()))
    }

    /// Remove `attribute` from `entity`.
    pub fn unset(session: &EditorSession, entity: ObjectId, attribute: impl Into<String>) -> Self {
        Self::build(session, entity, attribute.into(), None)
    }

    fn build(
        session: &EditorSession,
        entity: ObjectId,
        attribute: String,
        new: Option<AttrValue>,
    ) -> Self {
        let mut metadata = CommandMetadata::new(format!("Set {attribute}"));
        let old = match session.scene.get(entity) {
            Some(e) => e.value(&attribute),
            None => {
                metadata.cancel(format!("entity {entity} not found"));
                None
            }
        };
        Self {
            state: SetValuePayload {
                entity,
                attribute,
                old,
                new,
            },
            metadata,
        }
    }

    /// Value the attribute had before the first merged edit.
    #[must_use]
    pub fn old_value(&self) -> Option<&AttrValue> {
        self.state.old.as_ref()
    }

    /// Value the attribute has after the last merged edit.
    #[must_use]
    pub fn new_value(&self) -> Option<&AttrValue> {
        self.state.new.as_ref()
    }

    fn apply(&self, session: &mut EditorSession, value: Option<AttrValue>) -> CommandResult {
        let entity = session.scene.entity_mut(self.state.entity)?;
        entity.set_value(&self.state.attribute, value);
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

impl Command<EditorSession> for SetValueCommand {
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
        Some(MergeKey::new(Self::KIND, self.state.entity).with_attribute(self.state.attribute.as_str()))
    }

    fn update(&mut self, other: &dyn Command<EditorSession>) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.state.new = other.state.new.clone();
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
