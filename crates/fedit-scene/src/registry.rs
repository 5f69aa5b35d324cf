#![forbid(unsafe_code)]

//! Decoders for persisted scene commands.

use fedit_history::CommandRegistry;

use crate::commands::{
    AddEntityCommand, MoveEntityCommand, RemoveEntityCommand, SelectCommand, SetPositionCommand,
    SetScriptSourceCommand, SetValueCommand,
};
use crate::session::EditorSession;

/// Registry that can rebuild every scene command and composites of them.
#[must_use]
pub fn scene_registry() -> CommandRegistry<EditorSession> {
    let mut registry = CommandRegistry::new();
    registry
        .register(AddEntityCommand::KIND, AddEntityCommand::decode)
        .register(RemoveEntityCommand::KIND, RemoveEntityCommand::decode)
        .register(MoveEntityCommand::KIND, MoveEntityCommand::decode)
        .register(SetValueCommand::KIND, SetValueCommand::decode)
        .register(SetPositionCommand::KIND, SetPositionCommand::decode)
        .register(SetScriptSourceCommand::KIND, SetScriptSourceCommand::decode)
        .register(SelectCommand::KIND, SelectCommand::decode);
    registry
}
