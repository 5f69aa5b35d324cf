#![forbid(unsafe_code)]

//! Multi-command editor gestures.
//!
//! Each helper bundles the commands one user action produces into a single
//! undo step. The result goes to [`History::execute`](fedit_history::History::execute)
//! like any other command.

use fedit_core::ObjectId;
use fedit_history::{Command, CompositeBuilder, make_composite};

use crate::commands::{AddEntityCommand, RemoveEntityCommand, SelectCommand, SetValueCommand};
use crate::scene::{AttrValue, Entity};
use crate::session::EditorSession;

/// Add `entity` under `parent` and select it.
///
/// When the add is cancelled the whole gesture is: the cancelled add is
/// returned alone so the history discards it.
pub fn add_and_select(
    session: &mut EditorSession,
    entity: Entity,
    parent: Option<ObjectId>,
) -> Box<dyn Command<EditorSession>> {
    let label = format!("Add {}", entity.name);
    let add = AddEntityCommand::new(session, entity, parent);
    if !add.is_valid() {
        return Box::new(add);
    }
    let select = SelectCommand::anticipating(session, Some(add.entity()));
    CompositeBuilder::new(label)
        .with(Box::new(add))
        .with(Box::new(select))
        .build(session)
}

/// Deselect and remove the selected entity.
///
/// Returns `None` when nothing is selected.
pub fn remove_selected(session: &mut EditorSession) -> Option<Box<dyn Command<EditorSession>>> {
    let id = session.selection.selected()?;
    let label = session
        .scene
        .get(id)
        .map_or_else(|| "Remove".to_owned(), |e| format!("Remove {}", e.name));
    let deselect = SelectCommand::new(session, None);
    let remove = RemoveEntityCommand::new(session, id);
    Some(
        CompositeBuilder::new(label)
            .with(Box::new(deselect))
            .with(Box::new(remove))
            .build(session),
    )
}

/// Set `attribute` to `value` on every entity in `ids` as one step.
///
/// Missing entities are skipped.
pub fn multi_set_value(
    session: &mut EditorSession,
    ids: &[ObjectId],
    attribute: &str,
    value: impl Into<AttrValue>,
) -> Box<dyn Command<EditorSession>> {
    let value = value.into();
    let commands: Vec<Box<dyn Command<EditorSession>>> = ids
        .iter()
        .map(|&id| {
            Box::new(SetValueCommand::new(session, id, attribute, value.clone()))
                as Box<dyn Command<EditorSession>>
        })
        .collect();
    let label = format!("Set {attribute} on {} objects", commands.len());
    make_composite(label, commands, session)
}
