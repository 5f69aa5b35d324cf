#![forbid(unsafe_code)]

//! Composite commands: several commands applied and reverted as one unit.
//!
//! A gesture such as "add an entity and select it" is two commands but one
//! undo step. [`CompositeCommand`] owns its children exclusively, runs them in
//! list order on execute and in exact reverse order on undo, and batches the
//! signals they dispatch so the host sees one notification per distinct
//! (signal, object) pair instead of one per child.
//!
//! Build composites through [`make_composite`] or [`CompositeBuilder`]. Both
//! purge and drop invalid children, and both return the lone surviving child
//! unwrapped when no hooks were given.
//!
//! ```text
//! execute:  batch(emits) ─► c1.execute ─► c2.execute ─► hook ─► flush
//! undo:     batch(emits) ─► c2.undo    ─► c1.undo    ─► hook ─► flush
//! ```

use std::any::Any;
use std::fmt;

use fedit_core::SignalName;
use serde_json::Value;
use tracing::debug;

use crate::command::{Command, CommandError, CommandMetadata, CommandResult, Session};
use crate::persist::{CommandRegistry, StoredCommand};

/// Kind tag of [`CompositeCommand`].
pub const COMPOSITE_KIND: &str = "Composite";

/// Callback run after the children of a composite.
pub type Hook<S> = Box<dyn FnMut(&mut S) -> CommandResult>;

/// An ordered bundle of commands executed and undone as one transaction.
pub struct CompositeCommand<S> {
    /// Children in execution order.
    commands: Vec<Box<dyn Command<S>>>,
    metadata: CommandMetadata,
    after_execute: Option<Hook<S>>,
    after_undo: Option<Hook<S>>,
}

impl<S> fmt::Debug for CompositeCommand<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCommand")
            .field("commands_count", &self.commands.len())
            .field("metadata", &self.metadata)
            .field("has_after_execute", &self.after_execute.is_some())
            .field("has_after_undo", &self.after_undo.is_some())
            .finish()
    }
}

impl<S: Session + 'static> CompositeCommand<S> {
    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the composite has no children (and is therefore invalid).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Labels of the children in execution order.
    pub fn child_labels(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.label()).collect()
    }

    /// Rebuild a composite from its persisted form.
    pub fn decode(
        stored: &StoredCommand,
        registry: &CommandRegistry<S>,
    ) -> Result<Box<dyn Command<S>>, CommandError> {
        let children: Vec<StoredCommand> =
            serde_json::from_value(stored.payload.clone()).map_err(|e| CommandError::Decode {
                kind: stored.kind.clone(),
                reason: e.to_string(),
            })?;
        let commands = children
            .iter()
            .map(|child| registry.decode_command(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(Self {
            commands,
            metadata: stored.metadata(),
            after_execute: None,
            after_undo: None,
        }))
    }
}

impl<S: Session + 'static> Command<S> for CompositeCommand<S> {
    fn kind(&self) -> &'static str {
        COMPOSITE_KIND
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, session: &mut S) -> CommandResult {
        let _batch = session.signals().batch(&self.emits());
        for cmd in &mut self.commands {
            cmd.execute(session)?;
        }
        if let Some(hook) = self.after_execute.as_mut() {
            hook(session)?;
        }
        Ok(())
    }

    fn undo(&mut self, session: &mut S) -> CommandResult {
        let _batch = session.signals().batch(&self.emits());
        for cmd in self.commands.iter_mut().rev() {
            cmd.undo(session)?;
        }
        if let Some(hook) = self.after_undo.as_mut() {
            hook(session)?;
        }
        Ok(())
    }

    fn redo(&mut self, session: &mut S) -> CommandResult {
        let _batch = session.signals().batch(&self.emits());
        for cmd in &mut self.commands {
            cmd.redo(session)?;
        }
        if let Some(hook) = self.after_execute.as_mut() {
            hook(session)?;
        }
        Ok(())
    }

    fn purge(&mut self, session: &mut S) {
        for cmd in &mut self.commands {
            cmd.purge(session);
        }
    }

    fn emits(&self) -> Vec<SignalName> {
        let mut names = Vec::new();
        for name in self.commands.iter().flat_map(|c| c.emits()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn to_json(&self) -> Option<Value> {
        if self.after_execute.is_some() || self.after_undo.is_some() {
            return None;
        }
        let children = self
            .commands
            .iter()
            .map(|c| StoredCommand::capture(c.as_ref(), None))
            .collect::<Option<Vec<_>>>()?;
        serde_json::to_value(children).ok()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder for composite commands with optional hooks.
pub struct CompositeBuilder<S> {
    label: String,
    commands: Vec<Box<dyn Command<S>>>,
    after_execute: Option<Hook<S>>,
    after_undo: Option<Hook<S>>,
}

impl<S> fmt::Debug for CompositeBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeBuilder")
            .field("label", &self.label)
            .field("commands_count", &self.commands.len())
            .finish()
    }
}

impl<S: Session + 'static> CompositeBuilder<S> {
    /// Start a composite with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
            after_execute: None,
            after_undo: None,
        }
    }

    /// Append a child.
    pub fn push(&mut self, cmd: Box<dyn Command<S>>) {
        self.commands.push(cmd);
    }

    /// Append a child (builder form).
    #[must_use]
    pub fn with(mut self, cmd: Box<dyn Command<S>>) -> Self {
        self.commands.push(cmd);
        self
    }

    /// Run `f` after the children execute or redo.
    #[must_use]
    pub fn after_execute<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S) -> CommandResult + 'static,
    {
        self.after_execute = Some(Box::new(f));
        self
    }

    /// Run `f` after the children are undone.
    #[must_use]
    pub fn after_undo<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S) -> CommandResult + 'static,
    {
        self.after_undo = Some(Box::new(f));
        self
    }

    /// Finish construction.
    ///
    /// Invalid children are purged and dropped. With no survivors the result
    /// is a cancelled composite; with one survivor and no hooks the survivor
    /// itself is returned.
    pub fn build(self, session: &mut S) -> Box<dyn Command<S>> {
        let Self {
            label,
            commands,
            after_execute,
            after_undo,
        } = self;

        let mut survivors = Vec::with_capacity(commands.len());
        for mut cmd in commands {
            if cmd.is_valid() {
                survivors.push(cmd);
            } else {
                debug!(
                    kind = cmd.kind(),
                    reason = cmd.metadata().cancel_reason().unwrap_or_default(),
                    "dropping cancelled child"
                );
                cmd.purge(session);
            }
        }

        let has_hooks = after_execute.is_some() || after_undo.is_some();
        if survivors.len() == 1 && !has_hooks {
            if let Some(only) = survivors.pop() {
                return only;
            }
        }

        let mut metadata = CommandMetadata::new(label);
        if survivors.is_empty() {
            metadata.cancel("no valid commands");
        }
        Box::new(CompositeCommand {
            commands: survivors,
            metadata,
            after_execute,
            after_undo,
        })
    }
}

/// Bundle `commands` into one undo step.
///
/// See [`CompositeBuilder::build`] for how invalid children and single
/// survivors are handled.
pub fn make_composite<S: Session + 'static>(
    label: impl Into<String>,
    commands: impl IntoIterator<Item = Box<dyn Command<S>>>,
    session: &mut S,
) -> Box<dyn Command<S>> {
    let mut builder = CompositeBuilder::new(label);
    for cmd in commands {
        builder.push(cmd);
    }
    builder.build(session)
}
