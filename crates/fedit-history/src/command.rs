#![forbid(unsafe_code)]

//! The reversible command contract.
//!
//! This module provides the [`Command`] trait every mutating editor action
//! implements, together with the metadata, merge key and error types the
//! history engine needs from it.
//!
//! # Invariants
//!
//! - `execute()` followed by `undo()` restores prior state exactly
//! - `undo()` followed by `redo()` restores the executed state exactly
//! - `purge()` is idempotent; the history calls it once per command
//! - A cancelled command is never executed by the history
//!
//! # Failure Modes
//!
//! - **Stale reference**: command targets an object that was removed
//!   - Mitigation: variants check existence at construction and cancel
//! - **Broken variant**: `execute`/`undo` returns an error
//!   - Mitigation: the error propagates to the host unchanged

use std::any::Any;
use std::fmt;

use fedit_core::{ObjectId, SignalBus, SignalName};
use web_time::Instant;

/// Access the history engine needs from the editing session.
///
/// Commands receive the session explicitly on every call instead of reaching
/// for a global editor instance.
pub trait Session {
    /// The notification bus of this session.
    fn signals(&self) -> &SignalBus;
}

/// Who or what created a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSource {
    /// Direct user action (keyboard, mouse, gizmo drag).
    #[default]
    User,
    /// Created by application code.
    Programmatic,
    /// Created by a user script.
    Script,
    /// Rebuilt from a persisted history snapshot.
    Restored,
}

/// Metadata attached to every command.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// Human-readable label for history UIs (e.g. "Set Position").
    pub label: String,
    /// When the command was created.
    pub timestamp: Instant,
    /// Who/what created the command.
    pub source: CommandSource,
    cancelled: Option<String>,
}

impl CommandMetadata {
    /// Create metadata with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timestamp: Instant::now(),
            source: CommandSource::User,
            cancelled: None,
        }
    }

    /// Set the command source.
    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = source;
        self
    }

    /// Mark the command invalid. Called from constructors whose
    /// preconditions do not hold.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.cancelled = Some(reason.into());
    }

    /// Whether the command survived construction.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.cancelled.is_none()
    }

    /// Why the command was cancelled, if it was.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancelled.as_deref()
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new("Unknown")
    }
}

/// Result of executing, undoing or redoing a command.
pub type CommandResult = Result<(), CommandError>;

/// Errors a command can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The target object no longer exists.
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),
    /// The command cannot run in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A persisted command could not be rebuilt.
    #[error("cannot decode {kind}: {reason}")]
    Decode { kind: String, reason: String },
    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Structural identity used to decide whether two commands may merge.
///
/// Built from the fields that discriminate one edit stream from another:
/// the command kind, the target object, and optionally an attribute name and
/// a sub-index. Two commands merge only if their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    kind: &'static str,
    target: ObjectId,
    attribute: Option<String>,
    index: Option<usize>,
}

impl MergeKey {
    /// Key for edits of `kind` on `target`.
    #[must_use]
    pub fn new(kind: &'static str, target: ObjectId) -> Self {
        Self {
            kind,
            target,
            attribute: None,
            index: None,
        }
    }

    /// Narrow the key to one attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Narrow the key to one element of a list-valued attribute.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// The target object.
    #[must_use]
    pub fn target(&self) -> ObjectId {
        self.target
    }
}

/// When an updatable command may merge into the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Only within the configured merge window after the last execute.
    #[default]
    TimeWindow,
    /// Whenever the merge keys match, regardless of elapsed time.
    WhileCompatible,
}

/// A reversible editor action.
///
/// Commands capture everything needed to apply and revert one action. `S` is
/// the session type carrying the domain root and the notification bus.
pub trait Command<S>: Any {
    /// Discriminant of the concrete variant, e.g. `"SetValue"`.
    fn kind(&self) -> &'static str;

    /// Get the command metadata.
    fn metadata(&self) -> &CommandMetadata;

    /// Apply the command's effect and dispatch its domain signals.
    fn execute(&mut self, session: &mut S) -> CommandResult;

    /// Revert the command's effect.
    fn undo(&mut self, session: &mut S) -> CommandResult;

    /// Re-apply after an undo.
    fn redo(&mut self, session: &mut S) -> CommandResult {
        self.execute(session)
    }

    /// Release resources the command exclusively owns.
    ///
    /// Called once when the command leaves the history for good. Must be
    /// idempotent.
    fn purge(&mut self, _session: &mut S) {}

    /// Human-readable label.
    fn label(&self) -> &str {
        &self.metadata().label
    }

    /// Whether the command survived construction.
    fn is_valid(&self) -> bool {
        self.metadata().is_valid()
    }

    /// Whether this command may absorb later compatible commands.
    fn updatable(&self) -> bool {
        false
    }

    /// Structural key compared by the history before merging.
    fn merge_key(&self) -> Option<MergeKey> {
        None
    }

    /// Whether the merge window applies to this command.
    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::TimeWindow
    }

    /// Absorb the intent of a compatible command.
    ///
    /// Returns `false` if `other` is not a command this one can absorb.
    fn update(&mut self, _other: &dyn Command<S>) -> bool {
        false
    }

    /// Signal names this command dispatches while executing or undoing.
    fn emits(&self) -> Vec<SignalName> {
        Vec::new()
    }

    /// Persisted form of the command's payload, if it can be persisted.
    fn to_json(&self) -> Option<serde_json::Value> {
        None
    }

    /// Downcast to the concrete type for merging.
    fn as_any(&self) -> &dyn Any;
}

impl<S: 'static> fmt::Debug for dyn Command<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.kind())
            .field("label", &self.label())
            .field("valid", &self.is_valid())
            .field("updatable", &self.updatable())
            .finish()
    }
}
