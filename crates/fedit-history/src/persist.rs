#![forbid(unsafe_code)]

//! Persisted form of a history.
//!
//! A [`HistorySnapshot`] stores both stacks as plain JSON values. Commands
//! opt in by returning a payload from [`Command::to_json`]; a
//! [`CommandRegistry`] maps each kind tag back to a decoder when the snapshot
//! is restored.
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_id": 3,
//!   "undo": [{ "id": 1, "kind": "SetValue", "label": "Set name", "payload": {} }],
//!   "redo": []
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{Command, CommandError, CommandMetadata, CommandSource, Session};
use crate::composite::{COMPOSITE_KIND, CompositeCommand};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One command in persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCommand {
    /// History id. Absent for children of a composite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Kind tag used to find the decoder.
    pub kind: String,
    /// Human-readable label.
    pub label: String,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: Value,
}

impl StoredCommand {
    /// Capture `cmd`, or `None` if it cannot be persisted.
    pub fn capture<S: 'static>(cmd: &dyn Command<S>, id: Option<u64>) -> Option<Self> {
        Some(Self {
            id,
            kind: cmd.kind().to_owned(),
            label: cmd.label().to_owned(),
            payload: cmd.to_json()?,
        })
    }

    /// Metadata for a command rebuilt from this record.
    #[must_use]
    pub fn metadata(&self) -> CommandMetadata {
        CommandMetadata::new(self.label.clone()).with_source(CommandSource::Restored)
    }
}

/// Both stacks of a history in persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Last id handed out.
    pub next_id: u64,
    /// Undo stack, bottom to top.
    pub undo: Vec<StoredCommand>,
    /// Redo stack, next redo first.
    #[serde(default)]
    pub redo: Vec<StoredCommand>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl HistorySnapshot {
    /// Serialize as pretty JSON.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Total number of stored commands on both stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.undo.len() + self.redo.len()
    }

    /// Whether both stacks are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty() && self.redo.is_empty()
    }
}

/// Rebuilds one command from its stored form.
///
/// The registry is passed along so container kinds can decode children.
pub type Decoder<S> =
    fn(&StoredCommand, &CommandRegistry<S>) -> Result<Box<dyn Command<S>>, CommandError>;

/// Maps kind tags to decoders.
pub struct CommandRegistry<S> {
    decoders: HashMap<&'static str, Decoder<S>>,
}

impl<S> fmt::Debug for CommandRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.decoders.keys().collect();
        kinds.sort();
        f.debug_struct("CommandRegistry").field("kinds", &kinds).finish()
    }
}

impl<S: Session + 'static> Default for CommandRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Session + 'static> CommandRegistry<S> {
    /// A registry that already knows composites.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };
        registry.register(COMPOSITE_KIND, CompositeCommand::<S>::decode);
        registry
    }

    /// Register (or replace) the decoder for `kind`.
    pub fn register(&mut self, kind: &'static str, decoder: Decoder<S>) -> &mut Self {
        self.decoders.insert(kind, decoder);
        self
    }

    /// Whether a decoder exists for `kind`.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Rebuild a command.
    pub fn decode_command(&self, stored: &StoredCommand) -> Result<Box<dyn Command<S>>, CommandError> {
        let decoder = self
            .decoders
            .get(stored.kind.as_str())
            .ok_or_else(|| CommandError::Decode {
                kind: stored.kind.clone(),
                reason: "no decoder registered".into(),
            })?;
        decoder(stored, self)
    }
}
