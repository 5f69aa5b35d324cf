#![forbid(unsafe_code)]

//! fedit public facade crate.
//!
//! Re-exports the types an editor host needs from the internal crates and
//! offers a prelude for day-to-day use. The scene domain is behind the
//! default `scene` feature; without it the crate exposes only the generic
//! history engine for hosts that bring their own domain.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use fedit_core::{
    BatchGuard, EntryInfo, MuteGuard, ObjectId, Payload, Signal, SignalBus, SignalName,
    SignalRecorder, SubscriptionId, names,
};

// --- History re-exports ----------------------------------------------------

pub use fedit_history::{
    COMPOSITE_KIND, Command, CommandError, CommandMetadata, CommandRegistry, CommandResult,
    CommandSource, CompositeBuilder, CompositeCommand, ConfigError, ExecuteOutcome, History,
    HistoryConfig, HistoryEntry, HistoryError, HistorySnapshot, Jump, MergeKey, MergePolicy,
    Session, Step, StoredCommand, UNDO_BLOCKED, make_composite,
};

// --- Scene re-exports ------------------------------------------------------

#[cfg(feature = "scene")]
pub use fedit_scene::{
    AddEntityCommand, AttrValue, Editor, EditorError, EditorSession, Entity, MeshHandle,
    MoveEntityCommand, Project, RemoveEntityCommand, ResourcePool, Scene, SceneError,
    SelectCommand, Selection, SetPositionCommand, SetScriptSourceCommand, SetValueCommand,
    add_and_select, multi_set_value, remove_selected, scene_registry,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for fedit hosts.
#[derive(Debug)]
pub enum Error {
    /// Undo/redo engine failure.
    History(HistoryError),
    /// Configuration could not be loaded.
    Config(ConfigError),
    /// Project or history file failure.
    #[cfg(feature = "scene")]
    Editor(EditorError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::History(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            #[cfg(feature = "scene")]
            Self::Editor(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::History(err) => Some(err),
            Self::Config(err) => Some(err),
            #[cfg(feature = "scene")]
            Self::Editor(err) => Some(err),
        }
    }
}

impl From<HistoryError> for Error {
    fn from(err: HistoryError) -> Self {
        Self::History(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(feature = "scene")]
impl From<EditorError> for Error {
    fn from(err: EditorError) -> Self {
        Self::Editor(err)
    }
}

/// Standard result type for fedit APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Command, CommandMetadata, CommandResult, Error, ExecuteOutcome, History, HistoryConfig,
        Jump, MergeKey, ObjectId, Result, Session, Signal, SignalBus, Step, make_composite, names,
    };

    #[cfg(feature = "scene")]
    pub use crate::{
        AddEntityCommand, Editor, EditorSession, RemoveEntityCommand, SelectCommand,
        SetPositionCommand, SetValueCommand, add_and_select, remove_selected,
    };

    pub use crate::{core, history};

    #[cfg(feature = "scene")]
    pub use crate::scene;
}

pub use fedit_core as core;
pub use fedit_history as history;
#[cfg(feature = "scene")]
pub use fedit_scene as scene;
