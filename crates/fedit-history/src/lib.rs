#![forbid(unsafe_code)]

//! Undo/redo command history for fedit.
//!
//! This crate provides the reversible-action engine the editor runs every
//! mutation through. It implements the Command pattern with support for:
//!
//! - **Reversibility**: every command can be undone and redone
//! - **Merging**: consecutive compatible edits fold into one entry
//! - **Transactions**: composites apply several commands as one step and
//!   coalesce their notifications
//! - **Replay**: jump to any recorded state by id
//! - **Persistence**: snapshot both stacks to JSON and restore them
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          History                                │
//! │  ┌──────────────────┐          ┌──────────────────┐             │
//! │  │   Undo Stack     │          │   Redo Stack     │             │
//! │  │  ┌────────────┐  │          │  ┌────────────┐  │             │
//! │  │  │ #N         │  │  undo()  │  │ #N+1       │  │             │
//! │  │  ├────────────┤  │ ──────►  │  ├────────────┤  │             │
//! │  │  │ #2         │  │          │  │ ...        │  │             │
//! │  │  ├────────────┤  │  ◄────── │  ├────────────┤  │             │
//! │  │  │ #1         │  │  redo()  │  │ #M         │  │             │
//! │  │  └────────────┘  │          │  └────────────┘  │             │
//! │  └──────────────────┘          └──────────────────┘             │
//! │            │ historyChanged                                     │
//! │            ▼                                                    │
//! │        SignalBus ◄── objectChanged, sceneGraphChanged, ...      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use fedit_history::{History, HistoryConfig};
//!
//! let mut history = History::new(HistoryConfig::default());
//! history.execute(Box::new(SetValueCommand::new(&session, id, "name", "Crate")), &mut session)?;
//! history.undo(&mut session)?;
//! history.redo(&mut session)?;
//! ```
//!
//! # Module Structure
//!
//! - [`command`]: the [`Command`] trait, metadata, merge keys and errors
//! - [`composite`]: [`CompositeCommand`] and the [`make_composite`] factory
//! - [`history`]: the [`History`] engine
//! - [`config`]: [`HistoryConfig`] loading and validation
//! - [`persist`]: snapshots and the [`CommandRegistry`]
//!
//! # Merge Strategy
//!
//! Dragging a gizmo produces dozens of position edits per second; undo should
//! revert the whole drag. An updatable command merges into the undo top when
//! both carry equal merge keys and the top was executed less than the merge
//! window (500 ms default) ago. Kinds with [`MergePolicy::WhileCompatible`],
//! like script source edits, merge regardless of elapsed time.

pub mod command;
pub mod composite;
pub mod config;
pub mod history;
pub mod persist;

#[cfg(test)]
mod testing;

pub use command::{
    Command, CommandError, CommandMetadata, CommandResult, CommandSource, MergeKey, MergePolicy,
    Session,
};
pub use composite::{COMPOSITE_KIND, CompositeBuilder, CompositeCommand, Hook, make_composite};
pub use config::{ConfigError, HistoryConfig};
pub use history::{
    ExecuteOutcome, History, HistoryEntry, HistoryError, Jump, Step, UNDO_BLOCKED,
};
pub use persist::{CommandRegistry, Decoder, HistorySnapshot, SNAPSHOT_VERSION, StoredCommand};
