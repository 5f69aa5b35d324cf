#![forbid(unsafe_code)]

//! Undo/redo history with merging and state-addressed replay.
//!
//! [`History`] owns two stacks of executed commands. Every top-level command
//! pushed onto the undo stack gets a fresh id; history UIs address states by
//! those ids through [`History::go_to_state`].
//!
//! - **Merging**: an updatable command whose [`MergeKey`](crate::MergeKey)
//!   equals the undo top's is folded into it instead of pushed, within the
//!   merge window or always for [`MergePolicy::WhileCompatible`] kinds
//! - **Branching**: a new command purges the redo stack
//! - **Depth limit**: the oldest entries are purged once `max_depth` is hit
//! - **Playback guard**: while disabled, undo/redo/jump are refused
//!
//! # Invariants
//!
//! 1. Ids on the undo stack strictly increase bottom to top
//! 2. Every command handed to the history is purged exactly once
//! 3. A cancelled command never reaches a stack
//! 4. Every mutating call dispatches at most one `historyChanged`
//!
//! ```text
//! execute(#5)
//! ┌───────────────────────────────────────┐
//! │ Undo Stack: [#1, #2, #3, #4, #5]      │
//! │ Redo Stack: []                        │
//! └───────────────────────────────────────┘
//!
//! go_to_state(2)          <-- three undos, one notification
//! ┌───────────────────────────────────────┐
//! │ Undo Stack: [#1, #2]                  │
//! │ Redo Stack: [#5, #4, #3]              │
//! └───────────────────────────────────────┘
//!
//! execute(#6)             <-- new branch, purges #3..#5
//! ┌───────────────────────────────────────┐
//! │ Undo Stack: [#1, #2, #6]              │
//! │ Redo Stack: []                        │
//! └───────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;

use fedit_core::{EntryInfo, Payload, Signal, names};
use tracing::{debug, debug_span, trace, warn};
use web_time::Instant;

use crate::command::{Command, CommandError, MergePolicy, Session};
use crate::config::HistoryConfig;
use crate::persist::{CommandRegistry, HistorySnapshot, SNAPSHOT_VERSION, StoredCommand};

/// Notice returned when undo is refused during playback.
pub const UNDO_BLOCKED: &str = "undo/redo disabled while the scene is playing";

/// Errors reported by [`History`].
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A command failed to execute, undo or redo.
    #[error("command failed: {0}")]
    Command(#[from] CommandError),
    /// A command on the stacks cannot be persisted.
    #[error("command {0} cannot be persisted")]
    NotPersistable(&'static str),
    /// A snapshot names a kind the registry does not know.
    #[error("no decoder for command kind {0}")]
    UnknownKind(String),
    /// A snapshot is internally inconsistent.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
    /// A snapshot could not be (de)serialized.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only view of one history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// History id.
    pub id: u64,
    /// Command kind tag.
    pub kind: &'static str,
    /// Human-readable label.
    pub label: String,
    /// Whether the command is currently applied (on the undo stack).
    pub in_memory: bool,
}

impl HistoryEntry {
    /// Summary carried by `historyChanged`.
    #[must_use]
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            id: self.id,
            kind: self.kind.to_owned(),
            label: self.label.clone(),
        }
    }
}

/// What [`History::execute`] did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Executed and pushed as a new entry.
    Pushed {
        /// Id of the new entry.
        id: u64,
    },
    /// Folded into the existing undo top.
    Merged {
        /// Id of the entry that absorbed the command.
        id: u64,
    },
    /// Cancelled at construction; purged and dropped.
    Discarded,
}

impl ExecuteOutcome {
    /// Id of the affected entry, if any.
    #[must_use]
    pub fn id(self) -> Option<u64> {
        match self {
            Self::Pushed { id } | Self::Merged { id } => Some(id),
            Self::Discarded => None,
        }
    }
}

/// Result of a single undo or redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The entry was moved to the other stack.
    Applied(HistoryEntry),
    /// Nothing to undo or redo.
    Empty,
    /// Refused; carries a user-facing notice.
    Blocked(String),
}

/// Result of [`History::go_to_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jump {
    /// The history walked to the requested state.
    Moved {
        /// Entries undone.
        undone: usize,
        /// Entries redone.
        redone: usize,
        /// Id of the new undo top.
        current: Option<u64>,
    },
    /// Refused; carries a user-facing notice.
    Blocked(String),
}

struct Frame<S> {
    id: u64,
    command: Box<dyn Command<S>>,
}

impl<S: 'static> Frame<S> {
    fn entry(&self, in_memory: bool) -> HistoryEntry {
        HistoryEntry {
            id: self.id,
            kind: self.command.kind(),
            label: self.command.label().to_owned(),
            in_memory,
        }
    }
}

/// Undo/redo history for commands over session type `S`.
pub struct History<S> {
    /// Applied commands (newest at back).
    undo_stack: VecDeque<Frame<S>>,
    /// Undone commands (next to redo at back).
    redo_stack: VecDeque<Frame<S>>,
    config: HistoryConfig,
    /// Last id handed out.
    next_id: u64,
    /// When the undo top was last executed. `None` once it was undone,
    /// redone or restored, which also stops merging into it.
    last_execute: Option<Instant>,
    disabled: bool,
}

impl<S: 'static> fmt::Debug for History<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("next_id", &self.next_id)
            .field("disabled", &self.disabled)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: Session + 'static> Default for History<S> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl<S: Session + 'static> History<S> {
    /// Create an empty history.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            config,
            next_id: 0,
            last_execute: None,
            disabled: false,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Execute `cmd` and record it.
    pub fn execute(
        &mut self,
        cmd: Box<dyn Command<S>>,
        session: &mut S,
    ) -> Result<ExecuteOutcome, HistoryError> {
        self.execute_at(cmd, session, Instant::now())
    }

    /// Execute `cmd` as if the clock read `now`.
    ///
    /// `now` only feeds the merge window.
    pub fn execute_at(
        &mut self,
        mut cmd: Box<dyn Command<S>>,
        session: &mut S,
        now: Instant,
    ) -> Result<ExecuteOutcome, HistoryError> {
        if !cmd.is_valid() {
            debug!(
                kind = cmd.kind(),
                reason = cmd.metadata().cancel_reason().unwrap_or_default(),
                "discarding cancelled command"
            );
            cmd.purge(session);
            return Ok(ExecuteOutcome::Discarded);
        }

        let outcome = match self.try_merge(cmd, session, now)? {
            Ok(id) => {
                trace!(id, "command merged into undo top");
                ExecuteOutcome::Merged { id }
            }
            Err(mut cmd) => {
                if let Err(err) = cmd.execute(session) {
                    cmd.purge(session);
                    return Err(err.into());
                }
                self.next_id += 1;
                let id = self.next_id;
                debug!(id, kind = cmd.kind(), label = cmd.label(), "command pushed");
                self.undo_stack.push_back(Frame { id, command: cmd });
                ExecuteOutcome::Pushed { id }
            }
        };

        self.clear_redo(session);
        self.last_execute = Some(now);
        self.enforce_depth(session);
        self.notify_top(session);
        Ok(outcome)
    }

    /// Undo the newest applied command.
    pub fn undo(&mut self, session: &mut S) -> Result<Step, HistoryError> {
        if self.disabled {
            warn!(notice = UNDO_BLOCKED, "undo refused");
            return Ok(Step::Blocked(UNDO_BLOCKED.to_owned()));
        }
        let Some(mut frame) = self.undo_stack.pop_back() else {
            return Ok(Step::Empty);
        };
        if let Err(err) = frame.command.undo(session) {
            self.undo_stack.push_back(frame);
            return Err(err.into());
        }
        self.last_execute = None;
        let entry = frame.entry(false);
        debug!(id = entry.id, kind = entry.kind, "command undone");
        self.redo_stack.push_back(frame);
        Self::notify(session, Payload::Entry(entry.info()));
        Ok(Step::Applied(entry))
    }

    /// Redo the most recently undone command.
    pub fn redo(&mut self, session: &mut S) -> Result<Step, HistoryError> {
        if self.disabled {
            warn!(notice = UNDO_BLOCKED, "redo refused");
            return Ok(Step::Blocked(UNDO_BLOCKED.to_owned()));
        }
        let Some(mut frame) = self.redo_stack.pop_back() else {
            return Ok(Step::Empty);
        };
        if let Err(err) = frame.command.redo(session) {
            self.redo_stack.push_back(frame);
            return Err(err.into());
        }
        self.last_execute = None;
        let entry = frame.entry(true);
        debug!(id = entry.id, kind = entry.kind, "command redone");
        self.undo_stack.push_back(frame);
        Self::notify(session, Payload::Entry(entry.info()));
        Ok(Step::Applied(entry))
    }

    /// Walk the stacks until the entry with id `target` is the undo top.
    ///
    /// `target = 0` undoes everything. Intermediate `historyChanged` and
    /// `sceneGraphChanged` signals are muted; one of each is dispatched at the
    /// end.
    pub fn go_to_state(&mut self, target: u64, session: &mut S) -> Result<Jump, HistoryError> {
        if self.disabled {
            warn!(notice = UNDO_BLOCKED, target_id = target, "jump refused");
            return Ok(Jump::Blocked(UNDO_BLOCKED.to_owned()));
        }

        let span = debug_span!(
            "history.go_to_state",
            target_id = target,
            undone = tracing::field::Empty,
            redone = tracing::field::Empty
        );
        let _enter = span.enter();

        let (mut undone, mut redone) = (0, 0);
        let walked = {
            let _mute = session
                .signals()
                .mute(&[names::HISTORY_CHANGED, names::SCENE_GRAPH_CHANGED]);
            self.walk_to(target, session, &mut undone, &mut redone)
        };

        span.record("undone", undone);
        span.record("redone", redone);
        if undone + redone > 0 {
            self.last_execute = None;
        }
        session.signals().emit(names::SCENE_GRAPH_CHANGED);
        self.notify_top(session);
        walked?;

        Ok(Jump::Moved {
            undone,
            redone,
            current: self.current_id(),
        })
    }

    fn walk_to(
        &mut self,
        target: u64,
        session: &mut S,
        undone: &mut usize,
        redone: &mut usize,
    ) -> Result<(), HistoryError> {
        while self.undo_stack.back().is_some_and(|f| f.id > target) {
            let Some(mut frame) = self.undo_stack.pop_back() else {
                break;
            };
            if let Err(err) = frame.command.undo(session) {
                self.undo_stack.push_back(frame);
                return Err(err.into());
            }
            self.redo_stack.push_back(frame);
            *undone += 1;
        }
        while self.redo_stack.back().is_some_and(|f| f.id <= target) {
            let Some(mut frame) = self.redo_stack.pop_back() else {
                break;
            };
            if let Err(err) = frame.command.redo(session) {
                self.redo_stack.push_back(frame);
                return Err(err.into());
            }
            self.undo_stack.push_back(frame);
            *redone += 1;
        }
        Ok(())
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.disabled && !self.undo_stack.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.disabled && !self.redo_stack.is_empty()
    }

    /// Refuse undo, redo and jumps while `disabled` (scene playback).
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Whether undo/redo are currently refused.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Number of applied entries.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of undone entries.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Id of the undo top, i.e. the current state.
    #[must_use]
    pub fn current_id(&self) -> Option<u64> {
        self.undo_stack.back().map(|f| f.id)
    }

    /// All entries in chronological order.
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let mut entries = self.undo_entries();
        entries.extend(self.redo_entries());
        entries
    }

    /// Applied entries, oldest first.
    #[must_use]
    pub fn undo_entries(&self) -> Vec<HistoryEntry> {
        self.undo_stack.iter().map(|f| f.entry(true)).collect()
    }

    /// Undone entries, next to redo first.
    #[must_use]
    pub fn redo_entries(&self) -> Vec<HistoryEntry> {
        self.redo_stack.iter().rev().map(|f| f.entry(false)).collect()
    }

    /// Label of the next undo, if any.
    #[must_use]
    pub fn next_undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|f| f.command.label())
    }

    /// Label of the next redo, if any.
    #[must_use]
    pub fn next_redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|f| f.command.label())
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Purge and drop every entry. Ids start over at 1.
    pub fn clear(&mut self, session: &mut S) {
        self.purge_all(session);
        self.next_id = 0;
        self.last_execute = None;
        debug!("history cleared");
        Self::notify(session, Payload::Empty);
    }

    fn purge_all(&mut self, session: &mut S) {
        for mut frame in self.undo_stack.drain(..).chain(self.redo_stack.drain(..)) {
            frame.command.purge(session);
        }
    }

    /// Purge the redo stack.
    fn clear_redo(&mut self, session: &mut S) {
        if self.redo_stack.is_empty() {
            return;
        }
        trace!(count = self.redo_stack.len(), "purging redo branch");
        for mut frame in self.redo_stack.drain(..) {
            frame.command.purge(session);
        }
    }

    /// Purge the oldest entries beyond `max_depth`.
    fn enforce_depth(&mut self, session: &mut S) {
        while self.undo_stack.len() > self.config.max_depth {
            if let Some(mut frame) = self.undo_stack.pop_front() {
                trace!(id = frame.id, "evicting oldest entry");
                frame.command.purge(session);
            }
        }
    }

    /// Fold `cmd` into the undo top if eligible.
    ///
    /// Returns `Ok(id)` if merged, `Err(cmd)` if not merged.
    #[allow(clippy::type_complexity)]
    fn try_merge(
        &mut self,
        mut cmd: Box<dyn Command<S>>,
        session: &mut S,
        now: Instant,
    ) -> Result<Result<u64, Box<dyn Command<S>>>, HistoryError> {
        if !self.can_merge(cmd.as_ref(), now) {
            return Ok(Err(cmd));
        }
        let Some(top) = self.undo_stack.back_mut() else {
            return Ok(Err(cmd));
        };
        if !top.command.update(cmd.as_ref()) {
            return Ok(Err(cmd));
        }
        let result = top.command.execute(session);
        let id = top.id;
        cmd.purge(session);
        result?;
        Ok(Ok(id))
    }

    fn can_merge(&self, cmd: &dyn Command<S>, now: Instant) -> bool {
        let (Some(top), Some(last)) = (self.undo_stack.back(), self.last_execute) else {
            return false;
        };
        if !top.command.updatable() || !cmd.updatable() {
            return false;
        }
        match (top.command.merge_key(), cmd.merge_key()) {
            (Some(a), Some(b)) if a == b => {}
            _ => return false,
        }
        match cmd.merge_policy() {
            MergePolicy::WhileCompatible => true,
            MergePolicy::TimeWindow => {
                now.saturating_duration_since(last) < self.config.merge_window()
            }
        }
    }

    fn notify_top(&self, session: &S) {
        let payload = self
            .undo_stack
            .back()
            .map_or(Payload::Empty, |f| Payload::Entry(f.entry(true).info()));
        Self::notify(session, payload);
    }

    fn notify(session: &S, payload: Payload) {
        session
            .signals()
            .dispatch(Signal::with_payload(names::HISTORY_CHANGED, payload));
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Capture both stacks.
    pub fn snapshot(&self) -> Result<HistorySnapshot, HistoryError> {
        let capture = |frame: &Frame<S>| {
            StoredCommand::capture(frame.command.as_ref(), Some(frame.id))
                .ok_or(HistoryError::NotPersistable(frame.command.kind()))
        };
        Ok(HistorySnapshot {
            version: SNAPSHOT_VERSION,
            next_id: self.next_id,
            undo: self.undo_stack.iter().map(capture).collect::<Result<_, _>>()?,
            redo: self
                .redo_stack
                .iter()
                .rev()
                .map(capture)
                .collect::<Result<_, _>>()?,
        })
    }

    /// Replace the contents with `snapshot`.
    ///
    /// Nothing changes if the snapshot fails to decode or validate. The
    /// session is assumed to already reflect the snapshot's undo top.
    pub fn restore(
        &mut self,
        snapshot: &HistorySnapshot,
        registry: &CommandRegistry<S>,
        session: &mut S,
    ) -> Result<(), HistoryError> {
        Self::check_snapshot(snapshot)?;

        let mut undo = VecDeque::with_capacity(snapshot.undo.len());
        let mut redo = VecDeque::with_capacity(snapshot.redo.len());
        let decoded = Self::decode_into(&snapshot.undo, registry, &mut undo)
            .and_then(|()| Self::decode_into(&snapshot.redo, registry, &mut redo));
        if let Err(err) = decoded {
            for mut frame in undo.into_iter().chain(redo) {
                frame.command.purge(session);
            }
            return Err(err);
        }
        // Stored next-redo-first; the stack keeps it at the back.
        redo.make_contiguous().reverse();

        self.purge_all(session);
        self.undo_stack = undo;
        self.redo_stack = redo;
        self.next_id = snapshot.next_id;
        self.last_execute = None;
        self.enforce_depth(session);
        debug!(
            undo = self.undo_stack.len(),
            redo = self.redo_stack.len(),
            "history restored"
        );
        self.notify_top(session);
        Ok(())
    }

    fn decode_into(
        stored: &[StoredCommand],
        registry: &CommandRegistry<S>,
        out: &mut VecDeque<Frame<S>>,
    ) -> Result<(), HistoryError> {
        for record in stored {
            if !registry.contains(&record.kind) {
                return Err(HistoryError::UnknownKind(record.kind.clone()));
            }
            let id = record
                .id
                .ok_or_else(|| HistoryError::Corrupt(format!("entry {:?} has no id", record.label)))?;
            let command = registry.decode_command(record)?;
            out.push_back(Frame { id, command });
        }
        Ok(())
    }

    fn check_snapshot(snapshot: &HistorySnapshot) -> Result<(), HistoryError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(HistoryError::Corrupt(format!(
                "unsupported version {}",
                snapshot.version
            )));
        }
        let mut previous = 0;
        for record in snapshot.undo.iter().chain(&snapshot.redo) {
            let Some(id) = record.id else {
                continue;
            };
            if id <= previous {
                return Err(HistoryError::Corrupt(format!(
                    "ids out of order at {id} (after {previous})"
                )));
            }
            previous = id;
        }
        if previous > snapshot.next_id {
            return Err(HistoryError::Corrupt(format!(
                "id {previous} exceeds next_id {}",
                snapshot.next_id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::make_composite;
    use crate::testing::{Broken, Doc, SetCell, registry};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    fn history() -> History<Doc> {
        History::default()
    }

    fn fill(history: &mut History<Doc>, doc: &mut Doc, n: u64) {
        for target in 1..=n {
            let cmd = SetCell::new(doc, target, target as i64).fixed().boxed();
            history.execute(cmd, doc).unwrap();
        }
    }

    #[test]
    fn test_new_history() {
        let h = history();
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.undo_depth(), 0);
        assert_eq!(h.current_id(), None);
        assert!(h.entries().is_empty());
    }

    #[test]
    fn test_execute_assigns_increasing_ids() {
        let mut doc = Doc::new();
        let mut h = history();
        for (target, expected) in [(1, 1), (2, 2), (3, 3)] {
            let outcome = h
                .execute(SetCell::new(&doc, target, 1).fixed().boxed(), &mut doc)
                .unwrap();
            assert_eq!(outcome, ExecuteOutcome::Pushed { id: expected });
        }
        let ids: Vec<_> = h.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(h.current_id(), Some(3));
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut doc = Doc::new();
        let mut h = history();
        h.execute(SetCell::new(&doc, 1, 5).boxed(), &mut doc).unwrap();
        assert_eq!(doc.cells.get(&1), Some(&5));

        let step = h.undo(&mut doc).unwrap();
        assert!(matches!(step, Step::Applied(ref e) if e.id == 1 && !e.in_memory));
        assert!(doc.cells.is_empty());
        assert!(h.can_redo());

        let step = h.redo(&mut doc).unwrap();
        assert!(matches!(step, Step::Applied(ref e) if e.id == 1 && e.in_memory));
        assert_eq!(doc.cells.get(&1), Some(&5));
        assert_eq!(
            h.undo(&mut doc).unwrap(),
            Step::Applied(HistoryEntry {
                id: 1,
                kind: "SetCell",
                label: "Set 1".into(),
                in_memory: false,
            })
        );
    }

    #[test]
    fn test_empty_stacks_are_not_errors() {
        let mut doc = Doc::new();
        let mut h = history();
        assert_eq!(h.undo(&mut doc).unwrap(), Step::Empty);
        assert_eq!(h.redo(&mut doc).unwrap(), Step::Empty);
    }

    #[test]
    fn test_new_command_purges_redo() {
        let mut doc = Doc::new();
        let mut h = history();
        let purges = Rc::new(Cell::new(0));
        h.execute(SetCell::new(&doc, 1, 1).counting(&purges).boxed(), &mut doc)
            .unwrap();
        h.execute(SetCell::new(&doc, 2, 2).counting(&purges).boxed(), &mut doc)
            .unwrap();
        h.undo(&mut doc).unwrap();
        h.undo(&mut doc).unwrap();
        assert_eq!(h.redo_depth(), 2);

        h.execute(SetCell::new(&doc, 3, 3).boxed(), &mut doc).unwrap();
        assert_eq!(h.redo_depth(), 0);
        assert_eq!(purges.get(), 2);
        assert_eq!(h.redo(&mut doc).unwrap(), Step::Empty);
    }

    #[test]
    fn test_cancelled_command_is_purged_and_discarded() {
        let mut doc = Doc::new();
        let mut h = history();
        let rec = doc.signals.recorder();
        let purges = Rc::new(Cell::new(0));
        let outcome = h
            .execute(SetCell::new(&doc, 0, 1).counting(&purges).boxed(), &mut doc)
            .unwrap();
        assert_eq!(outcome, ExecuteOutcome::Discarded);
        assert_eq!(outcome.id(), None);
        assert_eq!(purges.get(), 1);
        assert_eq!(h.undo_depth(), 0);
        assert!(doc.log.is_empty());
        assert!(rec.signals().is_empty());
    }

    #[test]
    fn test_merge_within_window() {
        let mut doc = Doc::new();
        let mut h = history();
        let t0 = Instant::now();
        let purges = Rc::new(Cell::new(0));
        h.execute_at(SetCell::new(&doc, 1, 10).boxed(), &mut doc, t0).unwrap();
        let second = SetCell::new(&doc, 1, 20).counting(&purges).boxed();
        let outcome = h
            .execute_at(second, &mut doc, t0 + Duration::from_millis(100))
            .unwrap();

        assert_eq!(outcome, ExecuteOutcome::Merged { id: 1 });
        assert_eq!(h.undo_depth(), 1);
        assert_eq!(purges.get(), 1, "absorbed command is purged right away");
        assert_eq!(doc.cells.get(&1), Some(&20));

        h.undo(&mut doc).unwrap();
        assert!(doc.cells.is_empty(), "undo restores the pre-edit value");
    }

    #[test]
    fn test_no_merge_outside_window() {
        let mut doc = Doc::new();
        let mut h = history();
        let t0 = Instant::now();
        h.execute_at(SetCell::new(&doc, 1, 10).boxed(), &mut doc, t0).unwrap();
        let outcome = h
            .execute_at(
                SetCell::new(&doc, 1, 20).boxed(),
                &mut doc,
                t0 + Duration::from_millis(500),
            )
            .unwrap();
        assert_eq!(outcome, ExecuteOutcome::Pushed { id: 2 });
    }

    #[test]
    fn test_merge_window_is_configurable() {
        let mut doc = Doc::new();
        let mut h = History::new(HistoryConfig::default().with_merge_window_ms(50));
        let t0 = Instant::now();
        h.execute_at(SetCell::new(&doc, 1, 1).boxed(), &mut doc, t0).unwrap();
        let outcome = h
            .execute_at(
                SetCell::new(&doc, 1, 2).boxed(),
                &mut doc,
                t0 + Duration::from_millis(100),
            )
            .unwrap();
        assert!(matches!(outcome, ExecuteOutcome::Pushed { .. }));
    }

    #[test]
    fn test_no_merge_for_different_keys_or_fixed_commands() {
        let mut doc = Doc::new();
        let mut h = history();
        let t0 = Instant::now();
        h.execute_at(SetCell::new(&doc, 1, 1).boxed(), &mut doc, t0).unwrap();
        h.execute_at(SetCell::new(&doc, 2, 1).boxed(), &mut doc, t0).unwrap();
        h.execute_at(SetCell::new(&doc, 2, 2).fixed().boxed(), &mut doc, t0)
            .unwrap();
        assert_eq!(h.undo_depth(), 3);
    }

    #[test]
    fn test_while_compatible_ignores_window() {
        let mut doc = Doc::new();
        let mut h = history();
        let t0 = Instant::now();
        h.execute_at(SetCell::new(&doc, 1, 1).while_compatible().boxed(), &mut doc, t0)
            .unwrap();
        let outcome = h
            .execute_at(
                SetCell::new(&doc, 1, 2).while_compatible().boxed(),
                &mut doc,
                t0 + Duration::from_secs(30),
            )
            .unwrap();
        assert_eq!(outcome, ExecuteOutcome::Merged { id: 1 });
    }

    #[test]
    fn test_no_merge_into_entry_reached_by_undo() {
        let mut doc = Doc::new();
        let mut h = history();
        let t0 = Instant::now();
        h.execute_at(SetCell::new(&doc, 1, 1).while_compatible().boxed(), &mut doc, t0)
            .unwrap();
        h.execute_at(SetCell::new(&doc, 2, 1).boxed(), &mut doc, t0).unwrap();
        h.undo(&mut doc).unwrap();
        let outcome = h
            .execute_at(SetCell::new(&doc, 1, 9).while_compatible().boxed(), &mut doc, t0)
            .unwrap();
        assert_eq!(outcome, ExecuteOutcome::Pushed { id: 3 });
    }

    #[test]
    fn test_failed_execute_purges_and_pushes_nothing() {
        let mut doc = Doc::new();
        let mut h = history();
        let purges = Rc::new(Cell::new(0));
        let err = h.execute(Broken::on_execute(&purges), &mut doc).unwrap_err();
        assert!(matches!(err, HistoryError::Command(CommandError::Other(_))));
        assert_eq!(purges.get(), 1);
        assert_eq!(h.undo_depth(), 0);
    }

    #[test]
    fn test_failed_undo_keeps_entry() {
        let mut doc = Doc::new();
        let mut h = history();
        let purges = Rc::new(Cell::new(0));
        h.execute(Broken::on_undo(&purges), &mut doc).unwrap();
        assert!(h.undo(&mut doc).is_err());
        assert_eq!(h.undo_depth(), 1);
        assert_eq!(h.redo_depth(), 0);
    }

    #[test]
    fn test_max_depth_purges_oldest() {
        let mut doc = Doc::new();
        let mut h = History::new(HistoryConfig::default().with_max_depth(2));
        let purges = Rc::new(Cell::new(0));
        for target in 1..=4 {
            let cmd = SetCell::new(&doc, target, 1).fixed().counting(&purges).boxed();
            h.execute(cmd, &mut doc).unwrap();
        }
        assert_eq!(h.undo_depth(), 2);
        assert_eq!(purges.get(), 2);
        let ids: Vec<_> = h.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn test_disabled_blocks_undo_redo_and_jump() {
        let mut doc = Doc::new();
        let mut h = history();
        fill(&mut h, &mut doc, 2);
        h.undo(&mut doc).unwrap();
        h.set_disabled(true);
        assert!(h.is_disabled());
        assert!(!h.can_undo());
        assert!(!h.can_redo());

        let rec = doc.signals.recorder();
        assert_eq!(h.undo(&mut doc).unwrap(), Step::Blocked(UNDO_BLOCKED.into()));
        assert_eq!(h.redo(&mut doc).unwrap(), Step::Blocked(UNDO_BLOCKED.into()));
        assert_eq!(h.go_to_state(0, &mut doc).unwrap(), Jump::Blocked(UNDO_BLOCKED.into()));
        assert_eq!(h.undo_depth(), 1);
        assert!(rec.signals().is_empty());

        h.set_disabled(false);
        assert!(matches!(h.undo(&mut doc).unwrap(), Step::Applied(_)));
    }

    #[test]
    fn test_go_to_state_walks_both_ways() {
        let mut doc = Doc::new();
        let mut h = history();
        fill(&mut h, &mut doc, 5);
        let rec = doc.signals.recorder();

        let jump = h.go_to_state(2, &mut doc).unwrap();
        assert_eq!(
            jump,
            Jump::Moved {
                undone: 3,
                redone: 0,
                current: Some(2)
            }
        );
        assert_eq!(doc.cells.len(), 2);
        assert_eq!(rec.count(names::HISTORY_CHANGED), 1);
        assert_eq!(rec.count(names::SCENE_GRAPH_CHANGED), 1);

        rec.clear();
        let jump = h.go_to_state(4, &mut doc).unwrap();
        assert_eq!(
            jump,
            Jump::Moved {
                undone: 0,
                redone: 2,
                current: Some(4)
            }
        );
        assert_eq!(rec.count(names::HISTORY_CHANGED), 1);
        assert!(doc.signals.is_enabled(names::HISTORY_CHANGED));
        assert!(doc.signals.is_enabled(names::SCENE_GRAPH_CHANGED));
    }

    #[test]
    fn test_go_to_state_zero_undoes_everything() {
        let mut doc = Doc::new();
        let mut h = history();
        fill(&mut h, &mut doc, 3);
        h.go_to_state(0, &mut doc).unwrap();
        assert!(doc.cells.is_empty());
        assert_eq!(h.current_id(), None);
        assert_eq!(h.redo_depth(), 3);
    }

    #[test]
    fn test_clear_purges_everything_and_resets_ids() {
        let mut doc = Doc::new();
        let mut h = history();
        let purges = Rc::new(Cell::new(0));
        for target in 1..=3 {
            let cmd = SetCell::new(&doc, target, 1).fixed().counting(&purges).boxed();
            h.execute(cmd, &mut doc).unwrap();
        }
        h.undo(&mut doc).unwrap();
        let rec = doc.signals.recorder();

        h.clear(&mut doc);
        assert_eq!(purges.get(), 3);
        assert_eq!(rec.signals(), vec![Signal::new(names::HISTORY_CHANGED)]);
        assert_eq!(h.undo(&mut doc).unwrap(), Step::Empty);
        assert_eq!(h.redo(&mut doc).unwrap(), Step::Empty);

        let outcome = h.execute(SetCell::new(&doc, 9, 1).boxed(), &mut doc).unwrap();
        assert_eq!(outcome, ExecuteOutcome::Pushed { id: 1 });
    }

    #[test]
    fn test_entries_are_chronological() {
        let mut doc = Doc::new();
        let mut h = history();
        fill(&mut h, &mut doc, 4);
        h.undo(&mut doc).unwrap();
        h.undo(&mut doc).unwrap();

        let entries = h.entries();
        let view: Vec<_> = entries.iter().map(|e| (e.id, e.in_memory)).collect();
        assert_eq!(view, vec![(1, true), (2, true), (3, false), (4, false)]);
        assert_eq!(h.next_undo_label(), Some("Set 2"));
        assert_eq!(h.next_redo_label(), Some("Set 3"));
    }

    #[test]
    fn test_history_changed_carries_entry() {
        let mut doc = Doc::new();
        let mut h = history();
        let rec = doc.signals.recorder();
        h.execute(SetCell::new(&doc, 7, 1).boxed(), &mut doc).unwrap();
        let history_signals: Vec<_> = rec
            .signals()
            .into_iter()
            .filter(|s| s.name == names::HISTORY_CHANGED)
            .collect();
        assert_eq!(history_signals.len(), 1);
        assert_eq!(
            history_signals[0].payload,
            Payload::Entry(EntryInfo {
                id: 1,
                kind: "SetCell".into(),
                label: "Set 7".into()
            })
        );
    }

    #[test]
    fn test_composite_is_one_entry() {
        let mut doc = Doc::new();
        let mut h = history();
        let composite = make_composite(
            "Pair",
            [
                SetCell::new(&doc, 1, 1).boxed(),
                SetCell::new(&doc, 2, 2).boxed(),
            ],
            &mut doc,
        );
        h.execute(composite, &mut doc).unwrap();
        assert_eq!(h.undo_depth(), 1);
        h.undo(&mut doc).unwrap();
        assert_eq!(doc.log, vec!["exec 1", "exec 2", "undo 2", "undo 1"]);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut doc = Doc::new();
        let mut h = history();
        fill(&mut h, &mut doc, 3);
        h.undo(&mut doc).unwrap();
        let snapshot = h.snapshot().unwrap();
        assert_eq!(snapshot.next_id, 3);
        let text = snapshot.to_json_string().unwrap();

        let mut restored = history();
        restored
            .restore(&HistorySnapshot::from_json_str(&text).unwrap(), &registry(), &mut doc)
            .unwrap();
        assert_eq!(restored.entries(), h.entries());

        restored.redo(&mut doc).unwrap();
        assert_eq!(doc.cells.get(&3), Some(&3));
        let outcome = restored
            .execute(SetCell::new(&doc, 4, 4).boxed(), &mut doc)
            .unwrap();
        assert_eq!(outcome, ExecuteOutcome::Pushed { id: 4 });
    }

    #[test]
    fn test_snapshot_rejects_unpersistable() {
        let mut doc = Doc::new();
        let mut h = history();
        let purges = Rc::new(Cell::new(0));
        h.execute(Broken::on_undo(&purges), &mut doc).unwrap();
        assert!(matches!(h.snapshot(), Err(HistoryError::NotPersistable("Broken"))));
    }

    #[test]
    fn test_restore_rejects_bad_snapshots_without_changes() {
        let mut doc = Doc::new();
        let mut h = history();
        fill(&mut h, &mut doc, 2);
        let good = h.snapshot().unwrap();

        let mut out_of_order = good.clone();
        out_of_order.undo.swap(0, 1);
        assert!(matches!(
            h.restore(&out_of_order, &registry(), &mut doc),
            Err(HistoryError::Corrupt(_))
        ));

        let mut unknown = good.clone();
        unknown.undo[1].kind = "Teleport".into();
        assert!(matches!(
            h.restore(&unknown, &registry(), &mut doc),
            Err(HistoryError::UnknownKind(kind)) if kind == "Teleport"
        ));

        let mut overflow = good;
        overflow.next_id = 1;
        assert!(h.restore(&overflow, &registry(), &mut doc).is_err());

        assert_eq!(h.undo_depth(), 2);
        assert_eq!(h.current_id(), Some(2));
    }

    #[test]
    fn test_debug_impl() {
        let h = history();
        let dbg = format!("{h:?}");
        assert!(dbg.contains("History"));
        assert!(dbg.contains("undo_depth"));
    }
}
