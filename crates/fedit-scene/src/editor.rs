#![forbid(unsafe_code)]

//! Host facade tying the history to an editing session.
//!
//! [`Editor`] is what an application embeds: it owns the
//! [`History`] and the [`EditorSession`] it edits, drives the play-mode
//! lock, and saves/loads projects (scene, resources and both history stacks
//! in one JSON document).

use std::fmt;
use std::path::Path;

use fedit_core::names;
use fedit_history::{
    Command, CommandRegistry, ConfigError, ExecuteOutcome, History, HistoryConfig, HistoryError,
    HistorySnapshot, Jump, Step,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use web_time::Instant;

use crate::registry::scene_registry;
use crate::resources::ResourcePool;
use crate::scene::Scene;
use crate::session::EditorSession;

/// Errors from loading or saving editor state.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Configuration file could not be loaded.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// History operation failed.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// File access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Project JSON was malformed.
    #[error("project JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything saved in a project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// The entity tree.
    pub scene: Scene,
    /// Live and released meshes.
    pub resources: ResourcePool,
    /// Both history stacks.
    pub history: HistorySnapshot,
}

/// An editing session with undo/redo.
pub struct Editor {
    history: History<EditorSession>,
    session: EditorSession,
    registry: CommandRegistry<EditorSession>,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("entities", &self.session.scene.len())
            .field("undo_depth", &self.history.undo_depth())
            .field("redo_depth", &self.history.redo_depth())
            .field("playing", &self.history.is_disabled())
            .finish()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl Editor {
    /// Editor over an empty scene.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self::with_session(config, EditorSession::new())
    }

    /// Editor over an existing session.
    #[must_use]
    pub fn with_session(config: HistoryConfig, session: EditorSession) -> Self {
        Self {
            history: History::new(config),
            session,
            registry: scene_registry(),
        }
    }

    /// Editor configured from a TOML or JSON file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, EditorError> {
        Ok(Self::new(HistoryConfig::load(path)?))
    }

    /// The session being edited.
    #[must_use]
    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    /// Mutable access for building commands and for edits outside the
    /// history (previews, loading).
    pub fn session_mut(&mut self) -> &mut EditorSession {
        &mut self.session
    }

    /// The undo/redo history.
    #[must_use]
    pub fn history(&self) -> &History<EditorSession> {
        &self.history
    }

    /// Registry used to decode persisted commands.
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry<EditorSession> {
        &self.registry
    }

    /// Extend the registry with decoders for application-defined commands.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry<EditorSession> {
        &mut self.registry
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Run a command built with [`Editor::build`] or by hand.
    pub fn execute(
        &mut self,
        cmd: Box<dyn Command<EditorSession>>,
    ) -> Result<ExecuteOutcome, HistoryError> {
        self.history.execute(cmd, &mut self.session)
    }

    /// [`Editor::execute`] with an explicit clock reading.
    pub fn execute_at(
        &mut self,
        cmd: Box<dyn Command<EditorSession>>,
        now: Instant,
    ) -> Result<ExecuteOutcome, HistoryError> {
        self.history.execute_at(cmd, &mut self.session, now)
    }

    /// Build a command against the session and execute it.
    pub fn build<C, F>(&mut self, f: F) -> Result<ExecuteOutcome, HistoryError>
    where
        C: Command<EditorSession>,
        F: FnOnce(&mut EditorSession) -> C,
    {
        let cmd = f(&mut self.session);
        self.execute(Box::new(cmd))
    }

    pub fn undo(&mut self) -> Result<Step, HistoryError> {
        self.history.undo(&mut self.session)
    }

    pub fn redo(&mut self) -> Result<Step, HistoryError> {
        self.history.redo(&mut self.session)
    }

    /// Jump to the state after entry `target` (0 for the initial state).
    pub fn go_to_state(&mut self, target: u64) -> Result<Jump, HistoryError> {
        self.history.go_to_state(target, &mut self.session)
    }

    /// Forget all history. The scene stays as it is.
    pub fn clear(&mut self) {
        self.history.clear(&mut self.session);
    }

    /// Enter or leave play mode. Undo, redo and jumps are refused while
    /// playing.
    pub fn set_playing(&mut self, playing: bool) {
        debug!(playing, "play mode changed");
        self.history.set_disabled(playing);
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.history.is_disabled()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Capture both history stacks.
    pub fn snapshot(&self) -> Result<HistorySnapshot, HistoryError> {
        self.history.snapshot()
    }

    /// Replace the history with `snapshot`. The scene must already match
    /// the snapshot's undo top.
    pub fn restore(&mut self, snapshot: &HistorySnapshot) -> Result<(), HistoryError> {
        self.history
            .restore(snapshot, &self.registry, &mut self.session)
    }

    /// Write the history to `path` as JSON.
    pub fn save_history(&self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let json = self.snapshot()?.to_json_string()?;
        std::fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), "history saved");
        Ok(())
    }

    /// Replace the history with the one stored at `path`.
    pub fn load_history(&mut self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let snapshot = HistorySnapshot::from_json_str(&json)?;
        self.restore(&snapshot)?;
        info!(path = %path.as_ref().display(), "history loaded");
        Ok(())
    }

    /// Scene, resources and history as one value.
    pub fn project(&self) -> Result<Project, HistoryError> {
        Ok(Project {
            scene: self.session.scene.clone(),
            resources: self.session.resources.clone(),
            history: self.snapshot()?,
        })
    }

    /// Replace the scene, resources and history with `project`.
    ///
    /// Nothing changes if the history fails to restore. Subscribers stay
    /// attached; the selection is cleared.
    pub fn open_project(&mut self, project: Project) -> Result<(), EditorError> {
        let mut session = EditorSession {
            signals: self.session.signals.clone(),
            ..EditorSession::with_scene(project.scene, project.resources)
        };
        let mut history = History::new(self.history.config().clone());
        history.restore(&project.history, &self.registry, &mut session)?;

        {
            // Old commands release against the old scene.
            let _mute = self.session.signals.mute(&[names::HISTORY_CHANGED]);
            self.history.clear(&mut self.session);
        }
        history.set_disabled(self.history.is_disabled());
        self.history = history;
        self.session = session;
        self.session.signals.emit(names::SCENE_GRAPH_CHANGED);
        Ok(())
    }

    /// Write the project to `path` as JSON.
    pub fn save_project(&self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let json = serde_json::to_string_pretty(&self.project()?)?;
        std::fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), "project saved");
        Ok(())
    }

    /// Open the project stored at `path`.
    pub fn load_project(&mut self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let project: Project = serde_json::from_str(&json)?;
        self.open_project(project)?;
        info!(path = %path.as_ref().display(), "project loaded");
        Ok(())
    }
}
