#![forbid(unsafe_code)]

//! The editing session commands operate on.

use fedit_core::{ObjectId, Signal, SignalBus, SignalName};
use fedit_history::Session;

use crate::resources::ResourcePool;
use crate::scene::Scene;
use crate::selection::Selection;

/// Everything a scene command may read or change.
///
/// Passed explicitly to every command call; there is no global editor.
#[derive(Debug, Default)]
pub struct EditorSession {
    /// The entity tree.
    pub scene: Scene,
    /// Current selection.
    pub selection: Selection,
    /// Mesh allocator.
    pub resources: ResourcePool,
    /// Notification bus shared with the panels.
    pub signals: SignalBus,
}

impl EditorSession {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session over an existing scene and pool.
    #[must_use]
    pub fn with_scene(scene: Scene, resources: ResourcePool) -> Self {
        Self {
            scene,
            resources,
            ..Self::default()
        }
    }

    /// Dispatch `name` about `id`.
    pub fn notify(&self, name: SignalName, id: ObjectId) {
        self.signals.dispatch(Signal::object(name, id));
    }
}

impl Session for EditorSession {
    fn signals(&self) -> &SignalBus {
        &self.signals
    }
}
