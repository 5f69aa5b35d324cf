#![forbid(unsafe_code)]

//! The editor's current selection.

use fedit_core::ObjectId;

/// Tracks the selected entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    selected: Option<ObjectId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected entity, if any.
    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    /// Check if a specific entity is selected.
    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selected == Some(id)
    }

    /// Replace the selection, returning the previous one.
    pub fn select(&mut self, id: Option<ObjectId>) -> Option<ObjectId> {
        std::mem::replace(&mut self.selected, id)
    }
}
