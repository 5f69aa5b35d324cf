#![forbid(unsafe_code)]

//! Entity tree edited through commands.
//!
//! A [`Scene`] stores entities by [`ObjectId`] together with the parent/child
//! links and the order of root entities. Structural edits go through
//! [`Scene::detach`] and [`Scene::attach`], which move whole subtrees in and
//! out as a [`Detached`] value so that a command can own a removed subtree
//! until it is re-attached or purged.
//!
//! # Invariants
//!
//! 1. Every id in a `children` list, and in `roots`, names a stored entity
//! 2. An entity appears exactly once: in `roots` iff it has no parent,
//!    otherwise in its parent's `children`
//! 3. The parent graph is acyclic

use std::collections::BTreeMap;

use fedit_core::ObjectId;
use serde::{Deserialize, Serialize};

use crate::resources::MeshHandle;

/// Name of the attribute that maps onto [`Entity::name`].
pub const NAME_ATTRIBUTE: &str = "name";

/// Errors reported by structural scene edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// No entity with this id.
    #[error("entity {0} not found")]
    NotFound(ObjectId),
    /// The id is already used by a stored entity.
    #[error("entity {0} already exists")]
    Duplicate(ObjectId),
    /// Moving `entity` under `parent` would create a cycle.
    #[error("cannot move {entity} under its own descendant {parent}")]
    Cycle {
        /// Entity being moved.
        entity: ObjectId,
        /// Requested parent.
        parent: ObjectId,
    },
    /// The slot passed to [`Scene::attach`] was empty.
    #[error("no detached subtree to attach")]
    NothingToAttach,
    /// A script index is out of range.
    #[error("entity {entity} has no script #{index}")]
    NoScript {
        /// Entity addressed.
        entity: ObjectId,
        /// Requested script index.
        index: usize,
    },
}

/// Value of an entity attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A script attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Display name.
    pub name: String,
    /// Source text.
    pub source: String,
}

/// One node of the scene tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: ObjectId,
    /// Display name.
    pub name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    /// Local position.
    pub position: [f64; 3],
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
    /// Attached scripts.
    #[serde(default)]
    pub scripts: Vec<Script>,
    /// GPU mesh owned by this entity.
    #[serde(default)]
    pub mesh: Option<MeshHandle>,
}

impl Entity {
    /// Identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Parent entity, `None` for roots.
    #[must_use]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Children in order.
    #[must_use]
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Set the position (builder form).
    #[must_use]
    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    /// Set an attribute (builder form).
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attach a script (builder form).
    #[must_use]
    pub fn with_script(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.scripts.push(Script {
            name: name.into(),
            source: source.into(),
        });
        self
    }

    /// Give the entity a mesh (builder form).
    #[must_use]
    pub fn with_mesh(mut self, mesh: MeshHandle) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Read an attribute; `name` reads the display name.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<AttrValue> {
        if key == NAME_ATTRIBUTE {
            return Some(AttrValue::Text(self.name.clone()));
        }
        self.attributes.get(key).cloned()
    }

    /// Write an attribute, returning the previous value. `None` removes it.
    ///
    /// `name` writes the display name; only text values apply there.
    pub fn set_value(&mut self, key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
        if key == NAME_ATTRIBUTE {
            let old = AttrValue::Text(self.name.clone());
            if let Some(AttrValue::Text(name)) = value {
                self.name = name;
            }
            return Some(old);
        }
        match value {
            Some(value) => self.attributes.insert(key.to_owned(), value),
            None => self.attributes.remove(key),
        }
    }
}

/// A subtree taken out of the scene.
///
/// Entities are stored root first, in depth-first order. The subtree
/// remembers where it was so it can be put back in the same place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detached {
    entities: Vec<Entity>,
    parent: Option<ObjectId>,
    index: usize,
}

impl Detached {
    /// Wrap a freshly created entity that was never in the scene.
    #[must_use]
    pub fn new(mut entity: Entity) -> Self {
        entity.parent = None;
        entity.children.clear();
        Self {
            entities: vec![entity],
            parent: None,
            index: 0,
        }
    }

    /// Id of the subtree root.
    #[must_use]
    pub fn root(&self) -> ObjectId {
        self.entities[0].id
    }

    /// Root entity.
    #[must_use]
    pub fn root_entity(&self) -> &Entity {
        &self.entities[0]
    }

    /// Parent the subtree was detached from.
    #[must_use]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Position among its former siblings.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// All entities, root first.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Ids of all entities, root first.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entities.iter().map(|e| e.id)
    }

    /// Mesh handles owned by the subtree.
    pub fn meshes(&self) -> impl Iterator<Item = MeshHandle> + '_ {
        self.entities.iter().filter_map(|e| e.mesh)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether there are no entities. Only malformed persisted data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// The entity tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    entities: BTreeMap<ObjectId, Entity>,
    roots: Vec<ObjectId>,
    next_id: u64,
}

impl Scene {
    /// Create an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and build an entity that is not yet in the scene.
    pub fn new_entity(&mut self, name: impl Into<String>) -> Entity {
        self.next_id += 1;
        Entity {
            id: ObjectId(self.next_id),
            name: name.into(),
            parent: None,
            children: Vec::new(),
            position: [0.0; 3],
            attributes: BTreeMap::new(),
            scripts: Vec::new(),
            mesh: None,
        }
    }

    /// Look up an entity.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Look up an entity mutably.
    ///
    /// Structural links cannot be changed through the returned reference.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Look up an entity or fail with [`SceneError::NotFound`].
    pub fn entity(&self, id: ObjectId) -> Result<&Entity, SceneError> {
        self.get(id).ok_or(SceneError::NotFound(id))
    }

    /// Mutable form of [`Scene::entity`].
    pub fn entity_mut(&mut self, id: ObjectId) -> Result<&mut Entity, SceneError> {
        self.get_mut(id).ok_or(SceneError::NotFound(id))
    }

    /// Whether an entity with this id is in the scene.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the scene has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Root entities in order.
    #[must_use]
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Iterate over all entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Find the first entity with this name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.values().find(|e| e.name == name)
    }

    /// Ids of `id` and its descendants, depth first.
    pub fn subtree_ids(&self, id: ObjectId) -> Result<Vec<ObjectId>, SceneError> {
        self.entity(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(entity) = self.entities.get(&next) {
                stack.extend(entity.children.iter().rev());
            }
        }
        Ok(out)
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.entities.get(&current).and_then(|e| e.parent);
        }
        false
    }

    fn siblings_mut(&mut self, parent: Option<ObjectId>) -> Result<&mut Vec<ObjectId>, SceneError> {
        match parent {
            None => Ok(&mut self.roots),
            Some(p) => Ok(&mut self.entity_mut(p)?.children),
        }
    }

    fn unlink(&mut self, id: ObjectId) -> Result<(Option<ObjectId>, usize), SceneError> {
        let parent = self.entity(id)?.parent;
        let siblings = self.siblings_mut(parent)?;
        let index = siblings.iter().position(|&c| c == id).unwrap_or(siblings.len());
        if index < siblings.len() {
            siblings.remove(index);
        }
        Ok((parent, index))
    }

    fn link(&mut self, id: ObjectId, parent: Option<ObjectId>, index: Option<usize>) -> Result<usize, SceneError> {
        let siblings = self.siblings_mut(parent)?;
        let index = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(index, id);
        self.entity_mut(id)?.parent = parent;
        Ok(index)
    }

    /// Parent of `id` and its position among its siblings.
    pub fn location(&self, id: ObjectId) -> Result<(Option<ObjectId>, usize), SceneError> {
        let parent = self.entity(id)?.parent;
        let index = match parent {
            None => self.roots.iter().position(|&r| r == id),
            Some(p) => self.entity(p)?.children.iter().position(|&c| c == id),
        }
        .unwrap_or(0);
        Ok((parent, index))
    }

    /// Copy of the subtree rooted at `id` without removing it.
    pub fn snapshot_subtree(&self, id: ObjectId) -> Result<Detached, SceneError> {
        let ids = self.subtree_ids(id)?;
        let (parent, index) = self.location(id)?;
        let entities = ids
            .iter()
            .filter_map(|i| self.entities.get(i).cloned())
            .collect();
        Ok(Detached {
            entities,
            parent,
            index,
        })
    }

    /// Remove `id` and its descendants.
    pub fn detach(&mut self, id: ObjectId) -> Result<Detached, SceneError> {
        let ids = self.subtree_ids(id)?;
        let (parent, index) = self.unlink(id)?;
        let mut entities: Vec<Entity> = ids.iter().filter_map(|i| self.entities.remove(i)).collect();
        if let Some(root) = entities.first_mut() {
            root.parent = None;
        }
        Ok(Detached {
            entities,
            parent,
            index,
        })
    }

    /// Move the subtree held in `slot` into the scene under `parent` at
    /// `index` (appended when `None`).
    ///
    /// `slot` is emptied on success and left untouched on error.
    pub fn attach(
        &mut self,
        slot: &mut Option<Detached>,
        parent: Option<ObjectId>,
        index: Option<usize>,
    ) -> Result<ObjectId, SceneError> {
        let Some(detached) = slot.as_ref() else {
            return Err(SceneError::NothingToAttach);
        };
        if let Some(p) = parent {
            self.entity(p)?;
            if detached.ids().any(|i| i == p) {
                return Err(SceneError::Cycle {
                    entity: detached.root(),
                    parent: p,
                });
            }
        }
        if let Some(taken) = detached.ids().find(|&i| self.contains(i)) {
            return Err(SceneError::Duplicate(taken));
        }

        let Some(detached) = slot.take() else {
            return Err(SceneError::NothingToAttach);
        };
        let root = detached.root();
        for entity in detached.entities {
            self.next_id = self.next_id.max(entity.id.raw());
            self.entities.insert(entity.id, entity);
        }
        self.link(root, parent, index)?;
        Ok(root)
    }

    /// Move `id` under `parent` at `index`, returning where it was.
    pub fn reparent(
        &mut self,
        id: ObjectId,
        parent: Option<ObjectId>,
        index: Option<usize>,
    ) -> Result<(Option<ObjectId>, usize), SceneError> {
        self.entity(id)?;
        if let Some(p) = parent {
            self.entity(p)?;
            if self.is_ancestor(id, p) {
                return Err(SceneError::Cycle { entity: id, parent: p });
            }
        }
        let previous = self.unlink(id)?;
        self.link(id, parent, index)?;
        Ok(previous)
    }

    /// Replace the source of script `index` on `id`, returning the old
    /// source.
    pub fn set_script_source(
        &mut self,
        id: ObjectId,
        index: usize,
        source: String,
    ) -> Result<String, SceneError> {
        let script = self
            .entity_mut(id)?
            .scripts
            .get_mut(index)
            .ok_or(SceneError::NoScript { entity: id, index })?;
        Ok(std::mem::replace(&mut script.source, source))
    }
}
