//! Fixtures shared by the unit tests of this crate.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use fedit_core::{ObjectId, Signal, SignalBus, SignalName, names};
use serde_json::json;

use crate::command::{
    Command, CommandError, CommandMetadata, CommandResult, MergeKey, MergePolicy, Session,
};
use crate::persist::{CommandRegistry, StoredCommand};

/// A tiny document: integer cells addressed by object id.
pub(crate) struct Doc {
    pub cells: BTreeMap<u64, i64>,
    pub log: Vec<String>,
    pub signals: SignalBus,
}

impl Doc {
    pub fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
            log: Vec::new(),
            signals: SignalBus::new(),
        }
    }
}

impl Session for Doc {
    fn signals(&self) -> &SignalBus {
        &self.signals
    }
}

/// Sets one cell. Cell `0` has no identity and cancels construction.
pub(crate) struct SetCell {
    pub target: u64,
    pub old: Option<i64>,
    pub new: i64,
    pub metadata: CommandMetadata,
    pub updatable: bool,
    pub policy: MergePolicy,
    pub purges: Rc<Cell<u32>>,
}

impl SetCell {
    pub fn new(doc: &Doc, target: u64, value: i64) -> Self {
        let mut metadata = CommandMetadata::new(format!("Set {target}"));
        if target == 0 {
            metadata.cancel("cell has no identity");
        }
        Self {
            target,
            old: doc.cells.get(&target).copied(),
            new: value,
            metadata,
            updatable: true,
            policy: MergePolicy::TimeWindow,
            purges: Rc::new(Cell::new(0)),
        }
    }

    pub fn fixed(mut self) -> Self {
        self.updatable = false;
        self
    }

    pub fn while_compatible(mut self) -> Self {
        self.policy = MergePolicy::WhileCompatible;
        self
    }

    pub fn counting(mut self, purges: &Rc<Cell<u32>>) -> Self {
        self.purges = Rc::clone(purges);
        self
    }

    pub fn boxed(self) -> Box<dyn Command<Doc>> {
        Box::new(self)
    }

    fn decode(stored: &StoredCommand, _: &CommandRegistry<Doc>) -> Result<Box<dyn Command<Doc>>, CommandError> {
        let field = |name: &str| stored.payload.get(name).and_then(serde_json::Value::as_i64);
        let (Some(target), Some(new)) = (field("target"), field("new")) else {
            return Err(CommandError::Decode {
                kind: stored.kind.clone(),
                reason: "missing target or new".into(),
            });
        };
        Ok(Box::new(SetCell {
            target: target as u64,
            old: field("old"),
            new,
            metadata: stored.metadata(),
            updatable: true,
            policy: MergePolicy::TimeWindow,
            purges: Rc::new(Cell::new(0)),
        }))
    }
}

impl Command<Doc> for SetCell {
    fn kind(&self) -> &'static str {
        "SetCell"
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, doc: &mut Doc) -> CommandResult {
        doc.cells.insert(self.target, self.new);
        doc.log.push(format!("exec {}", self.target));
        doc.signals
            .dispatch(Signal::object(names::OBJECT_CHANGED, ObjectId(self.target)));
        Ok(())
    }

    fn undo(&mut self, doc: &mut Doc) -> CommandResult {
        match self.old {
            Some(old) => doc.cells.insert(self.target, old),
            None => doc.cells.remove(&self.target),
        };
        doc.log.push(format!("undo {}", self.target));
        doc.signals
            .dispatch(Signal::object(names::OBJECT_CHANGED, ObjectId(self.target)));
        Ok(())
    }

    fn purge(&mut self, _doc: &mut Doc) {
        self.purges.set(self.purges.get() + 1);
    }

    fn updatable(&self) -> bool {
        self.updatable
    }

    fn merge_key(&self) -> Option<MergeKey> {
        Some(MergeKey::new("SetCell", ObjectId(self.target)))
    }

    fn merge_policy(&self) -> MergePolicy {
        self.policy
    }

    fn update(&mut self, other: &dyn Command<Doc>) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.new = other.new;
        true
    }

    fn emits(&self) -> Vec<SignalName> {
        vec![names::OBJECT_CHANGED]
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        Some(json!({ "target": self.target, "old": self.old, "new": self.new }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A command whose execute or undo fails.
pub(crate) struct Broken {
    pub fail_execute: bool,
    pub metadata: CommandMetadata,
    pub purges: Rc<Cell<u32>>,
}

impl Broken {
    pub fn on_execute(purges: &Rc<Cell<u32>>) -> Box<dyn Command<Doc>> {
        Box::new(Self {
            fail_execute: true,
            metadata: CommandMetadata::new("Broken"),
            purges: Rc::clone(purges),
        })
    }

    pub fn on_undo(purges: &Rc<Cell<u32>>) -> Box<dyn Command<Doc>> {
        Box::new(Self {
            fail_execute: false,
            metadata: CommandMetadata::new("Broken"),
            purges: Rc::clone(purges),
        })
    }
}

impl Command<Doc> for Broken {
    fn kind(&self) -> &'static str {
        "Broken"
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn execute(&mut self, _doc: &mut Doc) -> CommandResult {
        if self.fail_execute {
            Err(CommandError::Other("execute failed".into()))
        } else {
            Ok(())
        }
    }

    fn undo(&mut self, _doc: &mut Doc) -> CommandResult {
        Err(CommandError::Other("undo failed".into()))
    }

    fn purge(&mut self, _doc: &mut Doc) {
        self.purges.set(self.purges.get() + 1);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registry that knows how to rebuild [`SetCell`].
pub(crate) fn registry() -> CommandRegistry<Doc> {
    let mut registry = CommandRegistry::new();
    registry.register("SetCell", SetCell::decode);
    registry
}

/// Shared event log for hook ordering assertions.
pub(crate) type Trace = Rc<RefCell<Vec<String>>>;
