#![forbid(unsafe_code)]

//! Named notification bus with bulk suppression and batch coalescing.
//!
//! Every change the editor makes is announced through a [`SignalBus`]:
//! commands dispatch `objectChanged`, `sceneGraphChanged` and friends, and the
//! history dispatches `historyChanged` after each step. Panels subscribe by
//! name.
//!
//! Two scoped controls sit on top of plain `dispatch`/`toggle`:
//!
//! - [`SignalBus::mute`] disables a set of names until the returned
//!   [`MuteGuard`] drops. Dispatches of a muted name are dropped and counted.
//! - [`SignalBus::batch`] defers a set of names until the returned
//!   [`BatchGuard`] drops. Deferred signals are coalesced: a signal equal to
//!   one already queued (same name, same payload) is not queued again. The
//!   outermost batch flushes the queue in first-enqueue order.
//!
//! # Invariants
//!
//! 1. A guard restores exactly the enabled state it found, so nested mutes
//!    compose and the bus is never left silenced after the guard is gone.
//! 2. Only the outermost batch flushes.
//! 3. Flushed signals go through `dispatch` again, so a name muted by an
//!    enclosing scope stays silent.
//! 4. Subscribers are called in registration order.
//!
//! # Failure Modes
//!
//! - **Panic inside a batch**: guards still restore state during unwinding,
//!   but the deferred queue is discarded instead of flushed so that no
//!   subscriber runs while the stack is unwinding.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug_span, trace};
use web_time::Instant;

use crate::id::ObjectId;

/// Name of a notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalName(&'static str);

impl SignalName {
    /// Create a signal name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The name as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Standard signal names used across the editor crates.
pub mod names {
    use super::SignalName;

    /// The undo/redo history changed.
    pub const HISTORY_CHANGED: SignalName = SignalName::new("historyChanged");
    /// The scene graph changed in some way; views should rebuild.
    pub const SCENE_GRAPH_CHANGED: SignalName = SignalName::new("sceneGraphChanged");
    /// An object was inserted into the scene.
    pub const OBJECT_ADDED: SignalName = SignalName::new("objectAdded");
    /// An object was detached from the scene.
    pub const OBJECT_REMOVED: SignalName = SignalName::new("objectRemoved");
    /// A property of an object changed.
    pub const OBJECT_CHANGED: SignalName = SignalName::new("objectChanged");
    /// The selection changed.
    pub const SELECTION_CHANGED: SignalName = SignalName::new("selectionChanged");
    /// A script attached to an object changed.
    pub const SCRIPT_CHANGED: SignalName = SignalName::new("scriptChanged");
}

/// Summary of a history entry carried by `historyChanged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// History id of the command.
    pub id: u64,
    /// Command kind tag.
    pub kind: String,
    /// Human-readable label.
    pub label: String,
}

/// Argument carried by a signal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    /// No argument.
    #[default]
    Empty,
    /// The object the signal is about.
    Object(ObjectId),
    /// The history entry the signal is about.
    Entry(EntryInfo),
}

/// A dispatched notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Channel name.
    pub name: SignalName,
    /// Argument.
    pub payload: Payload,
}

impl Signal {
    /// A signal without payload.
    #[must_use]
    pub fn new(name: SignalName) -> Self {
        Self {
            name,
            payload: Payload::Empty,
        }
    }

    /// A signal about one object.
    #[must_use]
    pub fn object(name: SignalName, id: ObjectId) -> Self {
        Self {
            name,
            payload: Payload::Object(id),
        }
    }

    /// A signal with an explicit payload.
    #[must_use]
    pub fn with_payload(name: SignalName, payload: Payload) -> Self {
        Self { name, payload }
    }

    /// The object this signal refers to, if any.
    #[must_use]
    pub fn object_id(&self) -> Option<ObjectId> {
        match self.payload {
            Payload::Object(id) => Some(id),
            _ => None,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Rc<dyn Fn(&Signal)>;

struct Subscriber {
    id: SubscriptionId,
    /// `None` receives every signal.
    filter: Option<SignalName>,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    disabled: HashSet<SignalName>,
    /// Per-name batch nesting depth.
    batching: HashMap<SignalName, u32>,
    /// Number of live batch guards. Flush happens when this returns to 0.
    batch_depth: u32,
    deferred: Vec<Signal>,
    suppressed: HashMap<SignalName, u64>,
    delivered: u64,
}

/// Shared notification bus.
///
/// Cloning a `SignalBus` yields another handle to the same bus.
#[derive(Default)]
pub struct SignalBus {
    inner: Rc<RefCell<BusInner>>,
}

impl Clone for SignalBus {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SignalBus")
            .field("subscribers", &inner.subscribers.len())
            .field("disabled", &inner.disabled)
            .field("batch_depth", &inner.batch_depth)
            .field("deferred", &inner.deferred.len())
            .field("delivered", &inner.delivered)
            .finish()
    }
}

impl SignalBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one signal name.
    pub fn subscribe(&self, name: SignalName, f: impl Fn(&Signal) + 'static) -> SubscriptionId {
        self.add_subscriber(Some(name), Rc::new(f))
    }

    /// Subscribe to every signal.
    pub fn subscribe_all(&self, f: impl Fn(&Signal) + 'static) -> SubscriptionId {
        self.add_subscriber(None, Rc::new(f))
    }

    fn add_subscriber(&self, filter: Option<SignalName>, callback: Callback) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        inner.next_subscription += 1;
        let id = SubscriptionId(inner.next_subscription);
        inner.subscribers.push(Subscriber {
            id,
            filter,
            callback,
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        inner.subscribers.len() != before
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Enable or disable a signal name.
    ///
    /// While disabled, every dispatch of `name` is dropped.
    pub fn toggle(&self, name: SignalName, enabled: bool) {
        let mut inner = self.inner.borrow_mut();
        if enabled {
            inner.disabled.remove(&name);
        } else {
            inner.disabled.insert(name);
        }
    }

    /// Whether `name` is currently enabled.
    #[must_use]
    pub fn is_enabled(&self, name: SignalName) -> bool {
        !self.inner.borrow().disabled.contains(&name)
    }

    /// Dispatch a signal to its subscribers.
    ///
    /// Dropped if the name is disabled, queued if the name is being batched.
    pub fn dispatch(&self, signal: Signal) {
        let callbacks: Vec<Callback> = {
            let mut inner = self.inner.borrow_mut();
            if inner.disabled.contains(&signal.name) {
                *inner.suppressed.entry(signal.name).or_insert(0) += 1;
                trace!(signal = %signal.name, "signal suppressed");
                return;
            }
            if inner.batching.get(&signal.name).is_some_and(|depth| *depth > 0) {
                if !inner.deferred.contains(&signal) {
                    inner.deferred.push(signal);
                }
                return;
            }
            inner.delivered += 1;
            inner
                .subscribers
                .iter()
                .filter(|s| s.filter.is_none_or(|name| name == signal.name))
                .map(|s| Rc::clone(&s.callback))
                .collect()
        };
        // Borrow released: callbacks may dispatch again.
        for callback in callbacks {
            callback(&signal);
        }
    }

    /// Dispatch a payload-less signal.
    pub fn emit(&self, name: SignalName) {
        self.dispatch(Signal::new(name));
    }

    /// Disable `names` until the guard drops.
    pub fn mute(&self, names: &[SignalName]) -> MuteGuard {
        let restore = names
            .iter()
            .map(|&name| {
                let was_enabled = self.is_enabled(name);
                self.toggle(name, false);
                (name, was_enabled)
            })
            .collect();
        MuteGuard {
            bus: self.clone(),
            restore,
        }
    }

    /// Defer and coalesce `names` until the guard drops.
    pub fn batch(&self, names: &[SignalName]) -> BatchGuard {
        let mut inner = self.inner.borrow_mut();
        inner.batch_depth += 1;
        let is_root = inner.batch_depth == 1;
        for &name in names {
            *inner.batching.entry(name).or_insert(0) += 1;
        }
        BatchGuard {
            bus: self.clone(),
            names: names.to_vec(),
            is_root,
        }
    }

    /// Whether any batch guard is alive.
    #[must_use]
    pub fn is_batching(&self) -> bool {
        self.inner.borrow().batch_depth > 0
    }

    /// Number of signals waiting for the outermost batch to end.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().deferred.len()
    }

    /// How many dispatches of `name` were dropped because it was disabled.
    #[must_use]
    pub fn suppressed_count(&self, name: SignalName) -> u64 {
        self.inner
            .borrow()
            .suppressed
            .get(&name)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of signals delivered to subscribers.
    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.inner.borrow().delivered
    }

    /// Start recording every delivered signal.
    pub fn recorder(&self) -> SignalRecorder {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let id = self.subscribe_all(move |signal| sink.borrow_mut().push(signal.clone()));
        SignalRecorder {
            bus: self.clone(),
            id,
            log,
        }
    }

    fn end_batch(&self, names: &[SignalName]) {
        let should_flush = {
            let mut inner = self.inner.borrow_mut();
            for name in names {
                if let Some(depth) = inner.batching.get_mut(name) {
                    *depth = depth.saturating_sub(1);
                    if *depth == 0 {
                        inner.batching.remove(name);
                    }
                }
            }
            inner.batch_depth = inner.batch_depth.saturating_sub(1);
            inner.batch_depth == 0
        };
        if !should_flush {
            return;
        }
        if std::thread::panicking() {
            let dropped = std::mem::take(&mut self.inner.borrow_mut().deferred);
            trace!(dropped = dropped.len(), "batch discarded during unwind");
            return;
        }
        self.flush();
    }

    fn flush(&self) {
        let deferred = std::mem::take(&mut self.inner.borrow_mut().deferred);
        if deferred.is_empty() {
            return;
        }

        let count = deferred.len() as u64;
        let start = Instant::now();
        let _span = debug_span!("signals.flush", count, duration_us = tracing::field::Empty).entered();

        for signal in deferred {
            self.dispatch(signal);
        }

        let duration_us = start.elapsed().as_micros() as u64;
        tracing::Span::current().record("duration_us", duration_us);
    }
}

/// Re-enables muted signal names when dropped.
#[must_use = "the names are re-enabled as soon as the guard is dropped"]
pub struct MuteGuard {
    bus: SignalBus,
    restore: Vec<(SignalName, bool)>,
}

impl Drop for MuteGuard {
    fn drop(&mut self) {
        for (name, was_enabled) in self.restore.drain(..).rev() {
            self.bus.toggle(name, was_enabled);
        }
    }
}

impl fmt::Debug for MuteGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuteGuard")
            .field("names", &self.restore.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .finish()
    }
}

/// Ends a batch when dropped; the outermost batch flushes.
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct BatchGuard {
    bus: SignalBus,
    names: Vec<SignalName>,
    is_root: bool,
}

impl BatchGuard {
    /// Whether this guard opened the outermost batch.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let names = std::mem::take(&mut self.names);
        self.bus.end_batch(&names);
    }
}

impl fmt::Debug for BatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchGuard")
            .field("names", &self.names)
            .field("is_root", &self.is_root)
            .finish()
    }
}

/// Records every signal delivered on a bus.
pub struct SignalRecorder {
    bus: SignalBus,
    id: SubscriptionId,
    log: Rc<RefCell<Vec<Signal>>>,
}

impl SignalRecorder {
    /// All recorded signals in delivery order.
    #[must_use]
    pub fn signals(&self) -> Vec<Signal> {
        self.log.borrow().clone()
    }

    /// Recorded signal names in delivery order.
    #[must_use]
    pub fn names(&self) -> Vec<SignalName> {
        self.log.borrow().iter().map(|s| s.name).collect()
    }

    /// Number of recorded signals named `name`.
    #[must_use]
    pub fn count(&self, name: SignalName) -> usize {
        self.log.borrow().iter().filter(|s| s.name == name).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Stop recording.
    pub fn detach(self) {
        self.bus.unsubscribe(self.id);
    }
}

impl fmt::Debug for SignalRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRecorder")
            .field("recorded", &self.log.borrow().len())
            .finish()
    }
}
