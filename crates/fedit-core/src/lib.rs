#![forbid(unsafe_code)]

//! Core types shared by the fedit editor crates.
//!
//! # Key Components
//!
//! - [`ObjectId`] - identity of a domain object targeted by commands
//! - [`SignalBus`] - named notification bus with mute and batch scopes
//! - [`Signal`], [`SignalName`], [`Payload`] - what travels on the bus
//!
//! # Role in fedit
//! `fedit-core` is the leaf of the workspace. `fedit-history` dispatches
//! `historyChanged` through the bus and uses batch scopes to coalesce the
//! notifications of composite commands; `fedit-scene` dispatches the domain
//! signals (`objectChanged`, `sceneGraphChanged`, ...).

pub mod id;
pub mod signal;

pub use id::ObjectId;
pub use signal::{
    BatchGuard, EntryInfo, MuteGuard, Payload, Signal, SignalBus, SignalName, SignalRecorder,
    SubscriptionId, names,
};
