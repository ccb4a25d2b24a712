//! Core rig data model and lifecycle machinery.
//!
//! Everything here runs against the host through the `Scene` trait from
//! `rigkit-api-core`: typed items grouped into component setups, modules
//! with pieces and plug/socket connections, the guide apply pipeline,
//! transform links, IK/FK matching, channel presets and the one-way
//! standardisation transform.
//!
//! Operations are free functions over a [`service::Ctx`] borrow bundle;
//! cross-cutting behaviour hangs off the event bus in registration order.

pub mod apply;
pub mod color;
pub mod component;
pub mod context;
pub mod elements;
pub mod error;
pub mod events;
pub mod features;
pub mod ikfk;
pub mod item;
pub mod link;
pub mod module;
pub mod naming;
pub mod piece;
pub mod plug;
pub mod preset;
pub mod registry;
pub mod resolution;
pub mod rig;
pub mod rigclay;
pub mod service;
pub mod settings;
pub mod setup;
pub mod standardize;
pub mod tags;

pub use error::{Result, RigError};
pub use events::{Event, EventHandler, EventKind};
pub use item::{ItemTypeDesc, RigItemRecord, SideMode};
pub use module::Module;
pub use piece::{Piece, PieceFactory};
pub use registry::{ComponentKind, Registry, SystemComponent};
pub use rig::Rig;
pub use service::{Ctx, Service};
pub use settings::SettingsStore;
pub use setup::{ComponentSetup, SetupId};
