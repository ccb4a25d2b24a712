//! rigkit-api-core: scene-bridge contract and shared value types (host-agnostic)
//!
//! This crate defines everything the rig system and a host scene agree on:
//! channel values and actions, item identifiers, transform math, the preset
//! channel-address codec, and the `Scene` trait the whole rig core is
//! written against. Hosts (the in-memory reference scene, adapters) live in
//! separate crates.

pub mod address;
pub mod ids;
pub mod scene;
pub mod side;
pub mod transform;
pub mod value;

pub use address::ChannelAddress;
pub use ids::{IdAllocator, ItemId};
pub use scene::{ChannelAction, ChannelType, HostType, ModifierKind, Scene, SceneError};
pub use side::Side;
pub use transform::{Mat4, Transform, Vec3};
pub use value::{Value, ValueKind};
