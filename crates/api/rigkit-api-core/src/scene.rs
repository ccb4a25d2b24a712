//! The scene bridge: the surface the rig core demands from its host.
//!
//! Everything above this trait is host-agnostic. Optional lookups return
//! `Option` (a vanished entity is a sentinel, not an error); mutation paths
//! that can genuinely fail return `Result<_, SceneError>`.

use crate::ids::ItemId;
use crate::transform::Transform;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("item {0:?} does not exist")]
    MissingItem(ItemId),
    #[error("item {item:?} has no channel '{channel}'")]
    MissingChannel { item: ItemId, channel: String },
    #[error("channel '{channel}' holds {found}, not {expected}")]
    ChannelType {
        channel: String,
        expected: String,
        found: String,
    },
    #[error("host command failed: {0}")]
    Command(String),
}

/// Two independent value layers on every channel. The setup action holds
/// rest values consumed by guide apply; the edit action holds user
/// animation and edits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelAction {
    Setup,
    Edit,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Float,
    Int,
    Bool,
    Text,
    Matrix,
}

/// Host item types the core distinguishes. `Other` covers host types the
/// core passes through untouched (standardisation may convert back to one).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum HostType {
    Locator,
    /// Nestable container; the backing type of every component setup.
    Assembly,
    /// Plain group / selection set.
    Group,
    Mesh,
    /// Transform modifier owned by a transform-link setup.
    Modifier,
    /// Opaque IK solver; the core only reads its output channels.
    Solver,
    Other(String),
}

impl HostType {
    /// Locator super-type: items that sit in the 3D hierarchy and carry
    /// transform channels.
    pub fn is_locator(&self) -> bool {
        matches!(self, HostType::Locator | HostType::Solver | HostType::Mesh)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, HostType::Assembly | HostType::Group)
    }
}

/// Kinds of transform modifier the bridge can instantiate. Each one is a
/// host item of type `Modifier` whose channels the link setups own.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModifierKind {
    /// Dynamic parent: driven world = driver world * rest offset.
    DynaParent,
    /// Same, ignoring the driver's scale.
    DynaParentNoScale,
    /// Drives the full world transform via matrix channels, no parenting.
    WorldFeed,
}

/// Minimal abstract interface to the host scene. The in-memory reference
/// host implements this for tests; an application adapter would wrap the
/// real scene graph the same way.
pub trait Scene {
    // ---- items -----------------------------------------------------------

    fn create_item(&mut self, host_type: HostType, name: &str) -> ItemId;
    fn delete_item(&mut self, item: ItemId);
    fn exists(&self, item: ItemId) -> bool;
    fn host_type(&self, item: ItemId) -> Option<HostType>;
    /// Replace the item with one of a different host type, preserving
    /// name, tags, hierarchy and channels. Returns the replacement id; all
    /// subsequent work must use it.
    fn replace_host_type(&mut self, item: ItemId, host_type: HostType) -> ItemId;
    /// Every live item, in creation order.
    fn all_items(&self) -> Vec<ItemId>;

    fn name(&self, item: ItemId) -> Option<String>;
    fn set_name(&mut self, item: ItemId, name: &str);

    fn parent(&self, item: ItemId) -> Option<ItemId>;
    /// Children in host-defined order.
    fn children(&self, item: ItemId) -> Vec<ItemId>;
    fn set_parent(&mut self, item: ItemId, parent: Option<ItemId>);

    // ---- tags ------------------------------------------------------------

    fn tag(&self, item: ItemId, key: &str) -> Option<String>;
    /// `None` removes the tag.
    fn set_tag(&mut self, item: ItemId, key: &str, value: Option<&str>);
    fn tag_keys(&self, item: ItemId) -> Vec<String>;

    // ---- packages --------------------------------------------------------

    fn add_package(&mut self, item: ItemId, package: &str);
    fn remove_package(&mut self, item: ItemId, package: &str);
    fn packages(&self, item: ItemId) -> Vec<String>;

    // ---- channels --------------------------------------------------------

    fn add_channel(
        &mut self,
        item: ItemId,
        name: &str,
        ty: ChannelType,
        default: Value,
    ) -> Result<(), SceneError>;
    fn remove_channel(&mut self, item: ItemId, name: &str);
    fn has_channel(&self, item: ItemId, name: &str) -> bool;
    fn channel_names(&self, item: ItemId) -> Vec<String>;

    /// Raw stored value on one action layer (keyed value at `time` when the
    /// channel is animated on that layer).
    fn read(&self, item: ItemId, channel: &str, time: f32, action: ChannelAction)
        -> Option<Value>;
    /// Evaluated value: links and modifiers applied, edit over setup.
    fn read_eval(&self, item: ItemId, channel: &str, time: f32) -> Option<Value>;
    fn write(
        &mut self,
        item: ItemId,
        channel: &str,
        value: Value,
        time: f32,
        action: ChannelAction,
        key: bool,
    ) -> Result<(), SceneError>;

    fn keyframes(&self, item: ItemId, channel: &str, action: ChannelAction) -> Vec<f32>;
    fn remove_key(&mut self, item: ItemId, channel: &str, time: f32, action: ChannelAction);
    fn is_animated(&self, item: ItemId, channel: &str) -> bool;

    // ---- channel links ---------------------------------------------------

    fn link(
        &mut self,
        src: (ItemId, &str),
        dst: (ItemId, &str),
    ) -> Result<(), SceneError>;
    fn unlink(&mut self, src: (ItemId, &str), dst: (ItemId, &str));
    /// Channels feeding into `(item, channel)` as (source item, source channel).
    fn links_into(&self, item: ItemId, channel: &str) -> Vec<(ItemId, String)>;
    fn links_out_of(&self, item: ItemId, channel: &str) -> Vec<(ItemId, String)>;

    // ---- item graphs -----------------------------------------------------

    fn graph_connect(&mut self, graph: &str, from: ItemId, to: ItemId);
    fn graph_disconnect(&mut self, graph: &str, from: ItemId, to: ItemId);
    fn graph_forward(&self, graph: &str, from: ItemId) -> Vec<ItemId>;
    fn graph_reverse(&self, graph: &str, to: ItemId) -> Vec<ItemId>;
    /// Graph names this item participates in (either direction).
    fn graph_names(&self, item: ItemId) -> Vec<String>;
    /// Remove the item from the named graph entirely.
    fn graph_clear_item(&mut self, graph: &str, item: ItemId);

    // ---- transforms ------------------------------------------------------

    fn local_transform(&self, item: ItemId, action: ChannelAction) -> Option<Transform>;
    fn set_local_transform(
        &mut self,
        item: ItemId,
        xfrm: &Transform,
        action: ChannelAction,
        key: bool,
    );
    /// Cached world transform from the last `evaluate()`.
    fn world_transform(&self, item: ItemId) -> Option<Transform>;
    /// Host item-match: adjust local channels (edit action, keyed) so the
    /// item's world position and/or rotation equals `target`.
    fn match_world_transform(&mut self, item: ItemId, target: &Transform, pos: bool, rot: bool);
    /// Host euler normalisation on the item's rotation channels (edit action).
    fn adjust_euler(&mut self, item: ItemId);

    // ---- modifiers -------------------------------------------------------

    /// Create a transform modifier item driving `driven` from `driver`.
    fn add_modifier(&mut self, kind: ModifierKind, driven: ItemId, driver: ItemId) -> ItemId;
    fn modifier_kind(&self, modifier: ItemId) -> Option<ModifierKind>;
    fn modifier_driven(&self, modifier: ItemId) -> Option<ItemId>;
    fn modifier_driver(&self, modifier: ItemId) -> Option<ItemId>;

    // ---- selection & commands -------------------------------------------

    fn select(&mut self, items: &[ItemId], add: bool);
    fn selection(&self) -> Vec<ItemId>;
    /// Execute a host command string. The core issues these for operations
    /// the host exposes only that way (tool activation, preset save).
    fn run_command(&mut self, command: &str) -> Result<(), SceneError>;
    /// Post a named notification channel to invalidate host UI.
    fn notify(&mut self, channel: &str);

    // ---- time & evaluation ----------------------------------------------

    /// Current scene time (the playhead commands key at).
    fn time(&self) -> f32;
    fn set_time(&mut self, time: f32);

    /// Re-run host evaluation: propagate channel links, apply enabled
    /// modifiers in creation order, recompute cached world transforms.
    fn evaluate(&mut self);
}
