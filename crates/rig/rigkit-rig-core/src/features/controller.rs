//! Controller feature: marks an item as part of the actor and tracks its
//! animatable channel set.

use crate::error::Result;
use crate::item;
use crate::service::Ctx;
use rigkit_api_core::{ChannelAction, ItemId};
use serde_json::json;

/// Channel names the controller exposes for animation.
pub const SET_CHANNELS: &str = "ctrl.channels";
pub const SET_LOCKED: &str = "ctrl.locked";
/// `fixed` or `dynamic`.
pub const SET_SPACE: &str = "ctrl.space";

pub const DEFAULT_CHANNELS: [&str; 6] = [
    "pos.X", "pos.Y", "pos.Z", "rot.X", "rot.Y", "rot.Z",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AnimationSpace {
    Fixed,
    Dynamic,
}

pub fn on_add(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    let Some(record) = ctx.rig.items.get_mut(&item) else {
        return Ok(());
    };
    if record.settings.get(SET_CHANNELS).is_none() {
        record
            .settings
            .set(SET_CHANNELS, json!(DEFAULT_CHANNELS.to_vec()));
    }
    if record.settings.get_str(SET_SPACE).is_none() {
        record.settings.set(SET_SPACE, json!("fixed"));
    }
    item::flush_settings(ctx, item);
    Ok(())
}

/// The feature's own channel bookkeeping has no host-side connections to
/// preserve; the generic connection cache covers the transform channels.
pub fn on_standardize(_ctx: &mut Ctx<'_>, _item: ItemId) -> Result<()> {
    Ok(())
}

pub fn animated_channels(ctx: &Ctx<'_>, item: ItemId) -> Vec<String> {
    ctx.rig
        .items
        .get(&item)
        .and_then(|r| r.settings.get(SET_CHANNELS))
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_else(|| DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect())
}

pub fn animation_space(ctx: &Ctx<'_>, item: ItemId) -> AnimationSpace {
    match ctx
        .rig
        .items
        .get(&item)
        .and_then(|r| r.settings.get_str(SET_SPACE))
    {
        Some("dynamic") => AnimationSpace::Dynamic,
        _ => AnimationSpace::Fixed,
    }
}

pub fn set_animation_space(ctx: &mut Ctx<'_>, item: ItemId, space: AnimationSpace) {
    let value = match space {
        AnimationSpace::Fixed => "fixed",
        AnimationSpace::Dynamic => "dynamic",
    };
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.settings.set(SET_SPACE, json!(value));
    }
    item::flush_settings(ctx, item);
}

/// Key every animatable channel of the controller at `time`, writing the
/// currently evaluated value onto the edit action.
pub fn keyframe(ctx: &mut Ctx<'_>, item: ItemId, time: f32) -> Result<()> {
    for channel in animated_channels(ctx, item) {
        if let Some(value) = ctx.scene.read_eval(item, &channel, time) {
            ctx.scene
                .write(item, &channel, value, time, ChannelAction::Edit, true)?;
        }
    }
    Ok(())
}
