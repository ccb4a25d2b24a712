//! Item-link drawing: a styled viewport line from the owning item to a
//! target held by a graph edge. Style lives in the owner's settings.

use crate::error::Result;
use crate::item;
use crate::service::Ctx;
use crate::tags::GRAPH_ITEM_LINK;
use rigkit_api_core::ItemId;
use serde_json::json;

pub const SET_PATTERN: &str = "itemLink.pattern";
pub const SET_THICKNESS: &str = "itemLink.thickness";
pub const SET_OPACITY: &str = "itemLink.opacity";
pub const SET_POINT_SIZE: &str = "itemLink.pointSize";
/// `wire`, `fill` or `custom`.
pub const SET_COLOR_SOURCE: &str = "itemLink.colorSource";
pub const SET_ENABLE: &str = "itemLink.enable";

#[derive(Clone, Debug)]
pub struct LinkStyle {
    pub pattern: String,
    pub thickness: f32,
    pub opacity: f32,
    pub point_size: f32,
    pub color_source: String,
    pub enable: bool,
}

impl Default for LinkStyle {
    fn default() -> Self {
        LinkStyle {
            pattern: "dots".to_string(),
            thickness: 1.0,
            opacity: 0.6,
            point_size: 2.0,
            color_source: "wire".to_string(),
            enable: true,
        }
    }
}

pub fn set_target(ctx: &mut Ctx<'_>, item: ItemId, target: Option<ItemId>) {
    ctx.scene.graph_clear_item(GRAPH_ITEM_LINK, item);
    if let Some(target) = target {
        ctx.scene.graph_connect(GRAPH_ITEM_LINK, item, target);
    }
}

pub fn target(ctx: &Ctx<'_>, item: ItemId) -> Option<ItemId> {
    ctx.scene.graph_forward(GRAPH_ITEM_LINK, item).first().copied()
}

pub fn set_style(ctx: &mut Ctx<'_>, item: ItemId, style: &LinkStyle) {
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.settings.set(SET_PATTERN, json!(style.pattern));
        record.settings.set(SET_THICKNESS, json!(style.thickness));
        record.settings.set(SET_OPACITY, json!(style.opacity));
        record.settings.set(SET_POINT_SIZE, json!(style.point_size));
        record.settings.set(SET_COLOR_SOURCE, json!(style.color_source));
        record.settings.set(SET_ENABLE, json!(style.enable));
    }
    item::flush_settings(ctx, item);
}

pub fn set_enable(ctx: &mut Ctx<'_>, item: ItemId, enable: bool) {
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.settings.set(SET_ENABLE, json!(enable));
    }
    item::flush_settings(ctx, item);
}

/// Target edge is cleared when the feature comes off.
pub fn on_remove(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    set_target(ctx, item, None);
    Ok(())
}

/// Re-express the target as a channel connection so the reference outlives
/// the rig graphs.
pub fn on_standardize(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    let Some(target) = target(ctx, item) else {
        return Ok(());
    };
    if !ctx.scene.has_channel(item, "linkTarget") {
        ctx.scene.add_channel(
            item,
            "linkTarget",
            rigkit_api_core::ChannelType::Matrix,
            rigkit_api_core::Value::Matrix(rigkit_api_core::transform::mat4_identity()),
        )?;
    }
    ctx.scene.link((target, "wposMatrix"), (item, "linkTarget"))?;
    Ok(())
}
