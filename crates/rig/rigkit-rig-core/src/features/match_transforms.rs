//! Match-transforms feature: per-item options describing how the item
//! matches a reference during an IK/FK switch.

use crate::error::Result;
use crate::item;
use crate::service::Ctx;
use crate::tags::GRAPH_MATCH_REF;
use rigkit_api_core::ItemId;
use serde_json::json;

pub const SET_POS: &str = "match.pos";
pub const SET_ROT: &str = "match.rot";
pub const SET_POS_LOCAL: &str = "match.posLocal";
pub const SET_ROT_LOCAL: &str = "match.rotLocal";

#[derive(Copy, Clone, Debug)]
pub struct MatchOptions {
    pub position: bool,
    pub rotation: bool,
    pub position_local: bool,
    pub rotation_local: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            position: true,
            rotation: true,
            position_local: false,
            rotation_local: false,
        }
    }
}

pub fn set_options(ctx: &mut Ctx<'_>, item: ItemId, options: MatchOptions) {
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.settings.set(SET_POS, json!(options.position));
        record.settings.set(SET_ROT, json!(options.rotation));
        record.settings.set(SET_POS_LOCAL, json!(options.position_local));
        record.settings.set(SET_ROT_LOCAL, json!(options.rotation_local));
    }
    item::flush_settings(ctx, item);
}

pub fn options(ctx: &Ctx<'_>, item: ItemId) -> MatchOptions {
    let Some(record) = ctx.rig.items.get(&item) else {
        return MatchOptions::default();
    };
    let defaults = MatchOptions::default();
    MatchOptions {
        position: record.settings.get_bool(SET_POS).unwrap_or(defaults.position),
        rotation: record.settings.get_bool(SET_ROT).unwrap_or(defaults.rotation),
        position_local: record
            .settings
            .get_bool(SET_POS_LOCAL)
            .unwrap_or(defaults.position_local),
        rotation_local: record
            .settings
            .get_bool(SET_ROT_LOCAL)
            .unwrap_or(defaults.rotation_local),
    }
}

/// The item this one matches to; `None` means match to self (bake eval).
pub fn set_reference(ctx: &mut Ctx<'_>, item: ItemId, reference: Option<ItemId>) {
    ctx.scene.graph_clear_item(GRAPH_MATCH_REF, item);
    if let Some(reference) = reference {
        ctx.scene.graph_connect(GRAPH_MATCH_REF, item, reference);
    }
}

pub fn reference(ctx: &Ctx<'_>, item: ItemId) -> Option<ItemId> {
    ctx.scene.graph_forward(GRAPH_MATCH_REF, item).first().copied()
}

pub fn on_remove(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    set_reference(ctx, item, None);
    Ok(())
}
