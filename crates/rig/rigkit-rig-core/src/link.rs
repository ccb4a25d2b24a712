//! Transform links: typed constraints between a driven and a driver item.
//!
//! Each link owns at most one host modifier item. Links participate in
//! guide apply through deactivate / update-rest-pose / reactivate; rest
//! offsets are recomputed from post-eval world transforms taken while the
//! link is inert.

use crate::error::{Result, RigError};
use crate::service::Ctx;
use crate::tags::{GRAPH_XFRM_LINK, TAG_LINK_TYPE};
use rigkit_api_core::{ChannelAction, ItemId, ModifierKind, Transform, Value};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkType {
    /// One-time world-space snapshot baked into the setup action; no modifier.
    Static,
    DynaParent,
    DynaParentNoScale,
    /// Drives full world transforms via matrix channels without parenting.
    WorldPermanent,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Static => "static",
            LinkType::DynaParent => "dynaParent",
            LinkType::DynaParentNoScale => "dynaParentNoScale",
            LinkType::WorldPermanent => "worldPermanent",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "static" => Ok(LinkType::Static),
            "dynaParent" => Ok(LinkType::DynaParent),
            "dynaParentNoScale" => Ok(LinkType::DynaParentNoScale),
            "worldPermanent" => Ok(LinkType::WorldPermanent),
            other => Err(RigError::UnknownLinkType(other.to_string())),
        }
    }

    fn modifier_kind(self) -> Option<ModifierKind> {
        match self {
            LinkType::Static => None,
            LinkType::DynaParent => Some(ModifierKind::DynaParent),
            LinkType::DynaParentNoScale => Some(ModifierKind::DynaParentNoScale),
            LinkType::WorldPermanent => Some(ModifierKind::WorldFeed),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransformLink {
    pub driven: ItemId,
    pub driver: ItemId,
    pub link_type: LinkType,
    pub modifier: Option<ItemId>,
    pub active: bool,
}

/// Create a link. Any pre-existing link on the driven item is silently
/// replaced. With `compensation` the driven item keeps its current world
/// transform; without it the rest offset is identity.
pub fn new_link(
    ctx: &mut Ctx<'_>,
    driven: ItemId,
    driver: ItemId,
    link_type: LinkType,
    compensation: bool,
) -> Result<()> {
    if driven == driver {
        return Err(RigError::InvalidArgument(
            "a transform link cannot drive its own driver".to_string(),
        ));
    }
    remove_link(ctx, driven);

    let modifier = match link_type.modifier_kind() {
        Some(kind) => Some(ctx.scene.add_modifier(kind, driven, driver)),
        None => None,
    };
    let link = TransformLink {
        driven,
        driver,
        link_type,
        modifier,
        active: true,
    };
    ctx.scene
        .set_tag(driven, TAG_LINK_TYPE, Some(link_type.as_str()));
    ctx.scene.graph_connect(GRAPH_XFRM_LINK, driven, driver);
    ctx.rig.links.push(link);

    match link_type {
        LinkType::Static => {
            // bake the current world pose into the setup action
            snapshot_static(ctx, driven)?;
        }
        LinkType::DynaParent | LinkType::DynaParentNoScale => {
            if compensation {
                write_rest_offset(ctx, driven)?;
            } else {
                write_offset(ctx, driven, &Transform::default())?;
            }
        }
        LinkType::WorldPermanent => {}
    }
    Ok(())
}

pub fn link_of<'a>(ctx: &'a Ctx<'_>, driven: ItemId) -> Option<&'a TransformLink> {
    ctx.rig.links.iter().find(|l| l.driven == driven)
}

/// Remove the link on `driven`, if any, together with its modifier item.
pub fn remove_link(ctx: &mut Ctx<'_>, driven: ItemId) {
    let Some(index) = ctx.rig.links.iter().position(|l| l.driven == driven) else {
        return;
    };
    let link = ctx.rig.links.remove(index);
    if let Some(modifier) = link.modifier {
        ctx.scene.delete_item(modifier);
    }
    ctx.scene.set_tag(driven, TAG_LINK_TYPE, None);
    ctx.scene
        .graph_disconnect(GRAPH_XFRM_LINK, link.driven, link.driver);
}

/// Turn the link's modifier off for the inert-evaluation window.
pub fn deactivate(ctx: &mut Ctx<'_>, driven: ItemId) -> Result<()> {
    let Some(link) = ctx.rig.links.iter_mut().find(|l| l.driven == driven) else {
        return Ok(());
    };
    link.active = false;
    if let Some(modifier) = link.modifier {
        ctx.scene.write(
            modifier,
            "enable",
            Value::Bool(false),
            0.0,
            ChannelAction::Setup,
            false,
        )?;
    }
    Ok(())
}

/// Recompute the rest offset from the current (inert) world transforms.
pub fn update_rest_pose(ctx: &mut Ctx<'_>, driven: ItemId) -> Result<()> {
    let Some(link) = link_of(ctx, driven).cloned() else {
        return Ok(());
    };
    match link.link_type {
        LinkType::Static => snapshot_static(ctx, driven),
        LinkType::DynaParent | LinkType::DynaParentNoScale => write_rest_offset(ctx, driven),
        LinkType::WorldPermanent => Ok(()),
    }
}

pub fn reactivate(ctx: &mut Ctx<'_>, driven: ItemId) -> Result<()> {
    let Some(link) = ctx.rig.links.iter_mut().find(|l| l.driven == driven) else {
        return Ok(());
    };
    link.active = true;
    if let Some(modifier) = link.modifier {
        ctx.scene.write(
            modifier,
            "enable",
            Value::Bool(true),
            0.0,
            ChannelAction::Setup,
            false,
        )?;
    }
    Ok(())
}

/// Drop the link when either endpoint vanished, deleting any orphaned
/// modifier item along with it.
pub fn clear_from_item_if_not_valid(ctx: &mut Ctx<'_>, driven: ItemId) {
    let Some(link) = link_of(ctx, driven).cloned() else {
        return;
    };
    let valid = ctx.scene.exists(link.driven) && ctx.scene.exists(link.driver);
    if valid {
        return;
    }
    ctx.rig.links.retain(|l| l.driven != driven);
    if let Some(modifier) = link.modifier {
        if ctx.scene.exists(modifier) {
            ctx.scene.delete_item(modifier);
        }
    }
    if ctx.scene.exists(link.driven) {
        ctx.scene.set_tag(link.driven, TAG_LINK_TYPE, None);
        ctx.scene.graph_clear_item(GRAPH_XFRM_LINK, link.driven);
    }
}

fn snapshot_static(ctx: &mut Ctx<'_>, driven: ItemId) -> Result<()> {
    let world = ctx
        .scene
        .world_transform(driven)
        .unwrap_or_default();
    let parent_world = ctx
        .scene
        .parent(driven)
        .and_then(|p| ctx.scene.world_transform(p))
        .unwrap_or_default();
    let local = world.relative_to(&parent_world);
    ctx.scene
        .set_local_transform(driven, &local, ChannelAction::Setup, false);
    Ok(())
}

fn write_rest_offset(ctx: &mut Ctx<'_>, driven: ItemId) -> Result<()> {
    let Some(link) = link_of(ctx, driven).cloned() else {
        return Ok(());
    };
    let driven_world = ctx.scene.world_transform(driven).unwrap_or_default();
    let mut driver_world = ctx.scene.world_transform(link.driver).unwrap_or_default();
    if link.link_type == LinkType::DynaParentNoScale {
        driver_world.scale = [1.0, 1.0, 1.0];
    }
    let offset = driven_world.relative_to(&driver_world);
    write_offset(ctx, driven, &offset)
}

fn write_offset(ctx: &mut Ctx<'_>, driven: ItemId, offset: &Transform) -> Result<()> {
    let Some(link) = link_of(ctx, driven) else {
        return Ok(());
    };
    let Some(modifier) = link.modifier else {
        return Ok(());
    };
    let channels = [
        ("offset.pos.X", offset.pos[0]),
        ("offset.pos.Y", offset.pos[1]),
        ("offset.pos.Z", offset.pos[2]),
        ("offset.rot.X", offset.rot[0]),
        ("offset.rot.Y", offset.rot[1]),
        ("offset.rot.Z", offset.rot[2]),
    ];
    for (name, value) in channels {
        ctx.scene.write(
            modifier,
            name,
            Value::Float(value),
            0.0,
            ChannelAction::Setup,
            false,
        )?;
    }
    Ok(())
}

/// Rest offset currently stored on the link's modifier, if any.
pub fn stored_offset(ctx: &Ctx<'_>, driven: ItemId) -> Option<Transform> {
    let link = link_of(ctx, driven)?;
    let modifier = link.modifier?;
    let read = |name: &str| -> f32 {
        ctx.scene
            .read(modifier, name, 0.0, ChannelAction::Setup)
            .and_then(|v| v.as_f32())
            .unwrap_or(0.0)
    };
    Some(Transform {
        pos: [
            read("offset.pos.X"),
            read("offset.pos.Y"),
            read("offset.pos.Z"),
        ],
        rot: [
            read("offset.rot.X"),
            read("offset.rot.Y"),
            read("offset.rot.Z"),
        ],
        scale: [1.0, 1.0, 1.0],
    })
}
