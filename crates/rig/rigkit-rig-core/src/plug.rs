//! Plug/socket connections at module boundaries.
//!
//! Connecting installs a no-scale dynamic-parent link plus world matrix
//! feeds from the socket, switches the plug's draw shape, and caches the
//! parent offset off the modifier. Everything is reversed on disconnect.

use crate::error::Result;
use crate::events::Event;
use crate::features::item_link;
use crate::link::{self, LinkType};
use crate::service::Ctx;
use crate::tags::GRAPH_PLUG_SOCKET;
use rigkit_api_core::{ChannelAction, ItemId, Value};

const MATRIX_FEEDS: [(&str, &str); 3] = [
    ("wposMatrix", "socket.wpos"),
    ("wrotMatrix", "socket.wrot"),
    ("wsclMatrix", "socket.wscl"),
];

const OFFSET_CHANNELS: [(&str, &str); 6] = [
    ("offset.pos.X", "parentOffset.pos.X"),
    ("offset.pos.Y", "parentOffset.pos.Y"),
    ("offset.pos.Z", "parentOffset.pos.Z"),
    ("offset.rot.X", "parentOffset.rot.X"),
    ("offset.rot.Y", "parentOffset.rot.Y"),
    ("offset.rot.Z", "parentOffset.rot.Z"),
];

pub fn connected_socket(ctx: &Ctx<'_>, plug: ItemId) -> Option<ItemId> {
    ctx.scene
        .graph_forward(GRAPH_PLUG_SOCKET, plug)
        .first()
        .copied()
}

/// Connect a plug to a socket in a foreign module. Same-module connection
/// is a no-op without events; an existing connection is swapped out first.
pub fn connect_to_socket(ctx: &mut Ctx<'_>, plug: ItemId, socket: ItemId) -> Result<()> {
    let plug_module = ctx.rig.module_of_item(plug);
    let socket_module = ctx.rig.module_of_item(socket);
    if plug_module.is_some() && plug_module == socket_module {
        return Ok(());
    }
    if let Some(existing) = connected_socket(ctx, plug) {
        if existing == socket {
            return Ok(());
        }
        disconnect_from_socket(ctx, plug)?;
    }

    link::new_link(ctx, plug, socket, LinkType::DynaParentNoScale, true)?;

    for (_, cache) in MATRIX_FEEDS {
        for (src_item, src_chan) in ctx.scene.links_into(plug, cache) {
            ctx.scene.unlink((src_item, &src_chan), (plug, cache));
        }
    }
    for (world, cache) in MATRIX_FEEDS {
        ctx.scene.link((socket, world), (plug, cache))?;
    }

    ctx.scene.write(
        plug,
        "drawShape",
        Value::Text("circleSolid".to_string()),
        0.0,
        ChannelAction::Setup,
        false,
    )?;
    item_link::set_target(ctx, plug, Some(socket));
    item_link::set_enable(ctx, plug, true);
    ctx.scene.graph_connect(GRAPH_PLUG_SOCKET, plug, socket);

    cache_parent_offset(ctx, plug)?;
    ctx.post(Event::PlugConnected { plug, socket });
    Ok(())
}

pub fn disconnect_from_socket(ctx: &mut Ctx<'_>, plug: ItemId) -> Result<()> {
    let Some(socket) = connected_socket(ctx, plug) else {
        return Ok(());
    };
    link::remove_link(ctx, plug);
    for (world, cache) in MATRIX_FEEDS {
        ctx.scene.unlink((socket, world), (plug, cache));
    }
    ctx.scene.write(
        plug,
        "drawShape",
        Value::Text("circle".to_string()),
        0.0,
        ChannelAction::Setup,
        false,
    )?;
    item_link::set_target(ctx, plug, None);
    item_link::set_enable(ctx, plug, false);
    ctx.scene.graph_disconnect(GRAPH_PLUG_SOCKET, plug, socket);
    ctx.post(Event::PlugDisconnected { plug, socket });
    Ok(())
}

/// Copy the dyna-parent modifier's offset outputs onto the plug's own
/// cache channels. Valid only after the link has been reactivated.
pub fn cache_parent_offset(ctx: &mut Ctx<'_>, plug: ItemId) -> Result<()> {
    let Some(l) = link::link_of(ctx, plug) else {
        return Ok(());
    };
    let Some(modifier) = l.modifier else {
        return Ok(());
    };
    for (offset, cache) in OFFSET_CHANNELS {
        let value = ctx
            .scene
            .read(modifier, offset, 0.0, ChannelAction::Setup)
            .and_then(|v| v.as_f32())
            .unwrap_or(0.0);
        ctx.scene.write(
            plug,
            cache,
            Value::Float(value),
            0.0,
            ChannelAction::Setup,
            false,
        )?;
    }
    Ok(())
}

/// Parent-offset vectors currently cached on the plug.
pub fn cached_offset(ctx: &Ctx<'_>, plug: ItemId) -> ([f32; 3], [f32; 3]) {
    let read = |name: &str| -> f32 {
        ctx.scene
            .read(plug, name, 0.0, ChannelAction::Setup)
            .and_then(|v| v.as_f32())
            .unwrap_or(0.0)
    };
    (
        [
            read("parentOffset.pos.X"),
            read("parentOffset.pos.Y"),
            read("parentOffset.pos.Z"),
        ],
        [
            read("parentOffset.rot.X"),
            read("parentOffset.rot.Y"),
            read("parentOffset.rot.Z"),
        ],
    )
}
