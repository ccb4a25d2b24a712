//! Standardisation: the one-way export transform that strips every trace
//! of the rig system from an item while keeping its outside channel
//! connections alive as plain user channels.
//!
//! Failures in one step never stop the next; the item must come out as
//! clean as possible even if partially.

use crate::events::Event;
use crate::features::{self, FeatureClass};
use crate::link;
use crate::registry::ComponentKind;
use crate::service::Ctx;
use crate::setup;
use crate::tags::{is_reserved_tag, is_rig_graph};
use rigkit_api_core::{ChannelType, HostType, ItemId, Value};

/// Standardise every item of the rig, posting `RigStandardizePre` first so
/// handlers (rig-clay command baking among them) see the live rig.
pub fn standardize_rig(ctx: &mut Ctx<'_>, convert_host_types: bool) {
    let root = ctx.rig.root;
    ctx.post(Event::RigStandardizePre { root });
    let items: Vec<ItemId> = ctx
        .scene
        .all_items()
        .into_iter()
        .filter(|id| ctx.rig.items.contains_key(id))
        .collect();
    for item in items {
        standardize_item(ctx, item, convert_host_types);
    }
}

/// Standardise one item. Returns the id to keep using; a host-type
/// conversion replaces the item.
pub fn standardize_item(ctx: &mut Ctx<'_>, item: ItemId, convert_host_type: bool) -> ItemId {
    // feature pre-passes run before the connection cache so anything they
    // re-express as channels gets preserved
    let feature_idents = ctx
        .rig
        .items
        .get(&item)
        .map(|r| r.features.clone())
        .unwrap_or_default();
    for ident in &feature_idents {
        let hook = ctx
            .service
            .registry
            .get_as::<FeatureClass>(ComponentKind::ItemFeature, ident)
            .and_then(|c| c.on_standardize);
        if let Some(hook) = hook {
            if let Err(err) = hook(ctx, item) {
                log::warn!("standardize: feature '{ident}' pre-pass on {item:?} failed: {err}");
            }
        }
    }

    // cache every channel connection touching this item
    let mut incoming: Vec<(ItemId, String, String)> = Vec::new();
    let mut outgoing: Vec<(String, ItemId, String)> = Vec::new();
    for channel in ctx.scene.channel_names(item) {
        for (src, src_channel) in ctx.scene.links_into(item, &channel) {
            incoming.push((src, src_channel, channel.clone()));
        }
        for (dst, dst_channel) in ctx.scene.links_out_of(item, &channel) {
            outgoing.push((channel.clone(), dst, dst_channel));
        }
    }

    for ident in &feature_idents {
        if let Err(err) = features::remove_feature(ctx, item, ident) {
            log::warn!("standardize: removing feature '{ident}' from {item:?} failed: {err}");
        }
    }

    // restore cached connections, re-adding user channels where a feature
    // took its channel with it
    for (src, src_channel, dst_channel) in incoming {
        if !ctx.scene.has_channel(item, &dst_channel) {
            if let Err(err) =
                ctx.scene
                    .add_channel(item, &dst_channel, ChannelType::Float, Value::Float(0.0))
            {
                log::warn!("standardize: recreating channel '{dst_channel}' failed: {err}");
                continue;
            }
        }
        if let Err(err) = ctx.scene.link((src, &src_channel), (item, &dst_channel)) {
            log::warn!("standardize: relinking '{dst_channel}' on {item:?} failed: {err}");
        }
    }
    for (src_channel, dst, dst_channel) in outgoing {
        if !ctx.scene.has_channel(item, &src_channel) {
            if let Err(err) =
                ctx.scene
                    .add_channel(item, &src_channel, ChannelType::Float, Value::Float(0.0))
            {
                log::warn!("standardize: recreating channel '{src_channel}' failed: {err}");
                continue;
            }
        }
        if let Err(err) = ctx.scene.link((item, &src_channel), (dst, &dst_channel)) {
            log::warn!("standardize: relinking '{src_channel}' on {item:?} failed: {err}");
        }
    }

    link::remove_link(ctx, item);

    for key in ctx.scene.tag_keys(item) {
        if is_reserved_tag(&key) {
            ctx.scene.set_tag(item, &key, None);
        }
    }
    for graph in ctx.scene.graph_names(item) {
        if is_rig_graph(&graph) {
            ctx.scene.graph_clear_item(&graph, item);
        }
    }

    // leave the setup without unparenting; the host hierarchy survives
    if let Some(setup_id) = ctx.rig.items.get(&item).and_then(|r| r.setup) {
        setup::clear_item(ctx, setup_id, item);
    }
    ctx.rig.items.remove(&item);

    let mut current = item;
    if convert_host_type {
        if let Some(HostType::Other(_)) = ctx.scene.host_type(item) {
            current = ctx.scene.replace_host_type(item, HostType::Locator);
            remap_references(ctx, item, current);
        }
    }
    current
}

/// Rig-side tables hold raw item ids; a host-type replacement has to chase
/// them all.
fn remap_references(ctx: &mut Ctx<'_>, old: ItemId, new: ItemId) {
    if let Some(record) = ctx.rig.items.remove(&old) {
        ctx.rig.items.insert(new, record);
    }
    for setup in ctx.rig.setups.ids() {
        if let Some(s) = ctx.rig.setups.get_mut(setup) {
            for member in s.members.iter_mut() {
                if *member == old {
                    *member = new;
                }
            }
            if s.root == old {
                s.root = new;
            }
            if s.assembly == old {
                s.assembly = new;
            }
        }
    }
    for l in ctx.rig.links.iter_mut() {
        if l.driven == old {
            l.driven = new;
        }
        if l.driver == old {
            l.driver = new;
        }
    }
    for module in ctx.rig.modules.values_mut() {
        for target in module.key_items.values_mut() {
            if *target == old {
                *target = new;
            }
        }
        if module.symmetry == Some(old) {
            module.symmetry = Some(new);
        }
    }
    for region in ctx.rig.clay_regions.iter_mut() {
        if region.controller == old {
            region.controller = new;
        }
        if region.mesh == old {
            region.mesh = new;
        }
    }
}
