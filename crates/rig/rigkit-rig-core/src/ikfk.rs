//! IK/FK chains: paired chain groups and the switcher that performs
//! bidirectional pose matching with ordering and keyframing guarantees.

use crate::error::{Result, RigError};
use crate::features::{controller, match_transforms, FEAT_IK_MATCH_EXTRAS, FEAT_MATCH_TRANSFORMS};
use crate::item;
use crate::service::Ctx;
use crate::tags::{
    GRAPH_CHAIN, GRAPH_CHAIN_BLEND, GRAPH_CHAIN_DRIVERS, GRAPH_CHAIN_FK, GRAPH_CHAIN_IK,
    GRAPH_IK_GOAL_REF, GRAPH_IK_JOINTS, GRAPH_IK_TARGET, GRAPH_IK_TARGET_REF, TYPE_CONTROLLER,
};
use crate::{context::ContextKind, features};
use rigkit_api_core::transform::{vec3_add, vec3_sub};
use rigkit_api_core::{ChannelAction, ChannelType, HostType, ItemId, Transform, Value};
use serde_json::json;

pub const CHAN_ENABLE: &str = "ikfk.enable";
pub const CHAN_BLEND: &str = "ikfk.blend";
pub const SET_BLEND_CHANNEL: &str = "ikfk.blendChannel";
const SET_DRIVER_PAIRS: &str = "drivers.pairs";
const SET_SWITCH_KEYS: &str = "drivers.switchKeys";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MatchTarget {
    Fk,
    Ik,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SyncMode {
    CurrentTime,
    ExplicitTime(f32),
    /// Match at every keyframe of the blend channel.
    Envelope,
}

pub fn switcher_on_add(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    for (name, ty, default) in [
        (CHAN_ENABLE, ChannelType::Bool, Value::Bool(true)),
        (CHAN_BLEND, ChannelType::Float, Value::Float(1.0)),
    ] {
        if !ctx.scene.has_channel(item, name) {
            ctx.scene.add_channel(item, name, ty, default)?;
        }
    }
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        if record.settings.get_str(SET_BLEND_CHANNEL).is_none() {
            record.settings.set(SET_BLEND_CHANNEL, json!(CHAN_BLEND));
        }
    }
    item::flush_settings(ctx, item);
    Ok(())
}

pub fn switcher_on_remove(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    for graph in [
        GRAPH_CHAIN_FK,
        GRAPH_CHAIN_IK,
        GRAPH_CHAIN_DRIVERS,
        GRAPH_CHAIN_BLEND,
    ] {
        ctx.scene.graph_clear_item(graph, item);
    }
    Ok(())
}

/// Create an empty chain group inside a module.
pub fn new_chain_group(ctx: &mut Ctx<'_>, module_root: ItemId, base_name: &str) -> Result<ItemId> {
    let setup = ctx
        .rig
        .modules
        .get(&module_root)
        .map(|m| m.setup)
        .ok_or_else(|| RigError::Lookup(format!("module {module_root:?}")))?;
    item::create_item(
        ctx,
        crate::tags::TYPE_CHAIN_GROUP,
        base_name,
        item::SideMode::InheritModule,
        Some(setup),
    )
}

pub fn add_chain_member(ctx: &mut Ctx<'_>, group: ItemId, member: ItemId) {
    ctx.scene.graph_connect(GRAPH_CHAIN, group, member);
}

pub fn chain_members(ctx: &Ctx<'_>, group: ItemId) -> Vec<ItemId> {
    ctx.scene.graph_forward(GRAPH_CHAIN, group)
}

fn single_edge(ctx: &mut Ctx<'_>, graph: &str, from: ItemId, to: Option<ItemId>) {
    ctx.scene.graph_clear_item(graph, from);
    if let Some(to) = to {
        ctx.scene.graph_connect(graph, from, to);
    }
}

pub fn set_fk_chain(ctx: &mut Ctx<'_>, switcher: ItemId, group: Option<ItemId>) {
    single_edge(ctx, GRAPH_CHAIN_FK, switcher, group);
}

pub fn set_ik_chain(ctx: &mut Ctx<'_>, switcher: ItemId, group: Option<ItemId>) {
    single_edge(ctx, GRAPH_CHAIN_IK, switcher, group);
}

pub fn set_driver_group(ctx: &mut Ctx<'_>, switcher: ItemId, group: Option<ItemId>) {
    single_edge(ctx, GRAPH_CHAIN_DRIVERS, switcher, group);
}

pub fn set_blend_item(ctx: &mut Ctx<'_>, switcher: ItemId, blend: Option<ItemId>) {
    single_edge(ctx, GRAPH_CHAIN_BLEND, switcher, blend);
}

/// Wire the solver-side references used by the match extras.
pub fn set_solver_refs(
    ctx: &mut Ctx<'_>,
    solver: ItemId,
    target: ItemId,
    target_ref: ItemId,
    goal_ref: ItemId,
) {
    single_edge(ctx, GRAPH_IK_TARGET, solver, Some(target));
    single_edge(ctx, GRAPH_IK_TARGET_REF, solver, Some(target_ref));
    single_edge(ctx, GRAPH_IK_GOAL_REF, solver, Some(goal_ref));
}

pub fn add_ik_joint(ctx: &mut Ctx<'_>, solver: ItemId, joint: ItemId) {
    ctx.scene.graph_connect(GRAPH_IK_JOINTS, solver, joint);
}

/// Record a driven/driver channel pair on the driver group.
pub fn add_driver_pair(
    ctx: &mut Ctx<'_>,
    group: ItemId,
    driven: (ItemId, &str),
    driver: (ItemId, &str),
) {
    let entry = json!([driven.0 .0, driven.1, driver.0 .0, driver.1]);
    if let Some(record) = ctx.rig.items.get_mut(&group) {
        let mut pairs = record
            .settings
            .get(SET_DRIVER_PAIRS)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        pairs.push(entry);
        record.settings.set(SET_DRIVER_PAIRS, json!(pairs));
    }
    item::flush_settings(ctx, group);
}

/// Record a solver switch-key channel without an explicit driver; the
/// source is resolved through reverse channel connections at match time.
pub fn add_switch_key(ctx: &mut Ctx<'_>, group: ItemId, channel: (ItemId, &str)) {
    if let Some(record) = ctx.rig.items.get_mut(&group) {
        let mut keys = record
            .settings
            .get(SET_SWITCH_KEYS)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        keys.push(json!([channel.0 .0, channel.1]));
        record.settings.set(SET_SWITCH_KEYS, json!(keys));
    }
    item::flush_settings(ctx, group);
}

type ChannelRef = (ItemId, String);

fn driver_pairs(ctx: &Ctx<'_>, group: ItemId) -> Vec<(ChannelRef, ChannelRef)> {
    ctx.rig
        .items
        .get(&group)
        .and_then(|r| r.settings.get(SET_DRIVER_PAIRS))
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| {
                    let e = e.as_array()?;
                    Some((
                        (
                            ItemId(e.first()?.as_u64()? as u32),
                            e.get(1)?.as_str()?.to_string(),
                        ),
                        (
                            ItemId(e.get(2)?.as_u64()? as u32),
                            e.get(3)?.as_str()?.to_string(),
                        ),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn switch_keys(ctx: &Ctx<'_>, group: ItemId) -> Vec<ChannelRef> {
    ctx.rig
        .items
        .get(&group)
        .and_then(|r| r.settings.get(SET_SWITCH_KEYS))
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| {
                    let e = e.as_array()?;
                    Some((
                        ItemId(e.first()?.as_u64()? as u32),
                        e.get(1)?.as_str()?.to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn blend_target(ctx: &Ctx<'_>, switcher: ItemId) -> (ItemId, String) {
    let item = ctx
        .scene
        .graph_forward(GRAPH_CHAIN_BLEND, switcher)
        .first()
        .copied()
        .unwrap_or(switcher);
    let channel = ctx
        .rig
        .items
        .get(&switcher)
        .and_then(|r| r.settings.get_str(SET_BLEND_CHANNEL))
        .unwrap_or(CHAN_BLEND)
        .to_string();
    (item, channel)
}

fn depth(ctx: &Ctx<'_>, item: ItemId) -> usize {
    let mut depth = 0;
    let mut current = ctx.scene.parent(item);
    while let Some(parent) = current {
        depth += 1;
        current = ctx.scene.parent(parent);
    }
    depth
}

/// Match one chain onto the other, per the switcher's chains and sync
/// mode. Aborts silently when the feature is disabled or the service is
/// outside the animate context.
pub fn match_chains(
    ctx: &mut Ctx<'_>,
    switcher: ItemId,
    target: MatchTarget,
    mode: SyncMode,
) -> Result<()> {
    if ctx.service.current_context != ContextKind::Animate {
        return Ok(());
    }
    let enabled = ctx
        .scene
        .read_eval(switcher, CHAN_ENABLE, ctx.scene.time())
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !enabled {
        return Ok(());
    }

    let (blend_item, blend_channel) = blend_target(ctx, switcher);
    let times = match mode {
        SyncMode::CurrentTime => vec![ctx.scene.time()],
        SyncMode::ExplicitTime(t) => vec![t],
        SyncMode::Envelope => {
            let keys = ctx
                .scene
                .keyframes(blend_item, &blend_channel, ChannelAction::Edit);
            if keys.is_empty() {
                vec![ctx.scene.time()]
            } else {
                keys
            }
        }
    };
    for time in times {
        ctx.scene.set_time(time);
        ctx.scene.evaluate();
        match_at_time(ctx, switcher, target, time, (blend_item, &blend_channel))?;
    }
    Ok(())
}

fn match_at_time(
    ctx: &mut Ctx<'_>,
    switcher: ItemId,
    target: MatchTarget,
    time: f32,
    blend: (ItemId, &str),
) -> Result<()> {
    let fk_group = ctx
        .scene
        .graph_forward(GRAPH_CHAIN_FK, switcher)
        .first()
        .copied()
        .ok_or_else(|| RigError::Lookup("FK chain group".to_string()))?;
    let ik_group = ctx
        .scene
        .graph_forward(GRAPH_CHAIN_IK, switcher)
        .first()
        .copied()
        .ok_or_else(|| RigError::Lookup("IK chain group".to_string()))?;
    let group = match target {
        MatchTarget::Fk => fk_group,
        MatchTarget::Ik => ik_group,
    };

    // solver offsets are measured before any link-based match moves things
    let solvers: Vec<ItemId> = chain_members(ctx, ik_group)
        .into_iter()
        .filter(|id| {
            ctx.scene.host_type(*id) == Some(HostType::Solver)
                && features::has_feature(ctx, *id, FEAT_IK_MATCH_EXTRAS)
        })
        .collect();
    let mut solver_offsets: Vec<(ItemId, [f32; 3])> = Vec::new();
    if target == MatchTarget::Ik {
        for solver in &solvers {
            let target_ref = ctx.scene.graph_forward(GRAPH_IK_TARGET_REF, *solver);
            let goal_ref = ctx.scene.graph_forward(GRAPH_IK_GOAL_REF, *solver);
            let (Some(tr), Some(gr)) = (target_ref.first(), goal_ref.first()) else {
                continue;
            };
            let tr_pos = ctx.scene.world_transform(*tr).unwrap_or_default().pos;
            let gr_pos = ctx.scene.world_transform(*gr).unwrap_or_default().pos;
            solver_offsets.push((*solver, vec3_sub(tr_pos, gr_pos)));
        }
    }

    // hierarchy order, lowest depth first
    let mut members: Vec<ItemId> = chain_members(ctx, group)
        .into_iter()
        .filter(|id| features::has_feature(ctx, *id, FEAT_MATCH_TRANSFORMS))
        .collect();
    members.sort_by_key(|id| depth(ctx, *id));

    for member in members {
        let options = match_transforms::options(ctx, member);
        let reference = match_transforms::reference(ctx, member).unwrap_or(member);
        let reference_world = ctx.scene.world_transform(reference).unwrap_or_default();

        if options.position_local {
            for channel in ["pos.X", "pos.Y", "pos.Z"] {
                if let Some(value) = ctx.scene.read_eval(reference, channel, time) {
                    ctx.scene
                        .write(member, channel, value, time, ChannelAction::Edit, true)?;
                }
            }
        } else if options.position {
            ctx.scene
                .match_world_transform(member, &reference_world, true, false);
        }

        if options.rotation_local {
            for channel in ["rot.X", "rot.Y", "rot.Z"] {
                if let Some(value) = ctx.scene.read_eval(reference, channel, time) {
                    ctx.scene
                        .write(member, channel, value, time, ChannelAction::Edit, true)?;
                }
            }
        } else if options.rotation {
            ctx.scene
                .match_world_transform(member, &reference_world, false, true);
            ctx.scene.adjust_euler(member);
        }
        ctx.scene.evaluate();
    }

    if target == MatchTarget::Ik {
        for (solver, offset) in solver_offsets {
            let goal_ref = ctx
                .scene
                .graph_forward(GRAPH_IK_GOAL_REF, solver)
                .first()
                .copied();
            let solver_target = ctx
                .scene
                .graph_forward(GRAPH_IK_TARGET, solver)
                .first()
                .copied();
            let (Some(goal_ref), Some(solver_target)) = (goal_ref, solver_target) else {
                continue;
            };
            let goal_pos = ctx.scene.world_transform(goal_ref).unwrap_or_default().pos;
            let matched = Transform {
                pos: vec3_add(goal_pos, offset),
                ..Transform::default()
            };
            ctx.scene
                .match_world_transform(solver_target, &matched, true, false);

            for joint in ctx.scene.graph_forward(GRAPH_IK_JOINTS, solver) {
                for channel in ["rot.X", "rot.Y", "rot.Z"] {
                    if let Some(rest) =
                        ctx.scene.read(joint, channel, time, ChannelAction::Setup)
                    {
                        ctx.scene
                            .write(joint, channel, rest, time, ChannelAction::Edit, true)?;
                    }
                }
            }
            ctx.scene.evaluate();
        }
    }

    propagate_drivers(ctx, switcher, time, blend)?;

    let blend_value = match target {
        MatchTarget::Fk => 0.0,
        MatchTarget::Ik => 1.0,
    };
    ctx.scene.write(
        blend.0,
        blend.1,
        Value::Float(blend_value),
        time,
        ChannelAction::Edit,
        true,
    )?;

    // keyframe every controller in both chains
    for group in [fk_group, ik_group] {
        for member in chain_members(ctx, group) {
            if ctx.rig.item_type(member) == Some(TYPE_CONTROLLER) {
                controller::keyframe(ctx, member, time)?;
            }
        }
    }
    Ok(())
}

/// Write each driven channel's evaluated value onto its driver (keyed),
/// then remove the driven key so the pose survives the switch.
fn propagate_drivers(
    ctx: &mut Ctx<'_>,
    switcher: ItemId,
    time: f32,
    blend: (ItemId, &str),
) -> Result<()> {
    let Some(group) = ctx
        .scene
        .graph_forward(GRAPH_CHAIN_DRIVERS, switcher)
        .first()
        .copied()
    else {
        return Ok(());
    };
    for (driven, driver) in driver_pairs(ctx, group) {
        if driven.0 == blend.0 && driven.1 == blend.1 {
            continue;
        }
        let Some(value) = ctx.scene.read_eval(driven.0, &driven.1, time) else {
            continue;
        };
        ctx.scene
            .write(driver.0, &driver.1, value, time, ChannelAction::Edit, true)?;
        ctx.scene
            .remove_key(driven.0, &driven.1, time, ChannelAction::Edit);
    }
    for (item, channel) in switch_keys(ctx, group) {
        let Some((src_item, src_channel)) = ctx.scene.links_into(item, &channel).first().cloned()
        else {
            continue;
        };
        let Some(value) = ctx.scene.read_eval(item, &channel, time) else {
            continue;
        };
        ctx.scene
            .write(src_item, &src_channel, value, time, ChannelAction::Edit, true)?;
    }
    Ok(())
}
